//! Command-line parsing

use clap::{Parser, Subcommand};
use identitynow_client::MAX_PAGE_SIZE;

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about, long_about = None)]
#[command(name = "identitynow-probe")]
pub struct Cli {
    /// Config file (default: $CONFIG_PATH or ./identitynow-probe.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Pool size, clamped to the configured maximum
    #[arg(long, value_name = "N")]
    pub pool_size: Option<usize>,

    /// Print the Prometheus rendering of the client metrics after the command
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch one resource
    Get { path: String },
    /// Fetch every page of a collection
    List {
        path: String,
        #[arg(long, value_name = "N", default_value_t = MAX_PAGE_SIZE)]
        page_size: usize,
        /// Value of the `filters` query parameter
        #[arg(long, value_name = "EXPR")]
        filter: Option<String>,
    },
    /// Delete a resource; an absent one counts as deleted
    Delete { path: String },
    /// Acquire `warm` clients, then print the pool snapshot.
    Stats {
        #[arg(long, value_name = "N", default_value_t = 0)]
        warm: usize,
    },
}
