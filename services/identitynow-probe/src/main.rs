//! IdentityNow probe
//!
//! One-shot operator CLI over the credentialed client pool:
//! 1. Loads config (file + env overlay) and credential secrets
//! 2. Builds a round-robin client pool over the configured credentials
//! 3. Runs one command (get, list, delete, stats) and prints JSON to stdout
//! 4. Optionally prints the Prometheus rendering of the client metrics

mod cli;
mod config;
mod error;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use identitynow_client::{ApiRequest, ClientOptions, OAuthTokenIssuer, build_http_client};
use identitynow_pool::ClientPool;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let prometheus_handle = metrics::install_recorder()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    info!(
        api_url = %config.api.url,
        credentials = config.credentials.len(),
        max_size = config.pool.max_size,
        requests_per_second = config.pool.requests_per_second,
        "configuration loaded"
    );

    let http = build_http_client(config.timeout()).context("failed to build HTTP client")?;
    let issuer = Arc::new(OAuthTokenIssuer::new(http.clone(), &config.api.url));
    let pool = ClientPool::new(
        config.pool_config(cli.pool_size),
        config.pool_credentials(),
        ClientOptions::new(config.api.url.clone()),
        http,
        issuer,
    )
    .context("failed to build client pool")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let output = run(&pool, cli.command, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.metrics {
        println!("{}", prometheus_handle.render());
    }
    Ok(())
}

/// An explicit path must exist; the default path is optional.
fn load_config(cli_path: Option<&str>) -> Result<Config> {
    let explicit = cli_path.is_some() || std::env::var_os("CONFIG_PATH").is_some();
    let path = Config::resolve_path(cli_path);
    if explicit || path.exists() {
        info!(path = %path.display(), "loading configuration");
        Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        info!("no config file, using environment");
        Config::from_env().context("failed to load config from environment")
    }
}

async fn run(pool: &ClientPool, command: Command, cancel: &CancellationToken) -> Result<Value> {
    match command {
        Command::Get { path } => {
            let client = pool.acquire(cancel).await?;
            let body: Value = client
                .get(&path, cancel)
                .await
                .with_context(|| format!("GET {path} failed"))?;
            Ok(body)
        }
        Command::List {
            path,
            page_size,
            filter,
        } => {
            let client = pool.acquire(cancel).await?;
            let mut request = ApiRequest::get(path.as_str());
            if let Some(filter) = filter {
                request = request.query("filters", filter);
            }
            let items: Vec<Value> = client
                .list_all(request, page_size, cancel)
                .await
                .with_context(|| format!("listing {path} failed"))?;
            Ok(json!({ "count": items.len(), "items": items }))
        }
        Command::Delete { path } => {
            let client = pool.acquire(cancel).await?;
            let outcome = client
                .delete_idempotent(&path, cancel)
                .await
                .with_context(|| format!("DELETE {path} failed"))?;
            Ok(json!({ "path": path, "outcome": format!("{outcome:?}") }))
        }
        Command::Stats { warm } => {
            for _ in 0..warm {
                pool.acquire(cancel).await?;
            }
            Ok(serde_json::to_value(pool.stats().await)?)
        }
    }
}

/// Cancel in-flight work on SIGINT or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, cancelling"),
        _ = terminate => info!("received SIGTERM, cancelling"),
    }
    cancel.cancel();
}
