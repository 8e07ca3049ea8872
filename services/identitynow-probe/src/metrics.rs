//! Prometheus recorder for the client metrics
//!
//! The client crate records:
//!
//! - `identitynow_requests_total` (counter): labels `method`, `outcome`
//! - `identitynow_request_duration_seconds` (histogram): label `method`
//! - `identitynow_retries_total` (counter): label `reason`
//! - `identitynow_token_refresh_total` (counter): label `outcome`
//!
//! The probe installs the recorder and prints the rendering on `--metrics`.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "identitynow_request_duration_seconds";

/// 5ms to 60s, the HTTP client's default timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the global recorder and return a handle for rendering.
///
/// Buckets make the duration metric render as a histogram with `_bucket`
/// lines rather than the default summary.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
