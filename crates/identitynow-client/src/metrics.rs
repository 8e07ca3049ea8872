//! Client-side metrics
//!
//! - `identitynow_requests_total` (counter): labels `method`, `outcome`
//! - `identitynow_request_duration_seconds` (histogram): label `method`
//! - `identitynow_retries_total` (counter): label `reason`
//! - `identitynow_token_refresh_total` (counter): label `outcome`
//!
//! Without an installed recorder these calls are no-ops.

/// Record a completed API request. `outcome` is "success" or an error kind.
pub fn record_request(method: &str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(
        "identitynow_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("identitynow_request_duration_seconds", "method" => method.to_string())
        .record(duration_secs);
}

pub fn record_retry(reason: &'static str) {
    metrics::counter!("identitynow_retries_total", "reason" => reason).increment(1);
}

pub fn record_token_refresh(outcome: &'static str) {
    metrics::counter!("identitynow_token_refresh_total", "outcome" => outcome).increment(1);
}
