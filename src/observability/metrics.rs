//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingest_requests_total` (counter): requests by route and status
//! - `ingest_request_duration_seconds` (histogram): latency distribution
//! - `ingest_records_total` (counter): records forwarded to the sink, by tag
//! - `ingest_records_dropped_total` (counter): records removed by a stage, by stage and reason
//! - `ingest_reloads_total` (counter): reload attempts by outcome
//! - `ingest_config_generation` (gauge): generation of the live route table
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library code and
//!   tests call these freely
//! - Labels are bounded: route paths come from configuration, not requests

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

use crate::observability::logging::ObservabilityError;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(address: &str) -> Result<(), ObservabilityError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ObservabilityError::MetricsAddress {
            address: address.to_string(),
            source,
        })?;

    if addr.ip().is_unspecified() {
        warn!(listen_addr = %addr, "Metrics endpoint is exposed on all interfaces");
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ObservabilityError::Metrics(e.to_string()))?;

    describe();
    info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

fn describe() {
    describe_counter!("ingest_requests_total", "Ingest requests by route and status");
    describe_histogram!(
        "ingest_request_duration_seconds",
        metrics::Unit::Seconds,
        "Ingest request latency"
    );
    describe_counter!("ingest_records_total", "Records forwarded to the sink");
    describe_counter!("ingest_records_dropped_total", "Records removed by a stage");
    describe_counter!("ingest_reloads_total", "Configuration reload attempts");
    describe_gauge!("ingest_config_generation", "Generation of the live route table");
}

/// Record one finished ingest request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "ingest_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("ingest_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_records(tag: &str, count: usize) {
    counter!("ingest_records_total", "tag" => tag.to_string()).increment(count as u64);
}

/// Records a stage removed; `reason` is "filtered" or "error".
pub fn record_dropped(stage: &str, reason: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "ingest_records_dropped_total",
        "stage" => stage.to_string(),
        "reason" => reason
    )
    .increment(count as u64);
}

/// Reload outcome: "success" or "failure".
pub fn record_reload(outcome: &'static str) {
    counter!("ingest_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_generation(generation: u64) {
    gauge!("ingest_config_generation").set(generation as f64);
}
