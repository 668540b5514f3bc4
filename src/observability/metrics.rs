//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vmess_clients_created_total` (counter)
//! - `vmess_clients_deleted_total` (counter)
//! - `vmess_daemon_starts_total` (counter): by `result` (ok, error)
//! - `vmess_daemon_stops_total` (counter): by `mode` (graceful, forced, exited)
//! - `vmess_daemon_running` (gauge): 1=running, 0=stopped
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus listener is opt-in

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::daemon::StopOutcome;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_client_created() {
    counter!("vmess_clients_created_total").increment(1);
}

pub fn record_client_deleted() {
    counter!("vmess_clients_deleted_total").increment(1);
}

pub fn record_daemon_start(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("vmess_daemon_starts_total", "result" => result).increment(1);
}

pub fn record_daemon_stop(outcome: StopOutcome) {
    let mode = match outcome {
        StopOutcome::Graceful => "graceful",
        StopOutcome::Forced => "forced",
        StopOutcome::Exited => "exited",
        StopOutcome::NotRunning => return,
    };
    counter!("vmess_daemon_stops_total", "mode" => mode).increment(1);
}

pub fn set_daemon_running(running: bool) {
    gauge!("vmess_daemon_running").set(if running { 1.0 } else { 0.0 });
}
