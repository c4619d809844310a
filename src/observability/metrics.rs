//! Metrics collection and exposition.
//!
//! # Metrics
//! - `toolgate_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `toolgate_breaker_calls_total` (counter): admitted calls by breaker, outcome
//! - `toolgate_breaker_rejections_total` (counter): fast-failed calls
//! - `toolgate_breaker_trips_total` (counter): transitions into open
//! - `toolgate_tool_invocations_total` (counter): dispatches by tool, outcome
//! - `toolgate_tool_duration_seconds` (histogram): handler latency
//! - `toolgate_ws_connections` (gauge): live WebSocket sessions

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("toolgate_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_breaker_call(breaker: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "toolgate_breaker_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_breaker_rejection(breaker: &str) {
    counter!("toolgate_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_breaker_trip(breaker: &str) {
    counter!("toolgate_breaker_trips_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_tool_invocation(tool: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "toolgate_tool_invocations_total",
        "tool" => tool.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("toolgate_tool_duration_seconds", "tool" => tool.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn set_ws_connections(count: usize) {
    gauge!("toolgate_ws_connections").set(count as f64);
}
