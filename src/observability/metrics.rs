//! Metrics collection.
//!
//! # Metrics
//! - `accessor_router_dispatch_total` (counter): operations by kind, redundancy, outcome
//! - `accessor_router_fallback_total` (counter): failed attempts that moved to the next replica
//! - `accessor_router_fanout_aborted_total` (counter): fan-outs stopped part way
//! - `accessor_router_shard_redirect_total` (counter): connection swaps by accessor
//! - `accessor_router_selection_errors_total` (counter): failed specifications by kind
//! - `accessor_router_device_load` (gauge): last load score by host
//! - `accessor_router_pool_size` (gauge): resolved accessors

use metrics::{counter, gauge};

/// Record a dispatched operation.
pub fn record_dispatch(kind: &'static str, redundancy: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "accessor_router_dispatch_total",
        "kind" => kind,
        "redundancy" => redundancy,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a failed attempt inside a fallback chain.
pub fn record_fallback(accessor: &str) {
    counter!("accessor_router_fallback_total", "accessor" => accessor.to_string()).increment(1);
}

pub fn record_fanout_aborted(accessor: &str) {
    counter!("accessor_router_fanout_aborted_total", "accessor" => accessor.to_string())
        .increment(1);
}

pub fn record_shard_redirect(accessor: &str) {
    counter!("accessor_router_shard_redirect_total", "accessor" => accessor.to_string())
        .increment(1);
}

pub fn record_selection_error(kind: &'static str) {
    counter!("accessor_router_selection_errors_total", "kind" => kind).increment(1);
}

pub fn record_device_load(host: &str, score: f64) {
    gauge!("accessor_router_device_load", "host" => host.to_string()).set(score);
}

pub fn record_pool_size(size: usize) {
    gauge!("accessor_router_pool_size").set(size as f64);
}
