//! Metrics sink (Design Notes §9 "Global mutable state").
//!
//! The teacher's `rpc_server.rs` keeps `Lazy<Counter>` statics
//! (`RPC_REQ_TOTAL`, `RPC_ERR_TOTAL`). Per spec.md's Design Notes, that
//! process-wide counter registry is re-architected here as an injected
//! trait object so the dispatcher and hub never reach for global state.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};
use std::collections::HashMap;
use std::sync::Arc;

pub trait MetricsSink: Send + Sync {
    fn inc_request(&self, method: &str);
    fn inc_error(&self, method: &str, kind: &str);
    fn gauge_subscribers(&self, count: usize);
}

static REQUEST_COUNTER: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "neo_rpc_requests_total",
        "Total RPC requests received, labeled by method",
        &["method"]
    )
    .expect("metric registration")
});

static ERROR_COUNTER: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "neo_rpc_errors_total",
        "Total RPC errors returned, labeled by method and error kind",
        &["method", "kind"]
    )
    .expect("metric registration")
});

static SUBSCRIBER_GAUGE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "neo_rpc_ws_subscribers",
        "Current number of admitted WebSocket subscribers"
    )
    .expect("metric registration")
});

/// Default `MetricsSink`, backed by the process-wide `prometheus` registry.
#[derive(Clone, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn inc_request(&self, method: &str) {
        REQUEST_COUNTER.with_label_values(&[method]).inc();
    }

    fn inc_error(&self, method: &str, kind: &str) {
        ERROR_COUNTER.with_label_values(&[method, kind]).inc();
    }

    fn gauge_subscribers(&self, count: usize) {
        SUBSCRIBER_GAUGE.set(count as f64);
    }
}

/// In-memory sink used by tests that want to assert on counts without
/// touching the global `prometheus` registry.
#[derive(Clone, Default)]
pub struct TestMetrics {
    requests: Arc<Mutex<HashMap<String, u64>>>,
    errors: Arc<Mutex<HashMap<(String, String), u64>>>,
}

impl TestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self, method: &str) -> u64 {
        self.requests.lock().get(method).copied().unwrap_or(0)
    }

    pub fn error_count(&self, method: &str, kind: &str) -> u64 {
        self.errors
            .lock()
            .get(&(method.to_string(), kind.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl MetricsSink for TestMetrics {
    fn inc_request(&self, method: &str) {
        *self.requests.lock().entry(method.to_string()).or_insert(0) += 1;
    }

    fn inc_error(&self, method: &str, kind: &str) {
        *self
            .errors
            .lock()
            .entry((method.to_string(), kind.to_string()))
            .or_insert(0) += 1;
    }

    fn gauge_subscribers(&self, _count: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counts_independently_per_method() {
        let metrics = TestMetrics::new();
        metrics.inc_request("getblockcount");
        metrics.inc_request("getblockcount");
        metrics.inc_request("getversion");
        assert_eq!(metrics.request_count("getblockcount"), 2);
        assert_eq!(metrics.request_count("getversion"), 1);
        assert_eq!(metrics.request_count("unknown"), 0);
    }

    #[test]
    fn test_metrics_counts_errors_by_method_and_kind() {
        let metrics = TestMetrics::new();
        metrics.inc_error("getblock", "InvalidParams");
        metrics.inc_error("getblock", "InvalidParams");
        metrics.inc_error("getblock", "InternalServerError");
        assert_eq!(metrics.error_count("getblock", "InvalidParams"), 2);
        assert_eq!(metrics.error_count("getblock", "InternalServerError"), 1);
    }
}
