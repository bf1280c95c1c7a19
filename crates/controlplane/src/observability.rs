//! In-process counters, a latency histogram, and in-flight gauges.
//!
//! This module only specifies what must be emitted, not how it is exported;
//! wiring an exporter (Prometheus, OTLP) is the hosting binary's concern and
//! is entirely optional. The registry itself is the one piece of shared
//! mutable global state this crate allows, per the concurrency model.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

/// Histogram buckets, in seconds, matching common default latency buckets.
const LATENCY_BUCKETS_SECONDS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Default)]
struct Histogram {
    bucket_counts: [AtomicU64; LATENCY_BUCKETS_SECONDS.len()],
    sum_millis: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    fn observe_seconds(&self, seconds: f64) {
        for (i, bound) in LATENCY_BUCKETS_SECONDS.iter().enumerate() {
            if seconds <= *bound {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (seconds * 1000.0).round() as u64;
        self.sum_millis.fetch_add(millis, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Request-scoped counters, histogram, and gauges per §4.9.
pub struct Metrics {
    requests_total: DashMap<(String, String, u16), AtomicU64>,
    request_duration: DashMap<(String, String), Histogram>,
    in_flight: AtomicI64,
    core_health_check_total: DashMap<String, AtomicU64>,
    snapshot_operations_total: AtomicU64,
    replay_operations_total: AtomicU64,
    uptime_seconds: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests_total: DashMap::new(),
            request_duration: DashMap::new(),
            in_flight: AtomicI64::new(0),
            core_health_check_total: DashMap::new(),
            snapshot_operations_total: AtomicU64::new(0),
            replay_operations_total: AtomicU64::new(0),
            uptime_seconds: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, method: &str, path_template: &str, status: u16, duration_seconds: f64) {
        self.requests_total
            .entry((method.to_owned(), path_template.to_owned(), status))
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        self.request_duration
            .entry((method.to_owned(), path_template.to_owned()))
            .or_default()
            .observe_seconds(duration_seconds);
    }

    pub fn in_flight_enter(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight_exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn record_core_health_check(&self, status: &str) {
        self.core_health_check_total
            .entry(status.to_owned())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_operation(&self) {
        self.snapshot_operations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay_operation(&self) {
        self.replay_operations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_uptime_seconds(&self, seconds: u64) {
        self.uptime_seconds.store(seconds, Ordering::Relaxed);
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.uptime_seconds.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn requests_total_count(&self, method: &str, path_template: &str, status: u16) -> u64 {
        self.requests_total
            .get(&(method.to_owned(), path_template.to_owned(), status))
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Snapshot suitable for `GET /api/v1/metrics/json`.
    #[must_use]
    pub fn snapshot_json(&self) -> serde_json::Value {
        let requests_total: Vec<serde_json::Value> = self
            .requests_total
            .iter()
            .map(|entry| {
                let (method, path, status) = entry.key();
                serde_json::json!({
                    "method": method,
                    "path": path,
                    "status": status,
                    "count": entry.value().load(Ordering::Relaxed),
                })
            })
            .collect();
        serde_json::json!({
            "http_requests_total": requests_total,
            "http_requests_in_flight": self.in_flight(),
            "uptime_seconds": self.uptime_seconds(),
            "snapshot_operations_total": self.snapshot_operations_total.load(Ordering::Relaxed),
            "replay_operations_total": self.replay_operations_total.load(Ordering::Relaxed),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_gauge_tracks_enter_and_exit() {
        let metrics = Metrics::new();
        metrics.in_flight_enter();
        metrics.in_flight_enter();
        assert_eq!(metrics.in_flight(), 2);
        metrics.in_flight_exit();
        assert_eq!(metrics.in_flight(), 1);
    }

    #[test]
    fn requests_total_increments_per_label_combination() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/api/v1/tenants", 200, 0.01);
        metrics.record_request("GET", "/api/v1/tenants", 200, 0.02);
        metrics.record_request("GET", "/api/v1/tenants", 403, 0.01);
        assert_eq!(metrics.requests_total_count("GET", "/api/v1/tenants", 200), 2);
        assert_eq!(metrics.requests_total_count("GET", "/api/v1/tenants", 403), 1);
    }

    #[test]
    fn uptime_gauge_is_settable() {
        let metrics = Metrics::new();
        metrics.set_uptime_seconds(42);
        assert_eq!(metrics.uptime_seconds(), 42);
    }
}
