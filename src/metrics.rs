// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the message cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for installing a recorder/exporter.
//!
//! # Metric Naming Convention
//! - `message_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `backend`: memory, sqlite
//! - `operation`: get, add, clear_chat, clear_all, cleanup, search, ...
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a completed cache operation
pub fn record_operation(backend: &str, operation: &str, status: &str) {
    counter!(
        "message_cache_operations_total",
        "backend" => backend.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(backend: &str, operation: &str, duration: Duration) {
    histogram!(
        "message_cache_operation_seconds",
        "backend" => backend.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record messages evicted by the per-chat capacity bound
pub fn record_evictions(backend: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "message_cache_evictions_total",
        "backend" => backend.to_string()
    )
    .increment(count as u64);
}

/// Record messages reaped by TTL cleanup
pub fn record_expired(backend: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "message_cache_expired_total",
        "backend" => backend.to_string()
    )
    .increment(count as u64);
}

/// Record a stored row whose payload could not be decoded
pub fn record_skipped_row(backend: &str) {
    counter!(
        "message_cache_skipped_rows_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Record a payload that could not be serialized (write dropped)
pub fn record_serialization_failure() {
    counter!("message_cache_serialization_failures_total").increment(1);
}

/// Record number of hits returned by a full-text query
pub fn record_search_results(kind: &str, count: usize) {
    histogram!(
        "message_cache_search_results",
        "kind" => kind.to_string()
    )
    .record(count as f64);
}

/// Set current number of cached messages
pub fn set_cached_messages(backend: &str, count: usize) {
    gauge!(
        "message_cache_messages",
        "backend" => backend.to_string()
    )
    .set(count as f64);
}

/// Set current number of chats with cached messages
pub fn set_cached_chats(backend: &str, count: usize) {
    gauge!(
        "message_cache_chats",
        "backend" => backend.to_string()
    )
    .set(count as f64);
}

/// Set the on-disk database size
pub fn set_db_bytes(bytes: u64) {
    gauge!("message_cache_db_bytes").set(bytes as f64);
}

/// Timer that records latency on drop
pub struct LatencyTimer {
    backend: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(backend: &'static str, operation: &'static str) -> Self {
        Self {
            backend,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.backend, self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must never panic.

    #[test]
    fn test_record_operation() {
        record_operation("memory", "get", "success");
        record_operation("sqlite", "add", "error");
    }

    #[test]
    fn test_counters_ignore_zero() {
        record_evictions("memory", 0);
        record_expired("sqlite", 0);
        record_evictions("memory", 3);
        record_expired("sqlite", 7);
        record_skipped_row("sqlite");
        record_serialization_failure();
    }

    #[test]
    fn test_gauges() {
        set_cached_messages("memory", 120);
        set_cached_chats("memory", 4);
        set_db_bytes(4096);
        record_search_results("text", 12);
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("memory", "get");
            std::thread::sleep(Duration::from_micros(10));
        }
    }
}
