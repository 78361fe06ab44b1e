//! Observability hooks for store activity.
//!
//! Implement [`StoreMetrics`] to feed fetch and load activity into your
//! monitoring system:
//!
//! ```
//! use entity_store::observability::StoreMetrics;
//! use entity_store::strategy::LoadReason;
//!
//! struct PrometheusMetrics;
//!
//! impl StoreMetrics for PrometheusMetrics {
//!     fn record_load(&self, _key: &str, _reason: LoadReason) {
//!         // counter!("store_loads", "reason" => reason.to_string()).inc();
//!     }
//! }
//! ```
//!
//! The default for a store is [`NoOpMetrics`]. [`LogMetrics`] keeps the
//! default method bodies, which log through the `log` crate.
//!
//! # Hooks
//!
//! - `record_hit()` - fetch served from the cache without a load
//! - `record_miss()` - fetch created a stub entry
//! - `record_load()` - a load was triggered, with its [`LoadReason`]
//! - `record_stale_discard()` - a superseded load result was dropped
//! - `record_error()` - a configuration error was raised

use crate::strategy::LoadReason;

/// Trait for store metrics collection.
///
/// Keys are qualified as `"{store}:{key}"`.
pub trait StoreMetrics {
    fn record_hit(&self, key: &str) {
        debug!("Store HIT: {}", key);
    }

    fn record_miss(&self, key: &str) {
        debug!("Store MISS: {}", key);
    }

    fn record_load(&self, key: &str, reason: LoadReason) {
        debug!("Store LOAD: {} ({})", key, reason);
    }

    /// A load for generation `stale` completed after generation `current`
    /// had been triggered.
    fn record_stale_discard(&self, key: &str, stale: u64, current: u64) {
        debug!(
            "Store STALE: {} dropped load #{} (current #{})",
            key, stale, current
        );
    }

    fn record_error(&self, key: &str, error: &str) {
        warn!("Store ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl StoreMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str) {}
    fn record_miss(&self, _key: &str) {}
    fn record_load(&self, _key: &str, _reason: LoadReason) {}
    fn record_stale_discard(&self, _key: &str, _stale: u64, _current: u64) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics that only write log lines.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl StoreMetrics for LogMetrics {}
