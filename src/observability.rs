//! Observability hooks for store operations.
//!
//! Implement [`StoreMetrics`] to feed a monitoring system:
//!
//! ```ignore
//! use crm_store::observability::StoreMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl StoreMetrics for PrometheusMetrics {
//!     fn record_write(&self, collection: &str, op: &str, duration: Duration) {
//!         // histogram!("store_write_latency", "collection" => collection).record(duration);
//!     }
//! }
//!
//! // let store = Store::in_memory().with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! The trait's default methods log through the `log` crate. A store built
//! without explicit metrics uses [`NoOpMetrics`].

use std::time::Duration;

/// Trait for store metrics collection.
pub trait StoreMetrics: Send + Sync {
    /// Record a read (`get`, `list`).
    fn record_read(&self, collection: &str, op: &str, duration: Duration) {
        debug!("Store READ {} {} took {:?}", op, collection, duration);
    }

    /// Record a successful write (`create`, `update`, `delete`, child ops).
    fn record_write(&self, collection: &str, op: &str, duration: Duration) {
        debug!("Store WRITE {} {} took {:?}", op, collection, duration);
    }

    /// Record a write rejected by a unique index.
    fn record_conflict(&self, collection: &str, field: &str) {
        info!("Store CONFLICT on {}.{}", collection, field);
    }

    /// Record a backend or codec failure.
    fn record_error(&self, collection: &str, op: &str, error: &str) {
        warn!("Store ERROR during {} {}: {}", op, collection, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl StoreMetrics for NoOpMetrics {
    fn record_read(&self, _collection: &str, _op: &str, _duration: Duration) {}
    fn record_write(&self, _collection: &str, _op: &str, _duration: Duration) {}
    fn record_conflict(&self, _collection: &str, _field: &str) {}
    fn record_error(&self, _collection: &str, _op: &str, _error: &str) {}
}

/// Metrics implementation that only uses the trait's logging defaults.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl StoreMetrics for LogMetrics {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        writes: AtomicUsize,
        conflicts: AtomicUsize,
    }

    impl StoreMetrics for Counting {
        fn record_write(&self, _collection: &str, _op: &str, _duration: Duration) {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }

        fn record_conflict(&self, _collection: &str, _field: &str) {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_overrides_and_defaults_coexist() {
        let m = Counting::default();
        m.record_write("customers", "create", Duration::from_millis(1));
        m.record_conflict("customers", "email");
        m.record_read("customers", "get", Duration::from_millis(1));
        m.record_error("customers", "get", "boom");
        assert_eq!(m.writes.load(Ordering::Relaxed), 1);
        assert_eq!(m.conflicts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_noop_metrics_is_object_safe() {
        let metrics: Box<dyn StoreMetrics> = Box::new(NoOpMetrics);
        metrics.record_write("queries", "update", Duration::ZERO);
        let logging: Box<dyn StoreMetrics> = Box::new(LogMetrics);
        logging.record_conflict("invoices", "invoiceNumber");
    }
}
