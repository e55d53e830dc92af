//! Prometheus metrics for bastion reconciliation

use crate::error::ControllerError;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_REQUEUE: &str = "requeue";
pub const RESULT_ERROR: &str = "error";

/// Reconcile counters and latencies, labelled by operation
/// ("create", "reconcile", "delete")
pub struct Metrics {
    /// Total reconciliations by operation and result
    pub reconcile_total: CounterVec,
    /// Reconciliation duration in seconds
    pub reconcile_duration_seconds: HistogramVec,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_total = CounterVec::new(
            Opts::new("bastion_reconcile_total", "Total bastion reconciliations"),
            &["operation", "result"],
        )?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bastion_reconcile_duration_seconds",
                "Bastion reconciliation latency in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["operation"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_duration_seconds,
            registry,
        })
    }

    /// Records one finished reconciliation.
    pub fn observe(&self, operation: &str, result: &str, elapsed: Duration) {
        self.reconcile_total
            .with_label_values(&[operation, result])
            .inc();
        self.reconcile_duration_seconds
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ControllerError::InvalidConfig(format!("metrics are not UTF-8: {e}")))
    }
}
