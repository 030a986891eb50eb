//! Metrics collection and export module

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Process-wide collectors for RPC traffic and operation executions
pub struct SdkMetrics {
    registry: Registry,

    // Counters
    pub rpc_requests: IntCounterVec,
    pub rpc_accounts_requested: IntCounter,
    pub operations: IntCounterVec,

    // Histograms
    pub rpc_latency: HistogramVec,
    pub operation_latency: HistogramVec,
}

impl SdkMetrics {
    /// Create new metrics instance with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rpc_requests = IntCounterVec::new(
            Opts::new("ledger_sdk_rpc_requests_total", "RPC requests issued"),
            &["method", "outcome"],
        )?;

        let rpc_accounts_requested = IntCounter::with_opts(Opts::new(
            "ledger_sdk_rpc_accounts_requested_total",
            "Account addresses requested through batched reads",
        ))?;

        let operations = IntCounterVec::new(
            Opts::new("ledger_sdk_operations_total", "Operation executions by final status"),
            &["kind", "status"],
        )?;

        let rpc_latency = HistogramVec::new(
            HistogramOpts::new("ledger_sdk_rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )?;

        let operation_latency = HistogramVec::new(
            HistogramOpts::new(
                "ledger_sdk_operation_latency_seconds",
                "Operation execution latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;

        registry.register(Box::new(rpc_requests.clone()))?;
        registry.register(Box::new(rpc_accounts_requested.clone()))?;
        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(operation_latency.clone()))?;

        Ok(Self {
            registry,
            rpc_requests,
            rpc_accounts_requested,
            operations,
            rpc_latency,
            operation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_rpc(&self, method: &str, success: bool, elapsed_secs: f64) {
        let outcome = if success { "ok" } else { "error" };
        self.rpc_requests
            .with_label_values(&[method, outcome])
            .inc();
        self.rpc_latency
            .with_label_values(&[method])
            .observe(elapsed_secs);
    }

    pub fn record_operation(&self, kind: &str, status: &str, elapsed_secs: f64) {
        self.operations.with_label_values(&[kind, status]).inc();
        self.operation_latency
            .with_label_values(&[kind])
            .observe(elapsed_secs);
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

/// Global metrics instance
///
/// `None` only if the collectors could not be registered, in which case
/// recording becomes a no-op.
pub fn metrics() -> Option<&'static SdkMetrics> {
    static METRICS: once_cell::sync::Lazy<Option<SdkMetrics>> =
        once_cell::sync::Lazy::new(|| match SdkMetrics::new() {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to initialize metrics; recording disabled");
                None
            }
        });
    METRICS.as_ref()
}

/// Timer helper for measuring operation duration
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Record an RPC call that started when this timer did
    pub fn finish_rpc(self, method: &str, success: bool) {
        if let Some(m) = metrics() {
            m.record_rpc(method, success, self.elapsed_secs());
        }
    }

    /// Record an operation execution that started when this timer did
    pub fn finish_operation(self, kind: &str, status: &str) {
        if let Some(m) = metrics() {
            m.record_operation(kind, status, self.elapsed_secs());
        }
    }
}
