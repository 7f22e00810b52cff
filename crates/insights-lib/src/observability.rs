//! Observability infrastructure for the insights service
//!
//! Provides:
//! - Prometheus metrics (request latency and outcomes, upstream Azure calls, VMs processed)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for request latency (in seconds); handlers fan out to
/// Azure so these run much longer than in-process work
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InsightsMetricsInner> = OnceLock::new();

struct InsightsMetricsInner {
    request_latency_seconds: HistogramVec,
    requests_total: IntCounterVec,
    upstream_calls_total: IntCounterVec,
    vms_processed_total: IntCounterVec,
}

impl InsightsMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram_vec!(
                "vm_insights_request_latency_seconds",
                "Time spent serving an insights endpoint",
                &["endpoint"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "vm_insights_requests_total",
                "Insights requests by endpoint and outcome",
                &["endpoint", "outcome"]
            )
            .expect("Failed to register requests_total"),

            upstream_calls_total: register_int_counter_vec!(
                "vm_insights_upstream_calls_total",
                "Calls made to Azure management APIs by API surface and outcome",
                &["api", "outcome"]
            )
            .expect("Failed to register upstream_calls_total"),

            vms_processed_total: register_int_counter_vec!(
                "vm_insights_vms_processed_total",
                "Virtual machines aggregated per endpoint",
                &["endpoint"]
            )
            .expect("Failed to register vms_processed_total"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct InsightsMetrics {
    _private: (),
}

impl Default for InsightsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InsightsMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightsMetrics").finish()
    }
}

impl InsightsMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InsightsMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InsightsMetricsInner {
        GLOBAL_METRICS.get_or_init(InsightsMetricsInner::new)
    }

    /// Record how long an endpoint took to answer
    pub fn observe_request_latency(&self, endpoint: &str, duration_secs: f64) {
        self.inner()
            .request_latency_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Count a finished request; outcome is `success`, `error` or `rejected`
    pub fn inc_requests(&self, endpoint: &str, outcome: &str) {
        self.inner()
            .requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    pub fn inc_upstream_call(&self, api: &str, outcome: &str) {
        self.inner()
            .upstream_calls_total
            .with_label_values(&[api, outcome])
            .inc();
    }

    pub fn add_vms_processed(&self, endpoint: &str, count: usize) {
        self.inner()
            .vms_processed_total
            .with_label_values(&[endpoint])
            .inc_by(count as u64);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for startup, shutdown and
/// handler failures.
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, arm_endpoint: &str, credential: &str) {
        info!(
            event = "service_started",
            service = %self.service_name,
            version = %version,
            arm_endpoint = %arm_endpoint,
            credential = %credential,
            "VM insights service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "VM insights service shutting down"
        );
    }

    /// Log the outcome of the startup token probe
    pub fn log_credential_probe(&self, credential: &str, result: Result<(), &str>) {
        match result {
            Ok(()) => info!(
                event = "credential_probe",
                service = %self.service_name,
                credential = %credential,
                success = true,
                "Acquired Resource Manager token"
            ),
            Err(reason) => warn!(
                event = "credential_probe",
                service = %self.service_name,
                credential = %credential,
                success = false,
                reason = %reason,
                "Could not acquire Resource Manager token, requests will fail until it can"
            ),
        }
    }

    /// Log a handler failure that is returned to the caller as an error body
    pub fn log_handler_error(&self, endpoint: &str, scope: &str, message: &str) {
        error!(
            event = "handler_failed",
            service = %self.service_name,
            endpoint = %endpoint,
            scope = %scope,
            error = %message,
            "Error fetching {}: {}",
            endpoint,
            message
        );
    }

    /// Log a completed aggregation
    pub fn log_handler_success(&self, endpoint: &str, scope: &str, records: usize, elapsed_ms: u128) {
        info!(
            event = "handler_completed",
            service = %self.service_name,
            endpoint = %endpoint,
            scope = %scope,
            records = records,
            elapsed_ms = elapsed_ms as u64,
            "Aggregation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insights_metrics_creation() {
        // Prometheus uses a process-wide registry; repeated handles share it
        let metrics = InsightsMetrics::new();
        let again = InsightsMetrics::new();

        metrics.observe_request_latency("virtualmachines", 0.2);
        metrics.inc_requests("virtualmachines", "success");
        again.inc_upstream_call("resource_graph", "success");
        again.add_vms_processed("vm-metrics", 3);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "vm_insights_upstream_calls_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("vm-insights");
        assert_eq!(logger.service_name, "vm-insights");
    }
}
