//! HTTP API: the insights endpoints plus health checks and Prometheus metrics

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use insights_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{InsightsMetrics, StructuredLogger},
    services::endpoints,
    AzureError, Envelope, Insights,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub insights: Insights,
    pub health_registry: HealthRegistry,
    pub metrics: InsightsMetrics,
    pub logger: StructuredLogger,
    /// Map handler errors to their HTTP status instead of 200
    pub error_status_codes: bool,
}

impl AppState {
    pub fn new(
        insights: Insights,
        health_registry: HealthRegistry,
        metrics: InsightsMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            insights,
            health_registry,
            metrics,
            logger,
            error_status_codes: false,
        }
    }

    pub fn with_error_status_codes(mut self, enabled: bool) -> Self {
        self.error_status_codes = enabled;
        self
    }

    /// Record the outcome of a handler and render its envelope
    async fn respond<T: Serialize>(
        &self,
        endpoint: &'static str,
        scope: &str,
        started: Instant,
        result: Result<Vec<T>, AzureError>,
    ) -> Response {
        let elapsed = started.elapsed();
        self.metrics
            .observe_request_latency(endpoint, elapsed.as_secs_f64());
        self.health_registry
            .record_outcome(result.as_ref().map(|_| ()))
            .await;

        match result {
            Ok(records) => {
                self.metrics.inc_requests(endpoint, "success");
                self.logger
                    .log_handler_success(endpoint, scope, records.len(), elapsed.as_millis());
                (StatusCode::OK, Json(Envelope::Data(records))).into_response()
            }
            Err(err) => {
                self.metrics.inc_requests(endpoint, "error");
                let message = err.to_string();
                self.logger.log_handler_error(endpoint, scope, &message);

                let status = if self.error_status_codes {
                    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
                } else {
                    StatusCode::OK
                };
                (status, Json(Envelope::<T>::Error { error: message })).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ManagementGroupParams {
    pub mgmt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsParams {
    pub mgmt: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionParams {
    pub subscription_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RuntimeParams {
    pub subscription_id: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    pub subscription_id: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

fn default_lookback_days() -> i64 {
    7
}

fn default_lookback_hours() -> i64 {
    24
}

/// Missing or malformed query parameters
fn reject(rejection: QueryRejection) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": rejection.body_text() })),
    )
        .into_response()
}

async fn management_groups(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ManagementGroupParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();
    let parent = state
        .insights
        .management_group_or_root(params.mgmt.as_deref())
        .to_string();

    let result = state
        .insights
        .child_management_groups(params.mgmt.as_deref())
        .await;
    state
        .respond(endpoints::MANAGEMENT_GROUPS, &parent, started, result)
        .await
}

async fn subscriptions(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SubscriptionsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state.insights.subscriptions(&params.mgmt).await;
    state
        .respond(endpoints::SUBSCRIPTIONS, &params.mgmt, started, result)
        .await
}

async fn virtual_machines(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SubscriptionParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state.insights.virtual_machines(&params.subscription_id).await;
    state
        .respond(endpoints::VIRTUAL_MACHINES, &params.subscription_id, started, result)
        .await
}

async fn runtime_hours(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RuntimeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state
        .insights
        .runtime_hours(&params.subscription_id, params.lookback_days)
        .await;
    state
        .respond(endpoints::RUNTIME_HOURS, &params.subscription_id, started, result)
        .await
}

async fn policy_compliance(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SubscriptionParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state.insights.policy_compliance(&params.subscription_id).await;
    state
        .respond(endpoints::POLICY_COMPLIANCE, &params.subscription_id, started, result)
        .await
}

async fn advisor_recommendations(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SubscriptionParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state
        .insights
        .advisor_recommendations(&params.subscription_id)
        .await;
    state
        .respond(endpoints::ADVISOR, &params.subscription_id, started, result)
        .await
}

async fn metrics_summary(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MetricsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state
        .insights
        .metrics_summary(&params.subscription_id, params.lookback_hours)
        .await;
    state
        .respond(endpoints::METRICS_SUMMARY, &params.subscription_id, started, result)
        .await
}

async fn metrics_timeseries(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MetricsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return reject(rejection),
    };
    let started = Instant::now();

    let result = state
        .insights
        .metrics_timeseries(&params.subscription_id, params.lookback_hours)
        .await;
    state
        .respond(endpoints::METRICS_TIMESERIES, &params.subscription_id, started, result)
        .await
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving; Azure may recover
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/managementGroups/children", get(management_groups))
        .route("/subscriptions", get(subscriptions))
        .route("/virtualmachines", get(virtual_machines))
        .route("/vm-runtimehours", get(runtime_hours))
        .route("/vm-policy-compliance", get(policy_compliance))
        .route("/vm-advisor-recommendations", get(advisor_recommendations))
        .route("/vm-metrics", get(metrics_summary))
        .route("/vm-metrics-timeseries", get(metrics_timeseries))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
