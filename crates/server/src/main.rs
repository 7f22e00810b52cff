//! VM insights - Azure virtual machine insights aggregator
//!
//! Runs the HTTP API that fans out to Azure Resource Manager, Resource
//! Graph, Monitor, Policy Insights and Advisor and returns flat records.

use anyhow::{Context, Result};
use insights_lib::{
    arm::ArmClient,
    credential::{build_credential, ARM_SCOPE},
    health::{components, HealthRegistry},
    observability::{InsightsMetrics, StructuredLogger},
    Insights,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vm_insights::{api, config};

const SERVICE_NAME: &str = "vm-insights";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting {}", SERVICE_NAME);

    let config = config::ServiceConfig::load()?;
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.api_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CREDENTIAL).await;
    health_registry.register(components::RESOURCE_MANAGER).await;

    let metrics = InsightsMetrics::new();
    let logger = StructuredLogger::new(SERVICE_NAME);

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let credential = build_credential(&config.credential_settings(), http)?;
    logger.log_startup(SERVICE_VERSION, &config.arm_endpoint, credential.name());

    // A failed probe leaves the service up; requests retry the credential
    match credential.get_token(ARM_SCOPE).await {
        Ok(_) => {
            health_registry.set_healthy(components::CREDENTIAL).await;
            logger.log_credential_probe(credential.name(), Ok(()));
        }
        Err(err) => {
            let message = err.to_string();
            health_registry
                .set_degraded(components::CREDENTIAL, message.clone())
                .await;
            logger.log_credential_probe(credential.name(), Err(&message));
        }
    }

    let arm = ArmClient::new(config.arm_client_config(), credential, metrics.clone())?;
    let insights = Insights::new(Arc::new(arm), config.insights_options(), metrics.clone());

    let app_state = Arc::new(
        api::AppState::new(insights, health_registry.clone(), metrics, logger.clone())
            .with_error_status_codes(config.error_status_codes),
    );

    health_registry.set_ready(true).await;

    api::serve(addr, app_state, shutdown_signal(logger)).await?;
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal(logger: StructuredLogger) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    logger.log_shutdown("SIGINT received");
}
