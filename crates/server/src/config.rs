//! Service configuration

use anyhow::{Context, Result};
use insights_lib::arm::{ArmClientConfig, DEFAULT_ARM_ENDPOINT};
use insights_lib::credential::{CredentialKind, CredentialSettings};
use insights_lib::queries::HybridBenefitRates;
use insights_lib::services::{InsightsOptions, ROOT_MANAGEMENT_GROUP};
use serde::Deserialize;
use std::time::Duration;

/// Service configuration, read from `INSIGHTS_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Port the HTTP API listens on
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Resource Manager base URL (sovereign clouds differ)
    #[serde(default = "default_arm_endpoint")]
    pub arm_endpoint: String,

    /// Entra ID authority for the client secret flow
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Instance metadata service for managed identity
    #[serde(default = "default_imds_endpoint")]
    pub imds_endpoint: String,

    #[serde(default)]
    pub credential: CredentialKind,

    #[serde(default = "default_tenant_id")]
    pub tenant_id: Option<String>,

    #[serde(default = "default_client_id")]
    pub client_id: Option<String>,

    #[serde(default = "default_client_secret")]
    pub client_secret: Option<String>,

    /// Bearer token for the `static` credential
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Per-VM lookups in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Answer handler failures with 4xx/5xx instead of 200 + error body
    #[serde(default)]
    pub error_status_codes: bool,

    #[serde(default = "default_root_management_group")]
    pub root_management_group: String,

    #[serde(default = "default_hybrid_core_cap")]
    pub hybrid_core_cap: u32,

    #[serde(default = "default_hybrid_rate")]
    pub hybrid_rate: f64,

    #[serde(default = "default_no_hybrid_rate")]
    pub no_hybrid_rate: f64,
}

fn default_api_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_arm_endpoint() -> String {
    DEFAULT_ARM_ENDPOINT.to_string()
}

fn default_authority_host() -> String {
    std::env::var("AZURE_AUTHORITY_HOST")
        .unwrap_or_else(|_| "https://login.microsoftonline.com".to_string())
}

fn default_imds_endpoint() -> String {
    "http://169.254.169.254".to_string()
}

fn default_tenant_id() -> Option<String> {
    std::env::var("AZURE_TENANT_ID").ok()
}

fn default_client_id() -> Option<String> {
    std::env::var("AZURE_CLIENT_ID").ok()
}

fn default_client_secret() -> Option<String> {
    std::env::var("AZURE_CLIENT_SECRET").ok()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    1
}

fn default_root_management_group() -> String {
    ROOT_MANAGEMENT_GROUP.to_string()
}

fn default_hybrid_core_cap() -> u32 {
    HybridBenefitRates::default().core_cap
}

fn default_hybrid_rate() -> f64 {
    HybridBenefitRates::default().hybrid_rate
}

fn default_no_hybrid_rate() -> f64 {
    HybridBenefitRates::default().no_hybrid_rate
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("INSIGHTS").try_parsing(true))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid INSIGHTS_* configuration")?;

        if config.max_concurrency == 0 {
            anyhow::bail!("INSIGHTS_MAX_CONCURRENCY must be at least 1");
        }
        Ok(config)
    }

    pub fn credential_settings(&self) -> CredentialSettings {
        CredentialSettings {
            kind: self.credential,
            authority_host: self.authority_host.clone(),
            imds_endpoint: self.imds_endpoint.clone(),
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            access_token: self.access_token.clone(),
        }
    }

    pub fn arm_client_config(&self) -> ArmClientConfig {
        ArmClientConfig {
            endpoint: self.arm_endpoint.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn insights_options(&self) -> InsightsOptions {
        InsightsOptions {
            rates: HybridBenefitRates {
                core_cap: self.hybrid_core_cap,
                hybrid_rate: self.hybrid_rate,
                no_hybrid_rate: self.no_hybrid_rate,
            },
            max_concurrency: self.max_concurrency,
            root_management_group: self.root_management_group.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_environment(
            config::Environment::with_prefix("INSIGHTS")
                .try_parsing(true)
                .source(Some(source)),
        )
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load_with(&[]).unwrap();

        assert_eq!(config.api_port, 8000);
        assert_eq!(config.arm_endpoint, "https://management.azure.com");
        assert_eq!(config.credential, CredentialKind::Auto);
        assert_eq!(config.max_concurrency, 1);
        assert!(!config.error_status_codes);
        assert_eq!(config.insights_options().rates, HybridBenefitRates::default());
        assert_eq!(config.insights_options().root_management_group, "root");
    }

    #[test]
    fn test_environment_overrides() {
        let config = load_with(&[
            ("INSIGHTS_API_PORT", "9100"),
            ("INSIGHTS_CREDENTIAL", "managed_identity"),
            ("INSIGHTS_MAX_CONCURRENCY", "8"),
            ("INSIGHTS_ERROR_STATUS_CODES", "true"),
            ("INSIGHTS_HYBRID_RATE", "3.5"),
        ])
        .unwrap();

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.credential, CredentialKind::ManagedIdentity);
        assert_eq!(config.insights_options().max_concurrency, 8);
        assert!(config.error_status_codes);
        assert_eq!(config.insights_options().rates.hybrid_rate, 3.5);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(load_with(&[("INSIGHTS_MAX_CONCURRENCY", "0")]).is_err());
    }
}
