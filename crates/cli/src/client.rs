//! API client for communicating with the insights service

use anyhow::{Context, Result};
use insights_lib::{
    AdvisorRecord, ComplianceRecord, Envelope, ManagementGroupEntity, MetricsSummaryRecord,
    MetricsTimeseriesRecord, RuntimeHoursRecord, SubscriptionRecord, VirtualMachineRecord,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

/// API client for the insights service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            // Metrics endpoints fan out per VM and can take minutes
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// GET an insights endpoint and unwrap its record list
    ///
    /// An `{"error": ...}` body is turned into an error even on 200.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct ErrorBody {
                error: String,
            }
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).context("Failed to parse response")?;
        envelope
            .into_result()
            .map_err(|message| anyhow::anyhow!("Service error: {}", message))
    }

    pub async fn management_groups(&self, parent: Option<&str>) -> Result<Vec<ManagementGroupEntity>> {
        let query: Vec<(&str, String)> = parent.map(|p| ("mgmt", p.to_string())).into_iter().collect();
        self.get_list("managementGroups/children", &query).await
    }

    pub async fn subscriptions(&self, management_group: &str) -> Result<Vec<SubscriptionRecord>> {
        self.get_list("subscriptions", &[("mgmt", management_group.to_string())])
            .await
    }

    pub async fn virtual_machines(&self, subscription_id: &str) -> Result<Vec<VirtualMachineRecord>> {
        self.get_list("virtualmachines", &[("subscription_id", subscription_id.to_string())])
            .await
    }

    pub async fn runtime_hours(
        &self,
        subscription_id: &str,
        lookback_days: i64,
    ) -> Result<Vec<RuntimeHoursRecord>> {
        self.get_list(
            "vm-runtimehours",
            &[
                ("subscription_id", subscription_id.to_string()),
                ("lookback_days", lookback_days.to_string()),
            ],
        )
        .await
    }

    pub async fn policy_compliance(&self, subscription_id: &str) -> Result<Vec<ComplianceRecord>> {
        self.get_list("vm-policy-compliance", &[("subscription_id", subscription_id.to_string())])
            .await
    }

    pub async fn advisor_recommendations(&self, subscription_id: &str) -> Result<Vec<AdvisorRecord>> {
        self.get_list(
            "vm-advisor-recommendations",
            &[("subscription_id", subscription_id.to_string())],
        )
        .await
    }

    pub async fn metrics_summary(
        &self,
        subscription_id: &str,
        lookback_hours: i64,
    ) -> Result<Vec<MetricsSummaryRecord>> {
        self.get_list(
            "vm-metrics",
            &[
                ("subscription_id", subscription_id.to_string()),
                ("lookback_hours", lookback_hours.to_string()),
            ],
        )
        .await
    }

    pub async fn metrics_timeseries(
        &self,
        subscription_id: &str,
        lookback_hours: i64,
    ) -> Result<Vec<MetricsTimeseriesRecord>> {
        self.get_list(
            "vm-metrics-timeseries",
            &[
                ("subscription_id", subscription_id.to_string()),
                ("lookback_hours", lookback_hours.to_string()),
            ],
        )
        .await
    }
}
