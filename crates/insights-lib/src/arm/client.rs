//! `reqwest` implementation of [`AzureApi`] against Azure Resource Manager

use super::types::*;
use super::AzureApi;
use crate::credential::{TokenCredential, ARM_SCOPE};
use crate::error::{AzureError, Result};
use crate::observability::InsightsMetrics;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Public cloud Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

const MANAGEMENT_GROUPS_API_VERSION: &str = "2020-05-01";
const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";
const RESOURCES_API_VERSION: &str = "2021-04-01";
const METRICS_API_VERSION: &str = "2018-01-01";
const POLICY_INSIGHTS_API_VERSION: &str = "2019-10-01";
const ADVISOR_API_VERSION: &str = "2020-01-01";

/// Upper bound on followed `nextLink`s for one listing
const MAX_PAGES: usize = 500;

/// Configuration for the ARM client
#[derive(Debug, Clone)]
pub struct ArmClientConfig {
    /// Resource Manager base URL
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ArmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Azure Resource Manager client authenticated with an injected credential
pub struct ArmClient {
    http: Client,
    base_url: Url,
    credential: Arc<dyn TokenCredential>,
    metrics: InsightsMetrics,
}

impl ArmClient {
    pub fn new(
        config: ArmClientConfig,
        credential: Arc<dyn TokenCredential>,
        metrics: InsightsMetrics,
    ) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        let base_url = Url::parse(&config.endpoint)?;

        Ok(Self {
            http,
            base_url,
            credential,
            metrics,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `/subscriptions/{id}/...` with the id kept as one encoded path segment
    fn subscription_url(
        &self,
        subscription_id: &str,
        suffix: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url> {
        if matches!(subscription_id.trim(), "" | "." | "..") {
            return Err(AzureError::InvalidRequest(format!(
                "invalid subscription id: {subscription_id:?}"
            )));
        }

        let mut url = self.url("/subscriptions", query)?;
        url.path_segments_mut()
            .map_err(|_| {
                AzureError::InvalidRequest(format!("endpoint cannot be a base: {}", self.base_url))
            })?
            .push(subscription_id)
            .extend(suffix);
        Ok(url)
    }

    /// Send one authenticated request and decode the JSON body
    async fn send<T: DeserializeOwned>(&self, api: &'static str, request: RequestBuilder) -> Result<T> {
        let result = self.execute(request).await;
        self.metrics
            .inc_upstream_call(api, if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let token = self.credential.get_token(ARM_SCOPE).await?;
        let response = request.bearer_auth(&token.token).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AzureError::from_response(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextLink` until the listing is exhausted
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        api: &'static str,
        method: Method,
        first: Url,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(AzureError::InvalidRequest(format!(
                    "{api} listing exceeded {MAX_PAGES} pages"
                )));
            }

            let mut request = self.http.request(method.clone(), url);
            if method == Method::POST {
                request = request.body("");
            }

            let page: Page<T> = self.send(api, request).await?;
            items.extend(page.value);
            next = page.next_link.map(|link| Url::parse(&link)).transpose()?;
        }

        debug!(api, pages, items = items.len(), "Collected paged listing");
        Ok(items)
    }
}

/// Resource IDs must be absolute ARM paths
fn resource_path(resource_id: &str, suffix: &str) -> Result<String> {
    if !resource_id.starts_with('/') {
        return Err(AzureError::InvalidRequest(format!(
            "resource id must start with '/': {resource_id}"
        )));
    }
    Ok(format!("{}/{}", resource_id.trim_end_matches('/'), suffix))
}

fn join_names<I: IntoIterator<Item = S>, S: AsRef<str>>(names: I) -> String {
    names
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl AzureApi for ArmClient {
    async fn list_entities(&self, group_name: &str) -> Result<Vec<EntityInfo>> {
        let url = self.url(
            "/providers/Microsoft.Management/getEntities",
            &[
                ("api-version", MANAGEMENT_GROUPS_API_VERSION),
                ("groupName", group_name),
            ],
        )?;
        self.collect_pages("management_groups", Method::POST, url).await
    }

    async fn query_resource_graph(&self, request: &ResourceGraphRequest) -> Result<ResourceGraphResponse> {
        let url = self.url(
            "/providers/Microsoft.ResourceGraph/resources",
            &[("api-version", RESOURCE_GRAPH_API_VERSION)],
        )?;
        self.send("resource_graph", self.http.post(url).json(request)).await
    }

    async fn list_resources(&self, subscription_id: &str, filter: &str) -> Result<Vec<GenericResource>> {
        let url = self.subscription_url(
            subscription_id,
            &["resources"],
            &[("$filter", filter), ("api-version", RESOURCES_API_VERSION)],
        )?;
        self.collect_pages("resources", Method::GET, url).await
    }

    async fn query_metrics(&self, resource_id: &str, query: &MetricsQuery) -> Result<MetricsResponse> {
        let path = resource_path(resource_id, "providers/Microsoft.Insights/metrics")?;
        let metric_names = join_names(&query.metric_names);
        let aggregation = join_names(query.aggregations.iter().map(Aggregation::as_str));
        let timespan = query.timespan();

        let mut params = vec![
            ("api-version", METRICS_API_VERSION),
            ("metricnames", metric_names.as_str()),
            ("timespan", timespan.as_str()),
            ("aggregation", aggregation.as_str()),
        ];
        if let Some(interval) = &query.interval {
            params.push(("interval", interval.as_str()));
        }

        let url = self.url(&path, &params)?;
        self.send("metrics", self.http.get(url)).await
    }

    async fn query_policy_states(&self, resource_id: &str, top: u32) -> Result<Vec<PolicyState>> {
        let path = resource_path(
            resource_id,
            "providers/Microsoft.PolicyInsights/policyStates/latest/queryResults",
        )?;
        let top = top.to_string();
        let url = self.url(
            &path,
            &[("api-version", POLICY_INSIGHTS_API_VERSION), ("$top", top.as_str())],
        )?;

        let response: PolicyStatesResponse = self
            .send("policy_insights", self.http.post(url).body(""))
            .await?;
        Ok(response.value)
    }

    async fn list_advisor_recommendations(&self, subscription_id: &str) -> Result<Vec<Recommendation>> {
        let url = self.subscription_url(
            subscription_id,
            &["providers", "Microsoft.Advisor", "recommendations"],
            &[("api-version", ADVISOR_API_VERSION)],
        )?;
        self.collect_pages("advisor", Method::GET, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticTokenCredential;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> ArmClient {
        ArmClient::new(
            ArmClientConfig {
                endpoint: server.url(),
                request_timeout: Duration::from_secs(5),
            },
            Arc::new(StaticTokenCredential::new("test-token")),
            InsightsMetrics::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_resources_follows_next_link() {
        let mut server = mockito::Server::new_async().await;
        let second_page = format!("{}/page2?api-version=2021-04-01", server.url());

        let first = server
            .mock("GET", "/subscriptions/sub-1/resources")
            .match_header("authorization", "Bearer test-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "$filter".into(),
                    "resourceType eq 'Microsoft.Compute/virtualMachines'".into(),
                ),
                Matcher::UrlEncoded("api-version".into(), "2021-04-01".into()),
            ]))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "value": [{"id": "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1"}],
                    "nextLink": second_page,
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/page2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value":[{"id":"/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm2"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let resources = client
            .list_resources("sub-1", "resourceType eq 'Microsoft.Compute/virtualMachines'")
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(resources.len(), 2);
        assert!(resources[1].id.ends_with("/vm2"));
    }

    #[tokio::test]
    async fn test_resource_graph_posts_query_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/providers/Microsoft.ResourceGraph/resources")
            .match_query(Matcher::UrlEncoded("api-version".into(), "2021-03-01".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "subscriptions": [],
                "managementGroups": ["mg-root"],
            })))
            .with_status(200)
            .with_body(r#"{"totalRecords":1,"count":1,"data":[{"subscriptionId":"/subscriptions/abc","displayName":"Prod"}],"$skipToken":"next"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .query_resource_graph(&ResourceGraphRequest {
                subscriptions: vec![],
                management_groups: vec!["mg-root".into()],
                query: "ResourceContainers".into(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.skip_token.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_query_metrics_encodes_parameters() {
        let mut server = mockito::Server::new_async().await;
        let resource_id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1";
        let mock = server
            .mock(
                "GET",
                format!("{resource_id}/providers/Microsoft.Insights/metrics").as_str(),
            )
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("metricnames".into(), "Percentage CPU,Available Memory Bytes".into()),
                Matcher::UrlEncoded("interval".into(), "PT5M".into()),
                Matcher::UrlEncoded("aggregation".into(), "Average".into()),
                Matcher::UrlEncoded(
                    "timespan".into(),
                    "2024-05-01T00:00:00+00:00/2024-05-02T00:00:00+00:00".into(),
                ),
            ]))
            .with_status(200)
            .with_body(
                r#"{"value":[{"name":{"value":"Percentage CPU","localizedValue":"Percentage CPU"},"unit":"Percent","timeseries":[{"data":[{"timeStamp":"2024-05-01T00:00:00Z","average":12.5}]}]}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let query = MetricsQuery {
            metric_names: vec!["Percentage CPU".into(), "Available Memory Bytes".into()],
            start: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            interval: Some("PT5M".into()),
            aggregations: vec![Aggregation::Average],
        };
        let response = client.query_metrics(resource_id, &query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.value[0].name.value.as_deref(), Some("Percentage CPU"));
        assert_eq!(response.value[0].timeseries[0].data[0].average, Some(12.5));
    }

    #[tokio::test]
    async fn test_policy_states_reads_single_page() {
        let mut server = mockito::Server::new_async().await;
        let resource_id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1";
        let mock = server
            .mock(
                "POST",
                format!("{resource_id}/providers/Microsoft.PolicyInsights/policyStates/latest/queryResults").as_str(),
            )
            .match_query(Matcher::UrlEncoded("$top".into(), "1000".into()))
            .with_status(200)
            .with_body(
                r#"{"@odata.nextLink":"https://example.invalid/more","value":[{"policyAssignmentName":"a1","policyDefinitionName":"d1","complianceState":"NonCompliant","timestamp":"2024-05-01T10:00:00Z"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let states = client.query_policy_states(resource_id, 1000).await.unwrap();

        mock.assert_async().await;
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].compliance_state.as_deref(), Some("NonCompliant"));
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/subscriptions/sub-1/providers/Microsoft.Advisor/recommendations")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"SubscriptionNotFound","message":"The subscription 'sub-1' could not be found."}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.list_advisor_recommendations("sub-1").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "(SubscriptionNotFound) The subscription 'sub-1' could not be found."
        );
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_relative_resource_id_is_rejected() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let err = client.query_policy_states("vm1", 10).await.unwrap_err();
        assert!(matches!(err, AzureError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_subscription_id_stays_inside_its_segment() {
        let mut server = mockito::Server::new_async().await;
        let escaped = server
            .mock("GET", "/providers/Microsoft.Management/managementGroups")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value":[{"id":"/providers/Microsoft.Management/managementGroups/root"}]}"#)
            .expect(0)
            .create_async()
            .await;
        let encoded = server
            .mock(
                "GET",
                Matcher::Regex(
                    r"^/subscriptions/x%2F\.\.%2F\.\.%2Fproviders%2FMicrosoft\.Management%2FmanagementGroups%3F/providers/Microsoft\.Advisor/recommendations$".into(),
                ),
            )
            .match_query(Matcher::UrlEncoded("api-version".into(), "2020-01-01".into()))
            .with_status(200)
            .with_body(r#"{"value":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let recommendations = client
            .list_advisor_recommendations("x/../../providers/Microsoft.Management/managementGroups?")
            .await
            .unwrap();

        escaped.assert_async().await;
        encoded.assert_async().await;
        assert!(recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_dot_segment_subscription_id_is_rejected() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);

        for id in ["", ".", ".."] {
            let err = client.list_resources(id, "").await.unwrap_err();
            assert!(matches!(err, AzureError::InvalidRequest(_)), "{id:?}");
        }
    }
}
