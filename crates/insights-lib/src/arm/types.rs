//! Wire shapes of the Azure management APIs
//!
//! Only the fields the handlers read are modelled; everything else in the
//! payloads is ignored during deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a paged ARM list response
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", alias = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Entry returned by the management group entities listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub properties: EntityProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityProperties {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// Body of a Resource Graph query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceGraphRequest {
    pub subscriptions: Vec<String>,
    #[serde(rename = "managementGroups", skip_serializing_if = "Vec::is_empty")]
    pub management_groups: Vec<String>,
    pub query: String,
}

/// First page of a Resource Graph result set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceGraphResponse {
    #[serde(rename = "totalRecords", default)]
    pub total_records: i64,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(rename = "$skipToken")]
    pub skip_token: Option<String>,
}

/// Generic resource from the subscription resource listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenericResource {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
}

/// Parameters of a single metrics query
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub metric_names: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// ISO-8601 interval such as `PT1H`; `None` leaves the engine default
    pub interval: Option<String>,
    pub aggregations: Vec<Aggregation>,
}

impl MetricsQuery {
    /// `start/end` in the form the metrics API expects
    pub fn timespan(&self) -> String {
        format!("{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Average,
    Minimum,
    Maximum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Average => "Average",
            Aggregation::Minimum => "Minimum",
            Aggregation::Maximum => "Maximum",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub value: Vec<Metric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub name: LocalizableString,
    pub unit: Option<String>,
    #[serde(default)]
    pub timeseries: Vec<TimeSeriesElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalizableString {
    pub value: Option<String>,
    #[serde(rename = "localizedValue")]
    pub localized_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSeriesElement {
    #[serde(default)]
    pub data: Vec<MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricValue {
    #[serde(rename = "timeStamp")]
    pub timestamp: DateTime<Utc>,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Latest compliance record for one policy against one resource
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyState {
    #[serde(rename = "policyAssignmentName")]
    pub policy_assignment_name: Option<String>,
    #[serde(rename = "policyDefinitionName")]
    pub policy_definition_name: Option<String>,
    #[serde(rename = "complianceState")]
    pub compliance_state: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyStatesResponse {
    #[serde(default)]
    pub value: Vec<PolicyState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Recommendation {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub properties: RecommendationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationProperties {
    pub category: Option<String>,
    pub impact: Option<String>,
    pub risk: Option<String>,
    #[serde(rename = "shortDescription")]
    pub short_description: Option<ShortDescription>,
    #[serde(rename = "resourceMetadata")]
    pub resource_metadata: Option<ResourceMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShortDescription {
    pub problem: Option<String>,
    pub solution: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceMetadata {
    #[serde(rename = "resourceId")]
    pub resource_id: Option<String>,
}
