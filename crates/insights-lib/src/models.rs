//! Response models served by the insights endpoints
//!
//! Field names follow the JSON contract consumed by dashboards, so most
//! structs rename their fields explicitly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Entity type string Azure uses for management groups
pub const MANAGEMENT_GROUP_TYPE: &str = "Microsoft.Management/managementGroups";

/// Resource type of a virtual machine as reported by Resource Manager
pub const VIRTUAL_MACHINE_TYPE: &str = "Microsoft.Compute/virtualMachines";

/// A management group directly below the requested parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementGroupEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
}

/// Subscription row as projected by the Resource Graph query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(rename = "subscriptionId")]
    pub subscription_id: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// VM inventory row; every computed column comes from the Resource Graph query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineRecord {
    #[serde(rename = "VMName")]
    pub vm_name: Option<String>,
    #[serde(rename = "ResourceGroup")]
    pub resource_group: Option<String>,
    #[serde(rename = "VMSize")]
    pub vm_size: Option<String>,
    #[serde(rename = "Cores")]
    pub cores: Option<i64>,
    #[serde(rename = "OperatingSystem")]
    pub operating_system: Option<String>,
    #[serde(rename = "HybridBenefitStatus")]
    pub hybrid_benefit_status: Option<String>,
    #[serde(rename = "HybridBenefitCost")]
    pub hybrid_benefit_cost: Option<f64>,
    #[serde(rename = "NoHybridCost")]
    pub no_hybrid_cost: Option<f64>,
    #[serde(rename = "PowerState")]
    pub power_state: Option<String>,
    #[serde(rename = "ApplyHybridBenefitCommand")]
    pub apply_hybrid_benefit_command: Option<String>,
    pub tags: Option<serde_json::Value>,
}

/// Hours a VM reported full availability over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeHoursRecord {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    #[serde(rename = "runtimeHours")]
    pub runtime_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyStateEntry {
    #[serde(rename = "policyAssignment")]
    pub policy_assignment: Option<String>,
    #[serde(rename = "policyDefinition")]
    pub policy_definition: Option<String>,
    #[serde(rename = "complianceState")]
    pub compliance_state: Option<String>,
    pub timestamp: Option<String>,
}

/// Latest policy states of a single VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub policies: Vec<PolicyStateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorEntry {
    #[serde(rename = "recommendationName")]
    pub recommendation_name: Option<String>,
    pub category: Option<String>,
    pub impact: Option<String>,
    pub risk: Option<String>,
    #[serde(rename = "shortDescription")]
    pub short_description: Option<String>,
    pub remediation: Option<String>,
}

/// Advisor recommendations grouped under one VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRecord {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub recommendations: Vec<AdvisorEntry>,
}

/// Averages of the per-bucket average/minimum/maximum statistics
///
/// `min` and `max` are means of the bucket minimums and maximums, not the
/// extreme raw samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummaryRecord {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    #[serde(serialize_with = "stats_or_empty", deserialize_with = "empty_or_stats")]
    pub cpu: Option<MetricStats>,
    #[serde(serialize_with = "stats_or_empty", deserialize_with = "empty_or_stats")]
    pub memory: Option<MetricStats>,
}

/// A missing metric is rendered as `{}` rather than null
fn stats_or_empty<S: Serializer>(stats: &Option<MetricStats>, serializer: S) -> Result<S::Ok, S::Error> {
    match stats {
        Some(stats) => stats.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

fn empty_or_stats<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<MetricStats>, D::Error> {
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    if map.is_empty() {
        return Ok(None);
    }
    serde_json::from_value(serde_json::Value::Object(map))
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub timestamp: String,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "timeSeries")]
    pub time_series: Vec<TimeseriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsTimeseriesRecord {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub metrics: Vec<MetricSeries>,
}

/// Body of every insights response: the record list, or a single error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Error { error: String },
    Data(Vec<T>),
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<Vec<T>, String> {
        match self {
            Envelope::Data(items) => Ok(items),
            Envelope::Error { error } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_metric_serializes_as_empty_object() {
        let record = MetricsSummaryRecord {
            resource_id: "/subscriptions/s/vm1".into(),
            cpu: Some(MetricStats {
                average: Some(12.5),
                min: None,
                max: Some(40.0),
            }),
            memory: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "resourceId": "/subscriptions/s/vm1",
                "cpu": {"average": 12.5, "min": null, "max": 40.0},
                "memory": {}
            })
        );

        let back: MetricsSummaryRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_vm_record_uses_query_column_names() {
        let row = json!({
            "VMName": "web-01",
            "ResourceGroup": "rg-web",
            "VMSize": "Standard_D4s_v3",
            "Cores": 4,
            "OperatingSystem": "Windows",
            "HybridBenefitStatus": "None",
            "HybridBenefitCost": 10.8,
            "NoHybridCost": 55.0,
            "PowerState": "PowerState/running",
            "ApplyHybridBenefitCommand": "az vm update --resource-group rg-web --name web-01 --set licenseType=Windows_Server",
            "tags": {"env": "prod"}
        });

        let record: VirtualMachineRecord = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(record.cores, Some(4));
        assert_eq!(record.hybrid_benefit_status.as_deref(), Some("None"));
        assert_eq!(serde_json::to_value(&record).unwrap(), row);
    }

    #[test]
    fn test_envelope_distinguishes_error_from_data() {
        let err: Envelope<RuntimeHoursRecord> =
            serde_json::from_value(json!({"error": "(AuthorizationFailed) denied"})).unwrap();
        assert_eq!(err.into_result(), Err("(AuthorizationFailed) denied".to_string()));

        let data: Envelope<RuntimeHoursRecord> =
            serde_json::from_value(json!([{"resourceId": "vm", "runtimeHours": 3}])).unwrap();
        assert_eq!(data.into_result().unwrap()[0].runtime_hours, 3);
    }
}
