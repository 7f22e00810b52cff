//! Runtime hours from the VM availability metric

use super::{endpoints, validate_lookback, Insights};
use crate::arm::{Aggregation, MetricsQuery, MetricsResponse};
use crate::error::{AzureError, Result};
use crate::models::RuntimeHoursRecord;
use chrono::{Duration, Utc};
use tracing::info;

/// Platform metric that reads 1 for every fully available interval
pub const AVAILABILITY_METRIC: &str = "VmAvailabilityMetric";

impl Insights {
    /// Hours each VM was fully available over the last `lookback_days`
    pub async fn runtime_hours(
        &self,
        subscription_id: &str,
        lookback_days: i64,
    ) -> Result<Vec<RuntimeHoursRecord>> {
        validate_lookback("lookback_days", lookback_days)?;
        info!(subscription_id = %subscription_id, lookback_days, "Fetching runtime hours");

        let end = Utc::now();
        let start = Duration::try_days(lookback_days)
            .and_then(|window| end.checked_sub_signed(window))
            .ok_or_else(|| AzureError::InvalidRequest(format!("lookback_days {lookback_days} is out of range")))?;
        let query = MetricsQuery {
            metric_names: vec![AVAILABILITY_METRIC.to_string()],
            start,
            end,
            interval: Some("PT1H".to_string()),
            aggregations: vec![Aggregation::Average],
        };

        let vms = self.list_vms(subscription_id).await?;
        let api = &self.api;
        let query = &query;

        self.for_each_vm(endpoints::RUNTIME_HOURS, vms, |vm| async move {
            let response = api.query_metrics(&vm.id, query).await?;
            Ok(RuntimeHoursRecord {
                runtime_hours: count_available_hours(&response),
                resource_id: vm.id,
            })
        })
        .await
    }
}

/// Hourly buckets of the first metric whose average is exactly 1
pub(crate) fn count_available_hours(response: &MetricsResponse) -> u64 {
    response
        .value
        .first()
        .map(|metric| {
            metric
                .timeseries
                .iter()
                .flat_map(|series| &series.data)
                .filter(|point| point.average == Some(1.0))
                .count() as u64
        })
        .unwrap_or(0)
}
