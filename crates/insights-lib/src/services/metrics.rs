//! CPU and memory metrics, summarised or as raw series

use super::{endpoints, validate_lookback, Insights};
use crate::arm::{Aggregation, Metric, MetricValue, MetricsQuery, MetricsResponse};
use crate::error::{AzureError, Result};
use crate::models::{
    MetricSeries, MetricStats, MetricsSummaryRecord, MetricsTimeseriesRecord, TimeseriesPoint,
};
use chrono::{Duration, Utc};
use tracing::info;

pub const CPU_METRIC: &str = "Percentage CPU";
pub const AVAILABLE_MEMORY_METRIC: &str = "Available Memory Bytes";

/// Granularity of the timeseries endpoint
const TIMESERIES_INTERVAL: &str = "PT5M";

impl Insights {
    /// Average, min and max of CPU and available memory per VM
    ///
    /// Each statistic is the mean of that statistic across the buckets of
    /// the first returned series, so `min` is the mean of bucket minimums.
    /// Granularity is left to the metrics engine.
    pub async fn metrics_summary(
        &self,
        subscription_id: &str,
        lookback_hours: i64,
    ) -> Result<Vec<MetricsSummaryRecord>> {
        info!(subscription_id = %subscription_id, lookback_hours, "Fetching CPU and memory metrics");

        let query = cpu_memory_query(
            lookback_hours,
            None,
            vec![Aggregation::Average, Aggregation::Minimum, Aggregation::Maximum],
        )?;
        let vms = self.list_vms(subscription_id).await?;
        let api = &self.api;
        let query = &query;

        self.for_each_vm(endpoints::METRICS_SUMMARY, vms, |vm| async move {
            let response = api.query_metrics(&vm.id, query).await?;
            Ok(MetricsSummaryRecord {
                cpu: find_metric(&response, CPU_METRIC).map(summarize).transpose()?,
                memory: find_metric(&response, AVAILABLE_MEMORY_METRIC)
                    .map(summarize)
                    .transpose()?,
                resource_id: vm.id,
            })
        })
        .await
    }

    /// Five-minute averages of CPU and available memory per VM
    ///
    /// Points of all series of a metric are concatenated in series order.
    pub async fn metrics_timeseries(
        &self,
        subscription_id: &str,
        lookback_hours: i64,
    ) -> Result<Vec<MetricsTimeseriesRecord>> {
        info!(subscription_id = %subscription_id, lookback_hours, "Fetching time series for CPU and memory");

        let query = cpu_memory_query(
            lookback_hours,
            Some(TIMESERIES_INTERVAL),
            vec![Aggregation::Average],
        )?;
        let vms = self.list_vms(subscription_id).await?;
        let api = &self.api;
        let query = &query;

        self.for_each_vm(endpoints::METRICS_TIMESERIES, vms, |vm| async move {
            let response = api.query_metrics(&vm.id, query).await?;
            let metrics = response
                .value
                .into_iter()
                .map(|metric| MetricSeries {
                    time_series: metric
                        .timeseries
                        .iter()
                        .flat_map(|series| &series.data)
                        .map(|point| TimeseriesPoint {
                            timestamp: point.timestamp.to_rfc3339(),
                            average: point.average,
                        })
                        .collect(),
                    name: metric.name.value,
                    unit: metric.unit,
                })
                .collect();

            Ok(MetricsTimeseriesRecord {
                resource_id: vm.id,
                metrics,
            })
        })
        .await
    }
}

fn cpu_memory_query(
    lookback_hours: i64,
    interval: Option<&str>,
    aggregations: Vec<Aggregation>,
) -> Result<MetricsQuery> {
    validate_lookback("lookback_hours", lookback_hours)?;

    let end = Utc::now();
    let start = Duration::try_hours(lookback_hours)
        .and_then(|window| end.checked_sub_signed(window))
        .ok_or_else(|| {
            AzureError::InvalidRequest(format!("lookback_hours {lookback_hours} is out of range"))
        })?;

    Ok(MetricsQuery {
        metric_names: vec![CPU_METRIC.to_string(), AVAILABLE_MEMORY_METRIC.to_string()],
        start,
        end,
        interval: interval.map(str::to_string),
        aggregations,
    })
}

/// Last metric with the given name; later entries shadow earlier ones
fn find_metric<'a>(response: &'a MetricsResponse, name: &str) -> Option<&'a Metric> {
    response
        .value
        .iter()
        .rev()
        .find(|m| m.name.value.as_deref() == Some(name))
}

/// Stats over the first series; a metric returned without any series is an error
fn summarize(metric: &Metric) -> Result<MetricStats> {
    let points: &[MetricValue] = match metric.timeseries.first() {
        Some(series) => series.data.as_slice(),
        None => {
            return Err(AzureError::UnexpectedResponse(format!(
                "metric '{}' returned no time series",
                metric.name.value.as_deref().unwrap_or_default()
            )))
        }
    };

    Ok(MetricStats {
        average: mean_rounded(points.iter().filter_map(|p| p.average)),
        min: mean_rounded(points.iter().filter_map(|p| p.minimum)),
        max: mean_rounded(points.iter().filter_map(|p| p.maximum)),
    })
}

/// Arithmetic mean rounded half-to-even to two decimals; `None` when there are no values
pub fn mean_rounded(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        return None;
    }
    Some(((sum / count as f64) * 100.0).round_ties_even() / 100.0)
}
