//! Runtime hours and CPU/memory metrics

use anyhow::Result;
use insights_lib::{MetricStats, MetricsTimeseriesRecord};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    format_bytes, format_percent, or_dash, print_info, print_json, print_table, resource_name,
    OutputFormat,
};

#[derive(Tabled)]
struct RuntimeRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "Runtime Hours")]
    hours: u64,
    #[tabled(rename = "Uptime")]
    uptime: String,
}

#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "CPU avg")]
    cpu_average: String,
    #[tabled(rename = "CPU min")]
    cpu_min: String,
    #[tabled(rename = "CPU max")]
    cpu_max: String,
    #[tabled(rename = "Free memory avg")]
    memory_average: String,
    #[tabled(rename = "Free memory min")]
    memory_min: String,
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "At")]
    at: String,
}

/// Share of the lookback window a VM was available, as a percentage
pub fn uptime_percent(runtime_hours: u64, lookback_days: i64) -> f64 {
    let window_hours = (lookback_days.max(1) * 24) as f64;
    (runtime_hours as f64 / window_hours * 100.0).min(100.0)
}

/// Show hours each VM was available over the last `days`
pub async fn show_runtime(
    client: &ApiClient,
    subscription_id: &str,
    days: i64,
    format: OutputFormat,
) -> Result<()> {
    let records = client.runtime_hours(subscription_id, days).await?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<RuntimeRow> = records
                .iter()
                .map(|r| RuntimeRow {
                    vm: resource_name(&r.resource_id).to_string(),
                    hours: r.runtime_hours,
                    uptime: format_percent(uptime_percent(r.runtime_hours, days)),
                })
                .collect();
            print_info(&format!("Runtime over the last {} days", days));
            print_table(&rows);
        }
    }

    Ok(())
}

/// Show CPU and memory summaries, or the raw five-minute series
pub async fn show_metrics(
    client: &ApiClient,
    subscription_id: &str,
    hours: i64,
    timeseries: bool,
    format: OutputFormat,
) -> Result<()> {
    if timeseries {
        let records = client.metrics_timeseries(subscription_id, hours).await?;
        return match format {
            OutputFormat::Json => print_json(&records),
            OutputFormat::Table => {
                print_table(&series_rows(&records));
                Ok(())
            }
        };
    }

    let records = client.metrics_summary(subscription_id, hours).await?;
    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<MetricsRow> = records
                .iter()
                .map(|r| {
                    let cpu = r.cpu.unwrap_or_default();
                    let memory = r.memory.unwrap_or_default();
                    MetricsRow {
                        vm: resource_name(&r.resource_id).to_string(),
                        cpu_average: or_dash(cpu.average.map(format_percent)),
                        cpu_min: or_dash(cpu.min.map(format_percent)),
                        cpu_max: or_dash(cpu.max.map(format_percent)),
                        memory_average: memory_cell(&memory, |m| m.average),
                        memory_min: memory_cell(&memory, |m| m.min),
                    }
                })
                .collect();
            print_info(&format!("Metrics over the last {} hours", hours));
            print_table(&rows);
        }
    }

    Ok(())
}

fn memory_cell(stats: &MetricStats, pick: impl Fn(&MetricStats) -> Option<f64>) -> String {
    or_dash(pick(stats).map(format_bytes))
}

/// One row per VM and metric with the most recent sample
fn series_rows(records: &[MetricsTimeseriesRecord]) -> Vec<SeriesRow> {
    records
        .iter()
        .flat_map(|record| {
            let vm = resource_name(&record.resource_id).to_string();
            record.metrics.iter().map(move |series| {
                let latest = series
                    .time_series
                    .iter()
                    .rev()
                    .find(|point| point.average.is_some());
                SeriesRow {
                    vm: vm.clone(),
                    metric: or_dash(series.name.as_deref()),
                    points: series.time_series.len(),
                    latest: or_dash(latest.and_then(|p| p.average).map(|v| format!("{:.2}", v))),
                    at: or_dash(latest.map(|p| p.timestamp.as_str())),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use insights_lib::{MetricSeries, TimeseriesPoint};

    #[test]
    fn test_uptime_percent() {
        assert_eq!(uptime_percent(168, 7), 100.0);
        assert_eq!(uptime_percent(84, 7), 50.0);
        // Buckets at both window edges can push the count past the window
        assert_eq!(uptime_percent(170, 7), 100.0);
    }

    #[test]
    fn test_series_rows_use_last_non_null_sample() {
        let records = vec![MetricsTimeseriesRecord {
            resource_id: "/subscriptions/s/virtualMachines/web-01".to_string(),
            metrics: vec![MetricSeries {
                name: Some("Percentage CPU".to_string()),
                unit: Some("Percent".to_string()),
                time_series: vec![
                    TimeseriesPoint {
                        timestamp: "2024-05-01T10:00:00+00:00".to_string(),
                        average: Some(12.5),
                    },
                    TimeseriesPoint {
                        timestamp: "2024-05-01T10:05:00+00:00".to_string(),
                        average: None,
                    },
                ],
            }],
        }];

        let rows = series_rows(&records);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vm, "web-01");
        assert_eq!(rows[0].points, 2);
        assert_eq!(rows[0].latest, "12.50");
        assert_eq!(rows[0].at, "2024-05-01T10:00:00+00:00");
    }
}
