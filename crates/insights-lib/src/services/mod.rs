//! Aggregation handlers behind the insights endpoints
//!
//! Each handler issues its Azure calls through [`AzureApi`] and reshapes
//! the result into the flat records of [`crate::models`]. Per-VM lookups
//! run through one bounded fan-out that keeps listing order and stops at
//! the first failure, so a handler either returns every record or an error.

mod advisor;
mod compliance;
mod directory;
mod inventory;
mod metrics;
mod runtime;


pub use metrics::{mean_rounded, AVAILABLE_MEMORY_METRIC, CPU_METRIC};
pub use runtime::AVAILABILITY_METRIC;

use crate::arm::{AzureApi, GenericResource};
use crate::error::{AzureError, Result};
use crate::observability::InsightsMetrics;
use crate::queries::{HybridBenefitRates, VM_RESOURCE_FILTER};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;

/// Endpoint names, used for routing, metric labels and log fields
pub mod endpoints {
    pub const MANAGEMENT_GROUPS: &str = "managementGroups/children";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const VIRTUAL_MACHINES: &str = "virtualmachines";
    pub const RUNTIME_HOURS: &str = "vm-runtimehours";
    pub const POLICY_COMPLIANCE: &str = "vm-policy-compliance";
    pub const ADVISOR: &str = "vm-advisor-recommendations";
    pub const METRICS_SUMMARY: &str = "vm-metrics";
    pub const METRICS_TIMESERIES: &str = "vm-metrics-timeseries";
}

/// Management group listed when the caller names no parent
pub const ROOT_MANAGEMENT_GROUP: &str = "root";

/// Tunables for the handlers
#[derive(Debug, Clone)]
pub struct InsightsOptions {
    pub rates: HybridBenefitRates,
    /// Per-VM lookups in flight at once; 1 keeps them strictly sequential
    pub max_concurrency: usize,
    pub root_management_group: String,
}

impl Default for InsightsOptions {
    fn default() -> Self {
        Self {
            rates: HybridBenefitRates::default(),
            max_concurrency: 1,
            root_management_group: ROOT_MANAGEMENT_GROUP.to_string(),
        }
    }
}

/// The insights handlers, bound to an Azure API implementation
#[derive(Clone)]
pub struct Insights {
    api: Arc<dyn AzureApi>,
    options: InsightsOptions,
    metrics: InsightsMetrics,
}

impl Insights {
    pub fn new(api: Arc<dyn AzureApi>, options: InsightsOptions, metrics: InsightsMetrics) -> Self {
        Self {
            api,
            options,
            metrics,
        }
    }

    /// Every VM resource in the subscription
    async fn list_vms(&self, subscription_id: &str) -> Result<Vec<GenericResource>> {
        self.api
            .list_resources(subscription_id, VM_RESOURCE_FILTER)
            .await
    }

    /// Run `lookup` for every VM, keeping VM order and failing on the first error
    async fn for_each_vm<T, F, Fut>(
        &self,
        endpoint: &'static str,
        vms: Vec<GenericResource>,
        lookup: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(GenericResource) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let count = vms.len();
        let results: Vec<T> = stream::iter(vms.into_iter().map(lookup))
            .buffered(self.options.max_concurrency.max(1))
            .try_collect()
            .await?;

        self.metrics.add_vms_processed(endpoint, count);
        Ok(results)
    }
}

/// Lookback windows must cover at least one unit
fn validate_lookback(name: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(AzureError::InvalidRequest(format!(
            "{name} must be at least 1, got {value}"
        )));
    }
    Ok(())
}
