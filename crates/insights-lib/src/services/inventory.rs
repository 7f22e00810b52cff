//! VM inventory with hybrid benefit estimates

use super::Insights;
use crate::arm::ResourceGraphRequest;
use crate::error::Result;
use crate::models::VirtualMachineRecord;
use crate::queries::vm_inventory_query;
use tracing::info;

impl Insights {
    /// Every VM in the subscription, ordered by name
    ///
    /// Sizes, cores, costs and the remediation command are all computed by
    /// the Resource Graph query; rows are passed through as returned.
    pub async fn virtual_machines(&self, subscription_id: &str) -> Result<Vec<VirtualMachineRecord>> {
        info!(subscription_id = %subscription_id, "Fetching virtual machines");

        let request = ResourceGraphRequest {
            subscriptions: vec![subscription_id.to_string()],
            management_groups: Vec::new(),
            query: vm_inventory_query(&self.options.rates),
        };
        let response = self.api.query_resource_graph(&request).await?;

        Ok(serde_json::from_value(serde_json::Value::Array(response.data))?)
    }
}
