//! Latest policy compliance per VM

use super::{endpoints, Insights};
use crate::error::Result;
use crate::models::{ComplianceRecord, PolicyStateEntry};
use tracing::info;

/// Page size for the single policy states request per VM
pub const POLICY_STATES_TOP: u32 = 1000;

impl Insights {
    /// Policy states of each VM; VMs without any state are left out
    pub async fn policy_compliance(&self, subscription_id: &str) -> Result<Vec<ComplianceRecord>> {
        info!(subscription_id = %subscription_id, "Fetching policy compliance");

        let vms = self.list_vms(subscription_id).await?;
        let api = &self.api;

        let records = self
            .for_each_vm(endpoints::POLICY_COMPLIANCE, vms, |vm| async move {
                let states = api.query_policy_states(&vm.id, POLICY_STATES_TOP).await?;
                let policies = states
                    .into_iter()
                    .map(|state| PolicyStateEntry {
                        policy_assignment: state.policy_assignment_name,
                        policy_definition: state.policy_definition_name,
                        compliance_state: state.compliance_state,
                        timestamp: state.timestamp.map(|t| t.to_rfc3339()),
                    })
                    .collect();

                Ok(ComplianceRecord {
                    resource_id: vm.id,
                    policies,
                })
            })
            .await?;

        Ok(records
            .into_iter()
            .filter(|record: &ComplianceRecord| !record.policies.is_empty())
            .collect())
    }
}
