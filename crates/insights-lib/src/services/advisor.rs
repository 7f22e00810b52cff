//! Advisor recommendations grouped per VM

use super::Insights;
use crate::arm::Recommendation;
use crate::error::Result;
use crate::models::{AdvisorEntry, AdvisorRecord, VIRTUAL_MACHINE_TYPE};
use std::collections::HashMap;
use tracing::info;

impl Insights {
    /// Subscription-wide recommendations, kept only for VM resources
    ///
    /// Groups appear in the order their first recommendation was listed.
    pub async fn advisor_recommendations(&self, subscription_id: &str) -> Result<Vec<AdvisorRecord>> {
        info!(subscription_id = %subscription_id, "Fetching Advisor recommendations");

        let recommendations = self.api.list_advisor_recommendations(subscription_id).await?;
        Ok(group_by_vm(recommendations))
    }
}

fn group_by_vm(recommendations: Vec<Recommendation>) -> Vec<AdvisorRecord> {
    let mut records: Vec<AdvisorRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for rec in recommendations {
        let properties = rec.properties;
        let Some(resource_id) = properties
            .resource_metadata
            .and_then(|m| m.resource_id)
            .filter(|id| id.contains(VIRTUAL_MACHINE_TYPE))
        else {
            continue;
        };

        let (short_description, remediation) = match properties.short_description {
            Some(d) => (d.problem, d.solution),
            None => (None, None),
        };
        let entry = AdvisorEntry {
            recommendation_name: rec.name,
            category: non_empty(properties.category),
            impact: non_empty(properties.impact),
            risk: non_empty(properties.risk),
            short_description,
            remediation,
        };

        let slot = *index.entry(resource_id.clone()).or_insert_with(|| {
            records.push(AdvisorRecord {
                resource_id,
                recommendations: Vec::new(),
            });
            records.len() - 1
        });
        records[slot].recommendations.push(entry);
    }

    records
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
