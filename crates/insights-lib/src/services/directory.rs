//! Management group and subscription lookups

use super::Insights;
use crate::arm::ResourceGraphRequest;
use crate::error::Result;
use crate::models::{ManagementGroupEntity, SubscriptionRecord, MANAGEMENT_GROUP_TYPE};
use crate::queries::SUBSCRIPTIONS_QUERY;
use tracing::info;

impl Insights {
    /// `parent` when given and non-empty, else the configured root group
    pub fn management_group_or_root<'a>(&'a self, parent: Option<&'a str>) -> &'a str {
        parent
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.options.root_management_group)
    }

    /// Management groups directly below `parent` (the root group when absent)
    ///
    /// Subscriptions and other entity kinds in the listing are dropped.
    pub async fn child_management_groups(
        &self,
        parent: Option<&str>,
    ) -> Result<Vec<ManagementGroupEntity>> {
        let parent = self.management_group_or_root(parent);
        info!(parent = %parent, "Fetching child management groups");

        let entities = self.api.list_entities(parent).await?;

        Ok(entities
            .into_iter()
            .filter(|e| e.entity_type.as_deref() == Some(MANAGEMENT_GROUP_TYPE))
            .map(|e| ManagementGroupEntity {
                id: e.id,
                name: e.name,
                display_name: e.properties.display_name,
                entity_type: e.entity_type,
            })
            .collect())
    }

    /// Subscriptions under a management group, first result page only
    pub async fn subscriptions(&self, management_group: &str) -> Result<Vec<SubscriptionRecord>> {
        info!(management_group = %management_group, "Fetching subscriptions");

        let request = ResourceGraphRequest {
            subscriptions: Vec::new(),
            management_groups: vec![management_group.to_string()],
            query: SUBSCRIPTIONS_QUERY.to_string(),
        };
        let response = self.api.query_resource_graph(&request).await?;

        Ok(serde_json::from_value(serde_json::Value::Array(response.data))?)
    }
}
