//! Azure Resource Manager access
//!
//! This module provides:
//! - The [`AzureApi`] trait, the only surface the handlers talk to
//! - [`ArmClient`], its `reqwest` implementation against management.azure.com
//! - Wire types for the management group, Resource Graph, metrics, policy
//!   and advisor APIs

mod client;
mod types;

pub use client::{ArmClient, ArmClientConfig, DEFAULT_ARM_ENDPOINT};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Upstream Azure operations used by the insights handlers
#[async_trait]
pub trait AzureApi: Send + Sync {
    /// List every entity (groups and subscriptions) below a management group
    async fn list_entities(&self, group_name: &str) -> Result<Vec<EntityInfo>>;

    /// Run a Resource Graph query; only the first page is returned
    async fn query_resource_graph(&self, request: &ResourceGraphRequest) -> Result<ResourceGraphResponse>;

    /// List resources in a subscription matching an OData filter
    async fn list_resources(&self, subscription_id: &str, filter: &str) -> Result<Vec<GenericResource>>;

    /// Query platform metrics for a single resource
    async fn query_metrics(&self, resource_id: &str, query: &MetricsQuery) -> Result<MetricsResponse>;

    /// Latest policy states for a resource, a single page of at most `top` rows
    async fn query_policy_states(&self, resource_id: &str, top: u32) -> Result<Vec<PolicyState>>;

    /// Every advisor recommendation in a subscription
    async fn list_advisor_recommendations(&self, subscription_id: &str) -> Result<Vec<Recommendation>>;
}
