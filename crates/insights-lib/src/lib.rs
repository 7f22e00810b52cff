//! Library for aggregating Azure virtual machine insights
//!
//! This crate provides the core functionality for:
//! - Acquiring Azure tokens from an injected credential
//! - Calling Resource Manager, Resource Graph, Monitor, Policy Insights and Advisor
//! - Reshaping their responses into flat, dashboard-friendly records
//! - Health checks and observability

pub mod arm;
pub mod credential;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod queries;
pub mod services;

pub use error::{AzureError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{InsightsMetrics, StructuredLogger};
pub use services::{Insights, InsightsOptions};
