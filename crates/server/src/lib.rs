//! VM insights HTTP service
//!
//! Serves the Azure virtual machine insights endpoints over axum, along with
//! health checks and Prometheus metrics.

pub mod api;
pub mod config;
