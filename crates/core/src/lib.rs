//! Shared types for the staff compliance monitor.
//!
//! This crate provides:
//! - Tenant-scoped data model (certifications, rules, alerts, agent configuration)
//! - `ComplianceError` taxonomy
//! - Environment-driven `MonitorConfig`
//! - `ComplianceStore` contract plus an in-memory implementation
//! - Traits for the staffing-data and access-policy collaborators

pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod providers;
pub mod store;

pub use config::MonitorConfig;
pub use error::*;
pub use memory::MemoryStore;
pub use model::*;
pub use store::ComplianceStore;
