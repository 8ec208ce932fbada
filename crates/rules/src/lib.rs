//! Staff compliance monitoring engine.
//!
//! This crate provides:
//! - Certification lifecycle evaluation (`ACTIVE -> EXPIRING_SOON -> EXPIRED`)
//! - A rule evaluator with per-type dispatch and placeholder checks
//! - Alert reconciliation with deduplication, escalation and user transitions
//! - The per-tenant compliance pass and the global certification sweep
//! - A tenant scheduler that keeps one recurring job per enabled tenant
//! - `ComplianceService`, the operations surface for the API layer

pub mod alerts;
pub mod evaluator;
pub mod finding;
pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod scheduler;
pub mod seed;
pub mod service;

pub use alerts::AlertManager;
pub use finding::Finding;
pub use orchestrator::ComplianceMonitor;
pub use report::{PassOutcome, PassReport, PassScope, SkipReason, SweepReport};
pub use scheduler::TenantScheduler;
pub use service::ComplianceService;
