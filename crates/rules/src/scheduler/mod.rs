//! Per-tenant recurring compliance jobs plus one global certification sweep.
//!
//! The [`TenantScheduler`] owns a map from tenant id to a cancelable
//! [`JobHandle`]. Configuration changes call
//! [`reconcile`](TenantScheduler::reconcile), which replaces a tenant's job
//! under the registry lock so two jobs for one tenant never coexist.
//!
//! The scheduler only knows the [`PassRunner`] contract; the orchestrator
//! implements it.

mod cadence;
mod core;
mod entry;
mod job;

#[cfg(test)]
mod tests;

pub use self::cadence::{normalize_cron, parse_schedule, Cadence};
pub use self::core::{ScheduleChange, TenantScheduler};
pub use self::entry::TenantScheduleEntry;
pub use self::job::{JobHandle, PassRunner};
