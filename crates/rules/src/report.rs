//! Pass and sweep summaries returned by the orchestrator and logged at the
//! end of every run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::alerts::Reconciled;

/// Which evaluators a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PassScope {
    /// Certification lifecycle and rules.
    Full,
    /// Certification lifecycle only (the global daily sweep).
    CertificationsOnly,
}

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NoAccess,
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Completed(PassReport),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub business_id: Uuid,
    pub scope: PassScope,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub certifications_reviewed: usize,
    pub status_changes: usize,
    pub rules_evaluated: usize,
    pub rule_failures: usize,
    pub alerts_created: usize,
    pub alerts_updated: usize,
    pub alerts_resolved: usize,
    /// Per-item errors that were logged and skipped.
    pub item_failures: usize,
}

impl PassReport {
    pub fn new(business_id: Uuid, scope: PassScope, started_at: DateTime<Utc>) -> Self {
        Self {
            business_id,
            scope,
            started_at,
            finished_at: started_at,
            certifications_reviewed: 0,
            status_changes: 0,
            rules_evaluated: 0,
            rule_failures: 0,
            alerts_created: 0,
            alerts_updated: 0,
            alerts_resolved: 0,
            item_failures: 0,
        }
    }

    pub fn record(&mut self, reconciled: &Reconciled) {
        match reconciled {
            Reconciled::Created(_) => self.alerts_created += 1,
            Reconciled::Updated(_) => self.alerts_updated += 1,
            Reconciled::Unchanged(_) | Reconciled::Skipped => {}
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Tally of one global certification sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub tenants: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub status_changes: usize,
    pub alerts_created: usize,
}
