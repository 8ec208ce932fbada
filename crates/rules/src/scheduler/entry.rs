//! Per-tenant schedule entry type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Snapshot of a registered tenant job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScheduleEntry {
    pub business_id: Uuid,
    /// Full-pass frequency the job was created with.
    pub frequency_hours: u32,
    /// Normalized 6-field cron expression (seconds first).
    pub cron_expression: String,
    /// When this job replaced its predecessor, or was first created.
    pub created_at: DateTime<Utc>,
}
