//! External collaborators consulted during a pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComplianceResult;
use crate::store::ComplianceStore;

/// Time-tracking data for the hours and rest rules.
#[async_trait]
pub trait StaffingProvider: Send + Sync {
    /// Scheduled or worked hours in the current week.
    async fn weekly_hours(&self, user_id: Uuid, business_id: Uuid) -> ComplianceResult<f64>;

    /// Shortest gap between consecutive shifts, in hours.
    async fn inter_shift_gap(&self, user_id: Uuid, business_id: Uuid) -> ComplianceResult<f64>;
}

/// One staff member's figures in a [`StaticStaffing`] table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub user_id: Uuid,
    pub business_id: Uuid,
    #[serde(default)]
    pub weekly_hours: f64,
    /// `None` when the staff member has at most one shift on record.
    #[serde(default)]
    pub shortest_rest_hours: Option<f64>,
}

/// Fixed per-user figures; users without a row report zero hours and an
/// unbounded rest gap.
#[derive(Debug, Default)]
pub struct StaticStaffing {
    sheets: HashMap<(Uuid, Uuid), Timesheet>,
}

impl StaticStaffing {
    pub fn new(sheets: impl IntoIterator<Item = Timesheet>) -> Self {
        Self {
            sheets: sheets
                .into_iter()
                .map(|s| ((s.user_id, s.business_id), s))
                .collect(),
        }
    }
}

#[async_trait]
impl StaffingProvider for StaticStaffing {
    async fn weekly_hours(&self, user_id: Uuid, business_id: Uuid) -> ComplianceResult<f64> {
        Ok(self
            .sheets
            .get(&(user_id, business_id))
            .map_or(0.0, |s| s.weekly_hours))
    }

    async fn inter_shift_gap(&self, user_id: Uuid, business_id: Uuid) -> ComplianceResult<f64> {
        Ok(self
            .sheets
            .get(&(user_id, business_id))
            .and_then(|s| s.shortest_rest_hours)
            .unwrap_or(f64::INFINITY))
    }
}

/// Plan-level permission check made once per pass.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn has_agent_access(&self, business_id: Uuid, agent: &str) -> ComplianceResult<bool>;
}

/// Grants access when the business exists, is active, and subscribes to the agent.
pub struct StoreAccessPolicy {
    store: Arc<dyn ComplianceStore>,
}

impl StoreAccessPolicy {
    pub fn new(store: Arc<dyn ComplianceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessPolicy for StoreAccessPolicy {
    async fn has_agent_access(&self, business_id: Uuid, agent: &str) -> ComplianceResult<bool> {
        Ok(self
            .store
            .get_business(business_id)
            .await?
            .is_some_and(|b| b.is_active && b.has_agent(agent)))
    }
}
