//! Transient evaluator output, before reconciliation into alerts.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shiftguard_core::model::{AlertData, AlertKey, AlertType, Severity};

/// A violation or status change detected during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub business_id: Uuid,
    pub user_id: Option<Uuid>,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub data: AlertData,
}

impl Finding {
    pub fn alert_type(&self) -> AlertType {
        self.data.alert_type()
    }

    pub fn rule_id(&self) -> Option<Uuid> {
        self.data.rule_id()
    }

    /// Deduplication key of the alert this finding maps to.
    pub fn key(&self) -> AlertKey {
        AlertKey {
            business_id: self.business_id,
            user_id: self.user_id,
            alert_type: self.alert_type(),
            related_entity_id: self.data.related_entity_id(),
        }
    }
}
