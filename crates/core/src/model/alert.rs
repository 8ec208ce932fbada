use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    CertificationExpiry,
    MissingCertification,
    HoursViolation,
    RestViolation,
    ScheduleViolation,
    QualificationViolation,
    CustomViolation,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::CertificationExpiry => "CERTIFICATION_EXPIRY",
            AlertType::MissingCertification => "MISSING_CERTIFICATION",
            AlertType::HoursViolation => "HOURS_VIOLATION",
            AlertType::RestViolation => "REST_VIOLATION",
            AlertType::ScheduleViolation => "SCHEDULE_VIOLATION",
            AlertType::QualificationViolation => "QUALIFICATION_VIOLATION",
            AlertType::CustomViolation => "CUSTOM_VIOLATION",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "ACTIVE",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Dismissed => "DISMISSED",
        }
    }

    /// Non-terminal statuses participate in deduplication.
    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display snapshot stored on an alert so reads never need a join.
///
/// The variant determines both the alert type and the related entity used in
/// the deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AlertData {
    #[serde(rename_all = "camelCase")]
    CertificationExpiry {
        certification_id: Uuid,
        certification_name: String,
        staff_name: String,
        expiry_date: DateTime<Utc>,
        /// Whole days until expiry; negative once expired.
        days_remaining: i64,
        expired: bool,
    },
    #[serde(rename_all = "camelCase")]
    MissingCertification {
        rule_id: Uuid,
        rule_name: String,
        certification_name: String,
        staff_name: String,
    },
    #[serde(rename_all = "camelCase")]
    HoursViolation {
        rule_id: Uuid,
        rule_name: String,
        staff_name: String,
        current_hours: f64,
        max_weekly_hours: f64,
    },
    #[serde(rename_all = "camelCase")]
    RestViolation {
        rule_id: Uuid,
        rule_name: String,
        staff_name: String,
        rest_hours: f64,
        required_rest_hours: f64,
    },
}

impl AlertData {
    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertData::CertificationExpiry { .. } => AlertType::CertificationExpiry,
            AlertData::MissingCertification { .. } => AlertType::MissingCertification,
            AlertData::HoursViolation { .. } => AlertType::HoursViolation,
            AlertData::RestViolation { .. } => AlertType::RestViolation,
        }
    }

    /// Entity component of the deduplication key. Certification names are
    /// matched case-insensitively, so the key uses the folded name.
    pub fn related_entity_id(&self) -> String {
        match self {
            AlertData::CertificationExpiry {
                certification_id, ..
            } => certification_id.to_string(),
            AlertData::MissingCertification {
                rule_id,
                certification_name,
                ..
            } => format!("{rule_id}:{}", certification_name.trim().to_lowercase()),
            AlertData::HoursViolation { rule_id, .. } | AlertData::RestViolation { rule_id, .. } => {
                rule_id.to_string()
            }
        }
    }

    /// Rule that produced the finding, if it came from a rule.
    pub fn rule_id(&self) -> Option<Uuid> {
        match self {
            AlertData::CertificationExpiry { .. } => None,
            AlertData::MissingCertification { rule_id, .. }
            | AlertData::HoursViolation { rule_id, .. }
            | AlertData::RestViolation { rule_id, .. } => Some(*rule_id),
        }
    }
}

/// Alert identity across repeated passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub business_id: Uuid,
    pub user_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub related_entity_id: String,
}

/// Persisted, user-facing record of a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceAlert {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub related_entity_id: String,
    pub related_data: AlertData,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComplianceAlert {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            business_id: self.business_id,
            user_id: self.user_id,
            alert_type: self.alert_type,
            related_entity_id: self.related_entity_id.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}
