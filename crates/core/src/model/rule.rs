use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Severity;

/// Compliance rule kinds.
///
/// Only the first three have checks today. The rest are declared so tenants
/// can author them ahead of time; rule strings this build does not know
/// deserialize as [`RuleType::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    CertificationRequirement,
    MaximumHours,
    RequiredRest,
    MinimumStaffing,
    BreakRequirement,
    OvertimeLimit,
    AgeRestriction,
    Custom,
    #[serde(other)]
    Unrecognized,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::CertificationRequirement => "CERTIFICATION_REQUIREMENT",
            RuleType::MaximumHours => "MAXIMUM_HOURS",
            RuleType::RequiredRest => "REQUIRED_REST",
            RuleType::MinimumStaffing => "MINIMUM_STAFFING",
            RuleType::BreakRequirement => "BREAK_REQUIREMENT",
            RuleType::OvertimeLimit => "OVERTIME_LIMIT",
            RuleType::AgeRestriction => "AGE_RESTRICTION",
            RuleType::Custom => "CUSTOM",
            RuleType::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific rule parameters. Each rule type reads only its own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleParameters {
    #[serde(default)]
    pub required_certifications: Vec<String>,
    #[serde(default)]
    pub max_weekly_hours: Option<f64>,
    #[serde(default)]
    pub required_rest_hours_between_shifts: Option<f64>,
}

/// A tenant-defined policy checked on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRule {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub parameters: RuleParameters,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}
