use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DEFAULT_FREQUENCY_HOURS, DEFAULT_WARNING_DAYS};

/// Agent kind string for the compliance monitor.
pub const COMPLIANCE_AGENT: &str = "compliance-monitoring";

/// A tenant. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Agent kinds the tenant's plan grants access to.
    #[serde(default)]
    pub subscribed_agents: Vec<String>,
}

impl Business {
    pub fn has_agent(&self, agent: &str) -> bool {
        self.subscribed_agents.iter().any(|a| a == agent)
    }
}

/// A staff member of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Per-tenant, per-agent-kind settings edited by tenant administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfiguration {
    pub business_id: Uuid,
    #[serde(default = "default_agent_kind")]
    pub agent_kind: String,
    #[serde(default)]
    pub is_enabled: bool,
    /// Full-pass frequency, 1..=24 hours.
    #[serde(default = "default_frequency_hours")]
    pub monitoring_frequency_hours: u32,
    #[serde(default = "default_warning_days")]
    pub certification_warning_days: u32,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl AgentConfiguration {
    /// A compliance-monitoring configuration with default frequency and window.
    pub fn compliance(business_id: Uuid, is_enabled: bool) -> Self {
        Self {
            business_id,
            agent_kind: COMPLIANCE_AGENT.to_string(),
            is_enabled,
            monitoring_frequency_hours: DEFAULT_FREQUENCY_HOURS,
            certification_warning_days: DEFAULT_WARNING_DAYS,
            updated_at: Utc::now(),
        }
    }

    pub fn with_frequency(mut self, hours: u32) -> Self {
        self.monitoring_frequency_hours = hours;
        self
    }

    pub fn with_warning_days(mut self, days: u32) -> Self {
        self.certification_warning_days = days;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_agent_kind() -> String {
    COMPLIANCE_AGENT.to_string()
}

fn default_frequency_hours() -> u32 {
    DEFAULT_FREQUENCY_HOURS
}

fn default_warning_days() -> u32 {
    DEFAULT_WARNING_DAYS
}
