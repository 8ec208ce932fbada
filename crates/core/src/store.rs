//! Document-store contract the engine runs against.
//!
//! Every entity kind gets typed `find`/`get`/`insert`/`update` operations.
//! Filters carry their own [`matches`](CertificationFilter::matches) logic so
//! any backend can share the same query semantics. Updates take a patch and
//! are atomic per record id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ComplianceResult;
use crate::model::*;

// ── Filters ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ConfigFilter {
    pub agent_kind: Option<String>,
    pub is_enabled: Option<bool>,
}

impl ConfigFilter {
    /// Enabled configurations of one agent kind.
    pub fn enabled(agent_kind: &str) -> Self {
        Self {
            agent_kind: Some(agent_kind.to_string()),
            is_enabled: Some(true),
        }
    }

    pub fn matches(&self, config: &AgentConfiguration) -> bool {
        self.agent_kind
            .as_deref()
            .map_or(true, |k| config.agent_kind == k)
            && self.is_enabled.map_or(true, |e| config.is_enabled == e)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificationFilter {
    pub business_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub statuses: Option<Vec<CertificationStatus>>,
    pub include_deleted: bool,
    /// Only certifications expiring at or after this instant.
    pub expires_from: Option<DateTime<Utc>>,
    /// Only certifications expiring at or before this instant.
    pub expires_until: Option<DateTime<Utc>>,
}

impl CertificationFilter {
    pub fn for_business(business_id: Uuid) -> Self {
        Self {
            business_id: Some(business_id),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[CertificationStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn expiring_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.expires_from = Some(from);
        self.expires_until = Some(until);
        self
    }

    pub fn matches(&self, cert: &StaffCertification) -> bool {
        (self.include_deleted || !cert.is_deleted)
            && self.business_id.map_or(true, |b| cert.business_id == b)
            && self.user_id.map_or(true, |u| cert.user_id == u)
            && self.name.as_deref().map_or(true, |n| cert.name == n)
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&cert.status))
            && self.expires_from.map_or(true, |t| cert.expiry_date >= t)
            && self.expires_until.map_or(true, |t| cert.expiry_date <= t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub business_id: Option<Uuid>,
    pub include_inactive: bool,
    pub include_deleted: bool,
    pub rule_type: Option<RuleType>,
}

impl RuleFilter {
    /// Active, non-deleted rules of one tenant.
    pub fn active_for(business_id: Uuid) -> Self {
        Self {
            business_id: Some(business_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, rule: &ComplianceRule) -> bool {
        (self.include_deleted || !rule.is_deleted)
            && (self.include_inactive || rule.is_active)
            && self.business_id.map_or(true, |b| rule.business_id == b)
            && self.rule_type.map_or(true, |t| rule.rule_type == t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub business_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub statuses: Option<Vec<AlertStatus>>,
    pub severities: Option<Vec<Severity>>,
    pub alert_types: Option<Vec<AlertType>>,
}

impl AlertFilter {
    pub fn for_business(business_id: Uuid) -> Self {
        Self {
            business_id: Some(business_id),
            ..Default::default()
        }
    }

    /// ACTIVE and ACKNOWLEDGED alerts only.
    pub fn open(mut self) -> Self {
        self.statuses = Some(vec![AlertStatus::Active, AlertStatus::Acknowledged]);
        self
    }

    pub fn with_statuses(mut self, statuses: &[AlertStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn with_types(mut self, types: &[AlertType]) -> Self {
        self.alert_types = Some(types.to_vec());
        self
    }

    pub fn matches(&self, alert: &ComplianceAlert) -> bool {
        self.business_id.map_or(true, |b| alert.business_id == b)
            && self.user_id.map_or(true, |u| alert.user_id == Some(u))
            && self.rule_id.map_or(true, |r| alert.rule_id == Some(r))
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&alert.status))
            && self
                .severities
                .as_ref()
                .map_or(true, |s| s.contains(&alert.severity))
            && self
                .alert_types
                .as_ref()
                .map_or(true, |t| t.contains(&alert.alert_type))
    }
}

// ── Patches ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CertificationPatch {
    pub name: Option<String>,
    pub issuing_authority: Option<Option<String>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub status: Option<CertificationStatus>,
    pub is_deleted: Option<bool>,
}

impl CertificationPatch {
    pub fn status(status: CertificationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(&self, cert: &mut StaffCertification) {
        if let Some(name) = &self.name {
            cert.name = name.clone();
        }
        if let Some(authority) = &self.issuing_authority {
            cert.issuing_authority = authority.clone();
        }
        if let Some(expiry) = self.expiry_date {
            cert.expiry_date = expiry;
        }
        if let Some(status) = self.status {
            cert.status = status;
        }
        if let Some(deleted) = self.is_deleted {
            cert.is_deleted = deleted;
        }
        cert.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub severity: Option<Severity>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
    pub parameters: Option<RuleParameters>,
}

impl RulePatch {
    pub fn apply(&self, rule: &mut ComplianceRule) {
        if let Some(name) = &self.name {
            rule.name = name.clone();
        }
        if let Some(description) = &self.description {
            rule.description = description.clone();
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
        if let Some(deleted) = self.is_deleted {
            rule.is_deleted = deleted;
        }
        if let Some(parameters) = &self.parameters {
            rule.parameters = parameters.clone();
        }
        rule.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertPatch {
    pub severity: Option<Severity>,
    pub status: Option<AlertStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub related_data: Option<AlertData>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Option<Uuid>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    /// Write only if the stored alert still has this status.
    pub expected_status: Option<AlertStatus>,
}

impl AlertPatch {
    /// Precondition on the stored status, checked atomically with the write.
    pub fn expecting(mut self, status: AlertStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.severity.is_none()
            && self.status.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.related_data.is_none()
            && self.acknowledged_by.is_none()
            && self.acknowledged_at.is_none()
            && self.resolved_by.is_none()
            && self.resolved_at.is_none()
            && self.resolution_notes.is_none()
    }

    pub fn apply(&self, alert: &mut ComplianceAlert) {
        if let Some(severity) = self.severity {
            alert.severity = severity;
        }
        if let Some(status) = self.status {
            alert.status = status;
        }
        if let Some(title) = &self.title {
            alert.title = title.clone();
        }
        if let Some(description) = &self.description {
            alert.description = description.clone();
        }
        if let Some(due) = self.due_date {
            alert.due_date = due;
        }
        if let Some(data) = &self.related_data {
            alert.related_data = data.clone();
        }
        if let Some(by) = self.acknowledged_by {
            alert.acknowledged_by = Some(by);
        }
        if let Some(at) = self.acknowledged_at {
            alert.acknowledged_at = Some(at);
        }
        if let Some(by) = self.resolved_by {
            alert.resolved_by = by;
        }
        if let Some(at) = self.resolved_at {
            alert.resolved_at = Some(at);
        }
        if let Some(notes) = &self.resolution_notes {
            alert.resolution_notes = Some(notes.clone());
        }
        alert.updated_at = Utc::now();
    }
}

/// Outcome of a conditional alert insert.
#[derive(Debug, Clone)]
pub enum AlertInsert {
    Inserted(ComplianceAlert),
    /// An open alert with the same key already existed; nothing was written.
    Existing(ComplianceAlert),
}

// ── Store trait ─────────────────────────────────────────────────────

/// Tenant data access. Implementations must make each `update_*` atomic per
/// id and [`insert_alert_if_absent`](ComplianceStore::insert_alert_if_absent)
/// atomic per [`AlertKey`].
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    async fn get_business(&self, id: Uuid) -> ComplianceResult<Option<Business>>;

    async fn get_user(&self, id: Uuid) -> ComplianceResult<Option<User>>;

    /// Non-deleted staff members of a tenant.
    async fn find_staff(&self, business_id: Uuid) -> ComplianceResult<Vec<User>>;

    async fn find_agent_configs(
        &self,
        filter: &ConfigFilter,
    ) -> ComplianceResult<Vec<AgentConfiguration>>;

    async fn get_agent_config(
        &self,
        business_id: Uuid,
        agent_kind: &str,
    ) -> ComplianceResult<Option<AgentConfiguration>>;

    async fn upsert_agent_config(
        &self,
        config: AgentConfiguration,
    ) -> ComplianceResult<AgentConfiguration>;

    /// Returns whether a configuration was removed.
    async fn delete_agent_config(&self, business_id: Uuid, agent_kind: &str)
        -> ComplianceResult<bool>;

    async fn find_certifications(
        &self,
        filter: &CertificationFilter,
    ) -> ComplianceResult<Vec<StaffCertification>>;

    async fn get_certification(&self, id: Uuid) -> ComplianceResult<Option<StaffCertification>>;

    async fn insert_certification(
        &self,
        cert: StaffCertification,
    ) -> ComplianceResult<StaffCertification>;

    async fn update_certification(
        &self,
        id: Uuid,
        patch: &CertificationPatch,
    ) -> ComplianceResult<StaffCertification>;

    async fn find_rules(&self, filter: &RuleFilter) -> ComplianceResult<Vec<ComplianceRule>>;

    async fn get_rule(&self, id: Uuid) -> ComplianceResult<Option<ComplianceRule>>;

    async fn insert_rule(&self, rule: ComplianceRule) -> ComplianceResult<ComplianceRule>;

    async fn update_rule(&self, id: Uuid, patch: &RulePatch) -> ComplianceResult<ComplianceRule>;

    async fn find_alerts(&self, filter: &AlertFilter) -> ComplianceResult<Vec<ComplianceAlert>>;

    /// The ACTIVE or ACKNOWLEDGED alert for a key, if any.
    async fn find_open_alert(&self, key: &AlertKey) -> ComplianceResult<Option<ComplianceAlert>>;

    async fn get_alert(&self, id: Uuid) -> ComplianceResult<Option<ComplianceAlert>>;

    async fn insert_alert_if_absent(&self, alert: ComplianceAlert) -> ComplianceResult<AlertInsert>;

    /// Fails with `InvalidTransition` when `patch.expected_status` is set and
    /// no longer matches the stored alert.
    async fn update_alert(&self, id: Uuid, patch: &AlertPatch) -> ComplianceResult<ComplianceAlert>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cert(status: CertificationStatus, deleted: bool) -> StaffCertification {
        StaffCertification {
            id: Uuid::new_v4(),
            business_id: Uuid::nil(),
            user_id: Uuid::nil(),
            name: "First Aid".into(),
            issuing_authority: None,
            expiry_date: Utc::now() + Duration::days(10),
            status,
            is_deleted: deleted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn certification_filter_excludes_deleted_by_default() {
        let filter = CertificationFilter::for_business(Uuid::nil());
        assert!(filter.matches(&cert(CertificationStatus::Active, false)));
        assert!(!filter.matches(&cert(CertificationStatus::Active, true)));
    }

    #[test]
    fn certification_filter_statuses_and_window() {
        let now = Utc::now();
        let filter = CertificationFilter::for_business(Uuid::nil())
            .with_statuses(&[CertificationStatus::ExpiringSoon])
            .expiring_between(now, now + Duration::days(30));
        assert!(filter.matches(&cert(CertificationStatus::ExpiringSoon, false)));
        assert!(!filter.matches(&cert(CertificationStatus::Active, false)));

        let narrow = CertificationFilter::for_business(Uuid::nil())
            .expiring_between(now, now + Duration::days(5));
        assert!(!narrow.matches(&cert(CertificationStatus::Active, false)));
    }

    #[test]
    fn config_filter_enabled() {
        let filter = ConfigFilter::enabled(COMPLIANCE_AGENT);
        assert!(filter.matches(&AgentConfiguration::compliance(Uuid::nil(), true)));
        assert!(!filter.matches(&AgentConfiguration::compliance(Uuid::nil(), false)));
    }

    #[test]
    fn empty_alert_patch() {
        assert!(AlertPatch::default().is_empty());
        let patch = AlertPatch {
            severity: Some(Severity::High),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
