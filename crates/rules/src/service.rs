//! [`ComplianceService`] — operations consumed by the API layer.
//!
//! User-triggered operations propagate every error to the caller.
//! Configuration writes are followed by a scheduler reconcile for the tenant.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use shiftguard_core::model::{
    AgentConfiguration, AlertStatus, AlertType, CertificationStatus, ComplianceAlert,
    ComplianceRule, RuleParameters, RuleType, Severity, StaffCertification, COMPLIANCE_AGENT,
};
use shiftguard_core::store::{
    AlertFilter, CertificationFilter, CertificationPatch, ComplianceStore, RuleFilter, RulePatch,
};
use shiftguard_core::{ComplianceError, ComplianceResult};

use crate::alerts::CERTIFICATION_RENEWED;
use crate::lifecycle::{days_remaining, status_for};
use crate::orchestrator::{ComplianceMonitor, RULE_ALERT_TYPES};
use crate::report::{PassOutcome, PassScope, SkipReason};
use crate::scheduler::{Cadence, ScheduleChange, TenantScheduler};

/// Notes written when a deleted certification clears its expiry alert.
pub const CERTIFICATION_REMOVED: &str = "Certification removed";

/// Notes written on a rule's open alerts when it is deactivated.
pub const RULE_DEACTIVATED: &str = "Rule deactivated";

/// Notes written on a rule's open alerts when it is deleted.
pub const RULE_REMOVED: &str = "Rule removed";

/// Upper bound for a tenant's certification warning window (ten years).
pub const MAX_WARNING_DAYS: u32 = 3650;

// ── Request / response types ────────────────────────────────────────

/// Optional filters for [`ComplianceService::get_business_alerts`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertQuery {
    pub statuses: Option<Vec<AlertStatus>>,
    pub severities: Option<Vec<Severity>>,
    pub alert_types: Option<Vec<AlertType>>,
    pub user_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertification {
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub issuing_authority: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificationUpdate {
    pub name: Option<String>,
    pub issuing_authority: Option<Option<String>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub business_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub severity: Severity,
    #[serde(default)]
    pub parameters: RuleParameters,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    pub is_enabled: bool,
    pub monitoring_frequency_hours: u32,
    pub certification_warning_days: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingExpiration {
    pub certification_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub expiry_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub status: CertificationStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub business_id: Uuid,
    /// Every alert, any status.
    pub alerts_by_status: BTreeMap<AlertStatus, usize>,
    /// Open (ACTIVE or ACKNOWLEDGED) alerts only.
    pub open_alerts_by_severity: BTreeMap<Severity, usize>,
    pub active_rules: usize,
    /// Certifications expiring within the horizon, soonest first.
    pub upcoming_expirations: Vec<UpcomingExpiration>,
    pub generated_at: DateTime<Utc>,
}

// ── Service ─────────────────────────────────────────────────────────

pub struct ComplianceService {
    monitor: Arc<ComplianceMonitor>,
    scheduler: Arc<TenantScheduler>,
}

impl ComplianceService {
    pub fn new(monitor: Arc<ComplianceMonitor>, scheduler: Arc<TenantScheduler>) -> Self {
        Self { monitor, scheduler }
    }

    fn store(&self) -> &Arc<dyn ComplianceStore> {
        self.monitor.store()
    }

    // ── Passes and alerts ───────────────────────────────────────────

    /// Run a full pass now and return the tenant's ACTIVE alert count.
    pub async fn run_manual_compliance_check(&self, business_id: Uuid) -> ComplianceResult<usize> {
        match self.monitor.run_pass(business_id, PassScope::Full).await? {
            PassOutcome::Completed(_) => {}
            PassOutcome::Skipped(SkipReason::AlreadyRunning) => {
                return Err(ComplianceError::PassInProgress { business_id })
            }
            PassOutcome::Skipped(SkipReason::NoAccess) => {
                return Err(ComplianceError::AccessDenied {
                    business_id,
                    agent: COMPLIANCE_AGENT.to_string(),
                })
            }
        }

        let active = self
            .store()
            .find_alerts(&AlertFilter::for_business(business_id).with_statuses(&[AlertStatus::Active]))
            .await?;
        Ok(active.len())
    }

    /// Newest first.
    pub async fn get_business_alerts(
        &self,
        business_id: Uuid,
        query: AlertQuery,
    ) -> ComplianceResult<Vec<ComplianceAlert>> {
        let filter = AlertFilter {
            business_id: Some(business_id),
            user_id: query.user_id,
            rule_id: query.rule_id,
            statuses: query.statuses,
            severities: query.severities,
            alert_types: query.alert_types,
        };
        self.store().find_alerts(&filter).await
    }

    pub async fn acknowledge_alert(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
    ) -> ComplianceResult<ComplianceAlert> {
        self.monitor.alerts().acknowledge(business_id, alert_id, user_id).await
    }

    pub async fn resolve_alert(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
    ) -> ComplianceResult<ComplianceAlert> {
        self.monitor
            .alerts()
            .resolve(business_id, alert_id, user_id, notes)
            .await
    }

    pub async fn dismiss_alert(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> ComplianceResult<ComplianceAlert> {
        self.monitor
            .alerts()
            .dismiss(business_id, alert_id, user_id, reason)
            .await
    }

    // ── Certifications ──────────────────────────────────────────────

    /// Store a certification and bring it up to date.
    ///
    /// It is stored ACTIVE and then advanced through the lifecycle, so one
    /// created already expired or inside the warning window raises its
    /// expiry alert like any other transition. If that step fails the
    /// certification stays ACTIVE and the next pass picks it up.
    pub async fn create_certification(
        &self,
        input: NewCertification,
    ) -> ComplianceResult<StaffCertification> {
        let name = non_empty(&input.name, "certification name")?;
        let user = self
            .store()
            .get_user(input.user_id)
            .await?
            .filter(|u| u.business_id == input.business_id && !u.is_deleted)
            .ok_or_else(|| ComplianceError::not_found("user", input.user_id))?;

        let now = Utc::now();
        let certification = StaffCertification {
            id: Uuid::new_v4(),
            business_id: input.business_id,
            user_id: user.id,
            name,
            issuing_authority: input.issuing_authority,
            expiry_date: input.expiry_date,
            status: CertificationStatus::Active,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store().insert_certification(certification).await?;
        let stored = self.advance(stored).await;
        info!(
            business_id = %stored.business_id,
            certification_id = %stored.id,
            status = %stored.status,
            "certification created"
        );
        Ok(stored)
    }

    /// Edit a certification.
    ///
    /// A new expiry date is how renewals happen. When it moves the status
    /// back (EXPIRED to EXPIRING_SOON, or either to ACTIVE) the open expiry
    /// alert is resolved first and the certification restarts from ACTIVE;
    /// it is then advanced forward, which raises a fresh alert if the new
    /// date is still inside the window. Deletion resolves the open alert.
    pub async fn update_certification(
        &self,
        business_id: Uuid,
        certification_id: Uuid,
        update: CertificationUpdate,
    ) -> ComplianceResult<StaffCertification> {
        let current = self
            .store()
            .get_certification(certification_id)
            .await?
            .filter(|c| c.business_id == business_id && !c.is_deleted)
            .ok_or_else(|| ComplianceError::not_found("certification", certification_id))?;

        let mut patch = CertificationPatch {
            name: update
                .name
                .as_deref()
                .map(|n| non_empty(n, "certification name"))
                .transpose()?,
            issuing_authority: update.issuing_authority,
            expiry_date: update.expiry_date,
            status: None,
            is_deleted: update.is_deleted,
        };

        if patch.is_deleted == Some(true) {
            self.resolve_expiry_alerts(&current, CERTIFICATION_REMOVED).await?;
        } else if let Some(expiry) = update.expiry_date {
            let warning_days = self.monitor.warning_days(business_id).await?;
            let target = status_for(expiry, Utc::now(), warning_days);
            if matches!((current.status.stage(), target.stage()), (Some(from), Some(to)) if to < from) {
                self.resolve_expiry_alerts(&current, CERTIFICATION_RENEWED).await?;
                patch.status = Some(CertificationStatus::Active);
            }
        }

        let updated = self
            .store()
            .update_certification(certification_id, &patch)
            .await?;
        if updated.is_deleted {
            return Ok(updated);
        }
        Ok(self.advance(updated).await)
    }

    async fn advance(&self, certification: StaffCertification) -> StaffCertification {
        match self.monitor.review_certification(certification.clone()).await {
            Ok(reviewed) => reviewed,
            Err(e) => {
                warn!(
                    certification_id = %certification.id,
                    error = %e,
                    "certification review failed; left for the next pass"
                );
                certification
            }
        }
    }

    async fn resolve_expiry_alerts(
        &self,
        certification: &StaffCertification,
        notes: &str,
    ) -> ComplianceResult<()> {
        let filter = AlertFilter {
            user_id: Some(certification.user_id),
            ..AlertFilter::for_business(certification.business_id)
        }
        .open()
        .with_types(&[AlertType::CertificationExpiry]);

        let related = certification.id.to_string();
        let now = Utc::now();
        for alert in self
            .store()
            .find_alerts(&filter)
            .await?
            .iter()
            .filter(|a| a.related_entity_id == related)
        {
            match self.monitor.alerts().resolve_automatically(alert, notes, now).await {
                Ok(_) => {}
                // Closed by someone else in the meantime.
                Err(e) if e.is_invalid_transition() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// A staff member's certifications, soonest expiry first.
    pub async fn get_staff_certifications(
        &self,
        user_id: Uuid,
        business_id: Uuid,
        include_expired: bool,
    ) -> ComplianceResult<Vec<StaffCertification>> {
        let mut certifications = self
            .store()
            .find_certifications(&CertificationFilter::for_business(business_id).with_user(user_id))
            .await?;
        if !include_expired {
            certifications.retain(|c| c.status != CertificationStatus::Expired);
        }
        Ok(certifications)
    }

    // ── Rules ───────────────────────────────────────────────────────

    pub async fn create_rule(&self, input: NewRule) -> ComplianceResult<ComplianceRule> {
        let name = non_empty(&input.name, "rule name")?;
        validate_parameters(input.rule_type, &input.parameters)?;
        if self.store().get_business(input.business_id).await?.is_none() {
            return Err(ComplianceError::not_found("business", input.business_id));
        }

        let now = Utc::now();
        let rule = ComplianceRule {
            id: Uuid::new_v4(),
            business_id: input.business_id,
            name,
            description: input.description,
            rule_type: input.rule_type,
            severity: input.severity,
            is_active: true,
            is_deleted: false,
            parameters: input.parameters,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store().insert_rule(rule).await?;
        info!(business_id = %stored.business_id, rule_id = %stored.id, rule_type = %stored.rule_type, "rule created");
        Ok(stored)
    }

    pub async fn update_rule(
        &self,
        business_id: Uuid,
        rule_id: Uuid,
        patch: RulePatch,
    ) -> ComplianceResult<ComplianceRule> {
        let current = self
            .store()
            .get_rule(rule_id)
            .await?
            .filter(|r| r.business_id == business_id && !r.is_deleted)
            .ok_or_else(|| ComplianceError::not_found("rule", rule_id))?;

        if let Some(name) = &patch.name {
            non_empty(name, "rule name")?;
        }
        if let Some(parameters) = &patch.parameters {
            validate_parameters(current.rule_type, parameters)?;
        }

        // Resolved before the write: if the write fails the rule is still
        // active and the next pass raises its findings again.
        let notes = if patch.is_deleted == Some(true) {
            Some(RULE_REMOVED)
        } else if patch.is_active == Some(false) && current.is_active {
            Some(RULE_DEACTIVATED)
        } else {
            None
        };
        if let Some(notes) = notes {
            self.resolve_rule_alerts(&current, notes).await?;
        }

        self.store().update_rule(rule_id, &patch).await
    }

    async fn resolve_rule_alerts(&self, rule: &ComplianceRule, notes: &str) -> ComplianceResult<()> {
        let filter = AlertFilter {
            rule_id: Some(rule.id),
            ..AlertFilter::for_business(rule.business_id)
        }
        .open()
        .with_types(&RULE_ALERT_TYPES);

        let now = Utc::now();
        let alerts = self.store().find_alerts(&filter).await?;
        for alert in &alerts {
            match self.monitor.alerts().resolve_automatically(alert, notes, now).await {
                Ok(_) => {}
                Err(e) if e.is_invalid_transition() => {}
                Err(e) => return Err(e),
            }
        }
        if !alerts.is_empty() {
            info!(rule_id = %rule.id, resolved = alerts.len(), notes, "rule alerts resolved");
        }
        Ok(())
    }

    pub async fn get_business_rules(
        &self,
        business_id: Uuid,
        include_inactive: bool,
    ) -> ComplianceResult<Vec<ComplianceRule>> {
        let filter = RuleFilter {
            include_inactive,
            ..RuleFilter::active_for(business_id)
        };
        self.store().find_rules(&filter).await
    }

    // ── Summary ─────────────────────────────────────────────────────

    pub async fn get_compliance_summary(&self, business_id: Uuid) -> ComplianceResult<ComplianceSummary> {
        let now = Utc::now();
        let alerts = self
            .store()
            .find_alerts(&AlertFilter::for_business(business_id))
            .await?;

        let mut alerts_by_status = BTreeMap::new();
        let mut open_alerts_by_severity = BTreeMap::new();
        for alert in &alerts {
            *alerts_by_status.entry(alert.status).or_insert(0) += 1;
            if alert.is_open() {
                *open_alerts_by_severity.entry(alert.severity).or_insert(0) += 1;
            }
        }

        let active_rules = self
            .store()
            .find_rules(&RuleFilter::active_for(business_id))
            .await?
            .len();

        let horizon = Duration::try_days(i64::from(self.monitor.config().summary_horizon_days))
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut upcoming: Vec<UpcomingExpiration> = self
            .store()
            .find_certifications(
                &CertificationFilter::for_business(business_id).expiring_between(now, horizon),
            )
            .await?
            .into_iter()
            .map(|c| UpcomingExpiration {
                certification_id: c.id,
                user_id: c.user_id,
                days_remaining: days_remaining(c.expiry_date, now),
                name: c.name,
                expiry_date: c.expiry_date,
                status: c.status,
            })
            .collect();
        upcoming.sort_by_key(|u| u.expiry_date);

        Ok(ComplianceSummary {
            business_id,
            alerts_by_status,
            open_alerts_by_severity,
            active_rules,
            upcoming_expirations: upcoming,
            generated_at: now,
        })
    }

    // ── Configuration hooks ─────────────────────────────────────────

    /// Validate and store a tenant's settings, then reconcile its job.
    pub async fn save_agent_configuration(
        &self,
        business_id: Uuid,
        settings: AgentSettings,
    ) -> ComplianceResult<(AgentConfiguration, ScheduleChange)> {
        Cadence::from_frequency(settings.monitoring_frequency_hours)?;
        if settings.certification_warning_days > MAX_WARNING_DAYS {
            return Err(ComplianceError::validation(format!(
                "certification warning days must be at most {MAX_WARNING_DAYS}, got {}",
                settings.certification_warning_days
            )));
        }
        if self.store().get_business(business_id).await?.is_none() {
            return Err(ComplianceError::not_found("business", business_id));
        }

        let config = AgentConfiguration::compliance(business_id, settings.is_enabled)
            .with_frequency(settings.monitoring_frequency_hours)
            .with_warning_days(settings.certification_warning_days);
        let stored = self.store().upsert_agent_config(config).await?;
        let change = self.scheduler.reconcile(business_id).await?;
        Ok((stored, change))
    }

    pub async fn delete_agent_configuration(&self, business_id: Uuid) -> ComplianceResult<ScheduleChange> {
        if !self
            .store()
            .delete_agent_config(business_id, COMPLIANCE_AGENT)
            .await?
        {
            return Err(ComplianceError::not_found("agent configuration", business_id));
        }
        self.scheduler.reconcile(business_id).await
    }
}

fn non_empty(value: &str, what: &str) -> ComplianceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ComplianceError::validation(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Each implemented rule type needs its own parameters.
fn validate_parameters(rule_type: RuleType, parameters: &RuleParameters) -> ComplianceResult<()> {
    match rule_type {
        RuleType::CertificationRequirement => {
            if !parameters
                .required_certifications
                .iter()
                .any(|n| !n.trim().is_empty())
            {
                return Err(ComplianceError::validation(
                    "requiredCertifications must list at least one certification",
                ));
            }
        }
        RuleType::MaximumHours => {
            if !parameters.max_weekly_hours.is_some_and(|h| h > 0.0) {
                return Err(ComplianceError::validation("maxWeeklyHours must be positive"));
            }
        }
        RuleType::RequiredRest => {
            if !parameters
                .required_rest_hours_between_shifts
                .is_some_and(|h| h > 0.0)
            {
                return Err(ComplianceError::validation(
                    "requiredRestHoursBetweenShifts must be positive",
                ));
            }
        }
        RuleType::Unrecognized => {
            return Err(ComplianceError::validation("unrecognized rule type"));
        }
        _ => {}
    }
    Ok(())
}
