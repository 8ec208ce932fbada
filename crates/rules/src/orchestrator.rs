//! [`ComplianceMonitor`] — the per-tenant pass.
//!
//! A full pass advances certification statuses, reconciles lifecycle
//! findings, evaluates the tenant's rules against the refreshed
//! certifications, reconciles rule findings and finally resolves rule alerts
//! that the pass no longer detects. Failures are contained per certification,
//! per rule and per finding.
//!
//! At most one pass per tenant runs at a time: an overlapping trigger is
//! skipped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shiftguard_core::model::{
    AlertKey, AlertType, CertificationStatus, StaffCertification, User, COMPLIANCE_AGENT,
};
use shiftguard_core::providers::{AccessPolicy, StaffingProvider};
use shiftguard_core::store::{
    AlertFilter, CertificationFilter, CertificationPatch, ComplianceStore, ConfigFilter, RuleFilter,
};
use shiftguard_core::{ComplianceResult, MonitorConfig};
use shiftguard_notify::Dispatcher;

use crate::alerts::{AlertManager, NO_LONGER_DETECTED};
use crate::evaluator::{RuleContext, RuleEvaluator};
use crate::lifecycle;
use crate::report::{PassOutcome, PassReport, PassScope, SkipReason, SweepReport};
use crate::scheduler::PassRunner;

/// Alert types owned by rules and eligible for stale resolution.
pub const RULE_ALERT_TYPES: [AlertType; 3] = [
    AlertType::MissingCertification,
    AlertType::HoursViolation,
    AlertType::RestViolation,
];

pub struct ComplianceMonitor {
    store: Arc<dyn ComplianceStore>,
    access: Arc<dyn AccessPolicy>,
    staffing: Arc<dyn StaffingProvider>,
    alerts: Arc<AlertManager>,
    evaluator: RuleEvaluator,
    config: MonitorConfig,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl ComplianceMonitor {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        access: Arc<dyn AccessPolicy>,
        staffing: Arc<dyn StaffingProvider>,
        dispatcher: Arc<Dispatcher>,
        config: MonitorConfig,
    ) -> Self {
        let alerts = Arc::new(AlertManager::new(
            store.clone(),
            dispatcher,
            config.hours_tolerance,
        ));
        Self {
            store,
            access,
            staffing,
            alerts,
            evaluator: RuleEvaluator::new(),
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the rule evaluator (e.g. to register additional checks).
    pub fn with_evaluator(mut self, evaluator: RuleEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn alerts(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub fn store(&self) -> &Arc<dyn ComplianceStore> {
        &self.store
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_running(&self, business_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&business_id)
    }

    fn try_begin(&self, business_id: Uuid) -> Option<PassGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.insert(business_id).then(|| PassGuard {
            set: &self.in_flight,
            business_id,
        })
    }

    /// Warning window for a tenant, falling back to the configured default.
    pub async fn warning_days(&self, business_id: Uuid) -> ComplianceResult<u32> {
        Ok(self
            .store
            .get_agent_config(business_id, COMPLIANCE_AGENT)
            .await?
            .map_or(self.config.default_warning_days, |c| c.certification_warning_days))
    }

    // ── Pass ────────────────────────────────────────────────────────

    /// Run one pass for a tenant.
    ///
    /// Returns `Skipped` when the tenant lacks access or a pass is already in
    /// flight. Store read failures abort the pass with an error; everything
    /// downstream of them is contained and counted in the report.
    pub async fn run_pass(&self, business_id: Uuid, scope: PassScope) -> ComplianceResult<PassOutcome> {
        let Some(_guard) = self.try_begin(business_id) else {
            debug!(business_id = %business_id, "pass already running; skipping");
            return Ok(PassOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        if !self.access.has_agent_access(business_id, COMPLIANCE_AGENT).await? {
            info!(business_id = %business_id, "no access to compliance monitoring; skipping pass");
            return Ok(PassOutcome::Skipped(SkipReason::NoAccess));
        }

        let now = Utc::now();
        let mut report = PassReport::new(business_id, scope, now);

        let staff = self.store.find_staff(business_id).await?;
        self.certification_phase(business_id, &staff, now, &mut report)
            .await?;
        if scope == PassScope::Full {
            self.rule_phase(business_id, &staff, now, &mut report).await?;
        }

        report.finished_at = Utc::now();
        info!(
            business_id = %business_id,
            scope = ?scope,
            status_changes = report.status_changes,
            created = report.alerts_created,
            updated = report.alerts_updated,
            resolved = report.alerts_resolved,
            rule_failures = report.rule_failures,
            item_failures = report.item_failures,
            duration_ms = report.duration_ms(),
            "compliance pass complete"
        );
        Ok(PassOutcome::Completed(report))
    }

    async fn certification_phase(
        &self,
        business_id: Uuid,
        staff: &[User],
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> ComplianceResult<()> {
        let warning_days = self.warning_days(business_id).await?;
        let certifications = self
            .store
            .find_certifications(&CertificationFilter::for_business(business_id).with_statuses(&[
                CertificationStatus::Active,
                CertificationStatus::ExpiringSoon,
                CertificationStatus::Expired,
            ]))
            .await?;
        let names: HashMap<Uuid, String> = staff.iter().map(|u| (u.id, u.name.clone())).collect();

        let review = lifecycle::review(&certifications, &names, now, warning_days);
        report.certifications_reviewed = certifications.len();

        // Transitions and findings are produced pairwise. The alert goes first:
        // a status written without its alert would never be revisited.
        for (transition, finding) in review.transitions.iter().zip(&review.findings) {
            match self.alerts.reconcile(finding, now).await {
                Ok(r) => report.record(&r),
                Err(e) => {
                    warn!(
                        business_id = %business_id,
                        certification_id = %transition.certification_id,
                        error = %e,
                        "alert reconcile failed; status left for the next pass"
                    );
                    report.item_failures += 1;
                    continue;
                }
            }

            let patch = CertificationPatch::status(transition.to);
            if let Err(e) = self
                .store
                .update_certification(transition.certification_id, &patch)
                .await
            {
                warn!(
                    business_id = %business_id,
                    certification_id = %transition.certification_id,
                    error = %e,
                    "certification status update failed"
                );
                report.item_failures += 1;
                continue;
            }
            debug!(
                certification_id = %transition.certification_id,
                from = %transition.from,
                to = %transition.to,
                "certification status advanced"
            );
            report.status_changes += 1;
        }

        for finding in &review.escalations {
            match self.alerts.escalate_only(finding).await {
                Ok(r) => report.record(&r),
                Err(e) => {
                    warn!(business_id = %business_id, error = %e, "alert escalation failed");
                    report.item_failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Advance one certification outside a pass, after a user created or
    /// re-dated it. Same ordering as a pass: alert first, then status.
    pub async fn review_certification(
        &self,
        certification: StaffCertification,
    ) -> ComplianceResult<StaffCertification> {
        let now = Utc::now();
        let warning_days = self.warning_days(certification.business_id).await?;
        let names: HashMap<Uuid, String> = self
            .store
            .get_user(certification.user_id)
            .await?
            .map(|u| (u.id, u.name))
            .into_iter()
            .collect();

        let certifications = std::slice::from_ref(&certification);
        let review = lifecycle::review(certifications, &names, now, warning_days);
        let (Some(transition), Some(finding)) =
            (review.transitions.first(), review.findings.first())
        else {
            return Ok(certification);
        };

        self.alerts.reconcile(finding, now).await?;
        let patch = CertificationPatch::status(transition.to);
        let updated = self
            .store
            .update_certification(transition.certification_id, &patch)
            .await?;
        debug!(
            certification_id = %updated.id,
            from = %transition.from,
            to = %transition.to,
            "certification status advanced"
        );
        Ok(updated)
    }

    async fn rule_phase(
        &self,
        business_id: Uuid,
        staff: &[User],
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> ComplianceResult<()> {
        // Re-read so requirement checks see this pass's status changes.
        let certifications = self
            .store
            .find_certifications(&CertificationFilter::for_business(business_id))
            .await?;
        let rules = self.store.find_rules(&RuleFilter::active_for(business_id)).await?;

        let ctx = RuleContext {
            business_id,
            staff,
            certifications: &certifications,
            staffing: self.staffing.as_ref(),
            now,
        };
        let evaluation = self.evaluator.evaluate_all(&rules, &ctx).await;
        report.rules_evaluated = evaluation.evaluated;
        report.rule_failures = evaluation.failures.len();

        let mut detected: HashSet<AlertKey> = HashSet::new();
        for finding in &evaluation.findings {
            detected.insert(finding.key());
            match self.alerts.reconcile(finding, now).await {
                Ok(r) => report.record(&r),
                Err(e) => {
                    warn!(
                        business_id = %business_id,
                        rule_id = ?finding.rule_id(),
                        user_id = ?finding.user_id,
                        error = %e,
                        "alert reconcile failed"
                    );
                    report.item_failures += 1;
                }
            }
        }

        for rule_id in &evaluation.completed {
            let filter = AlertFilter {
                rule_id: Some(*rule_id),
                ..AlertFilter::for_business(business_id)
            }
            .open()
            .with_types(&RULE_ALERT_TYPES);
            let open = match self.store.find_alerts(&filter).await {
                Ok(alerts) => alerts,
                Err(e) => {
                    warn!(business_id = %business_id, rule_id = %rule_id, error = %e, "stale alert lookup failed");
                    report.item_failures += 1;
                    continue;
                }
            };
            for alert in open.iter().filter(|a| !detected.contains(&a.key())) {
                match self.alerts.resolve_automatically(alert, NO_LONGER_DETECTED, now).await {
                    Ok(_) => report.alerts_resolved += 1,
                    Err(e) => {
                        warn!(alert_id = %alert.id, error = %e, "stale alert resolution failed");
                        report.item_failures += 1;
                    }
                }
            }
        }

        Ok(())
    }

    // ── Sweep ───────────────────────────────────────────────────────

    /// Certification-only pass for every enabled tenant, run concurrently.
    pub async fn run_certification_sweep(&self) -> ComplianceResult<SweepReport> {
        let configs = self
            .store
            .find_agent_configs(&ConfigFilter::enabled(COMPLIANCE_AGENT))
            .await?;

        let outcomes = join_all(
            configs
                .iter()
                .map(|c| self.run_pass(c.business_id, PassScope::CertificationsOnly)),
        )
        .await;

        let mut sweep = SweepReport {
            tenants: configs.len(),
            ..Default::default()
        };
        for (config, outcome) in configs.iter().zip(outcomes) {
            match outcome {
                Ok(PassOutcome::Completed(report)) => {
                    sweep.completed += 1;
                    sweep.status_changes += report.status_changes;
                    sweep.alerts_created += report.alerts_created;
                }
                Ok(PassOutcome::Skipped(_)) => sweep.skipped += 1,
                Err(e) => {
                    warn!(business_id = %config.business_id, error = %e, "certification sweep failed for tenant");
                    sweep.failed += 1;
                }
            }
        }

        info!(
            tenants = sweep.tenants,
            completed = sweep.completed,
            skipped = sweep.skipped,
            failed = sweep.failed,
            "certification sweep complete"
        );
        Ok(sweep)
    }
}

#[async_trait]
impl PassRunner for ComplianceMonitor {
    async fn run_tenant_pass(&self, business_id: Uuid) -> ComplianceResult<()> {
        self.run_pass(business_id, PassScope::Full).await.map(|_| ())
    }

    async fn run_certification_sweep(&self) -> ComplianceResult<()> {
        ComplianceMonitor::run_certification_sweep(self).await.map(|_| ())
    }
}

/// Clears a tenant's in-flight flag when the pass ends, including on error.
struct PassGuard<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    business_id: Uuid,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.business_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shiftguard_core::model::{
        AgentConfiguration, AlertStatus, Business, ComplianceRule, RuleParameters, RuleType,
        Severity, StaffCertification, User,
    };
    use shiftguard_core::providers::{StaticStaffing, StoreAccessPolicy, Timesheet};
    use shiftguard_core::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        monitor: ComplianceMonitor,
        business_id: Uuid,
        user: User,
    }

    async fn fixture(sheets: Vec<Timesheet>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let business_id = Uuid::new_v4();
        store
            .insert_business(Business {
                id: business_id,
                name: "Harbor Cafe".into(),
                is_active: true,
                subscribed_agents: vec![COMPLIANCE_AGENT.to_string()],
            })
            .await;
        let user = User {
            id: Uuid::new_v4(),
            business_id,
            name: "Ana".into(),
            email: None,
            is_deleted: false,
        };
        store.insert_user(user.clone()).await;
        store
            .upsert_agent_config(AgentConfiguration::compliance(business_id, true))
            .await
            .unwrap();

        let dyn_store: Arc<dyn ComplianceStore> = store.clone();
        let monitor = ComplianceMonitor::new(
            dyn_store.clone(),
            Arc::new(StoreAccessPolicy::new(dyn_store)),
            Arc::new(StaticStaffing::new(sheets)),
            Arc::new(Dispatcher::empty()),
            MonitorConfig::default(),
        );
        Fixture {
            store,
            monitor,
            business_id,
            user,
        }
    }

    fn certification(f: &Fixture, name: &str, expiry_offset: Duration) -> StaffCertification {
        StaffCertification {
            id: Uuid::new_v4(),
            business_id: f.business_id,
            user_id: f.user.id,
            name: name.into(),
            issuing_authority: None,
            expiry_date: Utc::now() + expiry_offset,
            status: CertificationStatus::Active,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(f: &Fixture, rule_type: RuleType, parameters: RuleParameters) -> ComplianceRule {
        ComplianceRule {
            id: Uuid::new_v4(),
            business_id: f.business_id,
            name: "Policy".into(),
            description: None,
            rule_type,
            severity: Severity::Medium,
            is_active: true,
            is_deleted: false,
            parameters,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn open_alerts(f: &Fixture) -> Vec<shiftguard_core::model::ComplianceAlert> {
        f.store
            .find_alerts(&AlertFilter::for_business(f.business_id).open())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn expired_requirement_holder_gets_both_alerts() {
        let f = fixture(Vec::new()).await;
        f.store
            .insert_certification(certification(&f, "First Aid", -Duration::days(1)))
            .await
            .unwrap();
        f.store
            .insert_rule(rule(
                &f,
                RuleType::CertificationRequirement,
                RuleParameters {
                    required_certifications: vec!["First Aid".into()],
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        let PassOutcome::Completed(report) =
            f.monitor.run_pass(f.business_id, PassScope::Full).await.unwrap()
        else {
            panic!("pass skipped")
        };
        assert_eq!(report.status_changes, 1);
        assert_eq!(report.alerts_created, 2);

        let types: HashSet<AlertType> = open_alerts(&f).await.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&AlertType::CertificationExpiry));
        assert!(types.contains(&AlertType::MissingCertification));
    }

    #[tokio::test]
    async fn certifications_only_scope_skips_rules() {
        let f = fixture(Vec::new()).await;
        f.store
            .insert_rule(rule(
                &f,
                RuleType::CertificationRequirement,
                RuleParameters {
                    required_certifications: vec!["First Aid".into()],
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        f.monitor
            .run_pass(f.business_id, PassScope::CertificationsOnly)
            .await
            .unwrap();
        assert!(open_alerts(&f).await.is_empty());
    }

    #[tokio::test]
    async fn resolved_hours_violation_is_closed_automatically() {
        let f = fixture(Vec::new()).await;
        let cap = f
            .store
            .insert_rule(rule(
                &f,
                RuleType::MaximumHours,
                RuleParameters {
                    max_weekly_hours: Some(40.0),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        // Seed an open alert as if an earlier pass had detected 48 hours.
        let earlier = crate::finding::Finding {
            business_id: f.business_id,
            user_id: Some(f.user.id),
            severity: Severity::Medium,
            title: "Weekly hours limit exceeded: Ana".into(),
            description: "48".into(),
            due_date: None,
            data: shiftguard_core::model::AlertData::HoursViolation {
                rule_id: cap.id,
                rule_name: cap.name.clone(),
                staff_name: "Ana".into(),
                current_hours: 48.0,
                max_weekly_hours: 40.0,
            },
        };
        f.monitor.alerts().reconcile(&earlier, Utc::now()).await.unwrap();

        // No timesheet: zero hours now.
        let PassOutcome::Completed(report) =
            f.monitor.run_pass(f.business_id, PassScope::Full).await.unwrap()
        else {
            panic!("pass skipped")
        };
        assert_eq!(report.alerts_resolved, 1);

        let all = f
            .store
            .find_alerts(&AlertFilter::for_business(f.business_id))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, AlertStatus::Resolved);
        assert_eq!(all[0].resolution_notes.as_deref(), Some(NO_LONGER_DETECTED));
    }

    #[tokio::test]
    async fn tenant_without_subscription_is_skipped() {
        let f = fixture(Vec::new()).await;
        f.store
            .insert_business(Business {
                id: f.business_id,
                name: "Harbor Cafe".into(),
                is_active: true,
                subscribed_agents: Vec::new(),
            })
            .await;
        let outcome = f.monitor.run_pass(f.business_id, PassScope::Full).await.unwrap();
        assert!(matches!(outcome, PassOutcome::Skipped(SkipReason::NoAccess)));
        assert!(!f.monitor.is_running(f.business_id));
    }

    #[tokio::test]
    async fn overlapping_pass_is_skipped() {
        let f = fixture(Vec::new()).await;
        let guard = f.monitor.try_begin(f.business_id);
        assert!(guard.is_some());

        let outcome = f.monitor.run_pass(f.business_id, PassScope::Full).await.unwrap();
        assert!(matches!(outcome, PassOutcome::Skipped(SkipReason::AlreadyRunning)));

        drop(guard);
        let outcome = f.monitor.run_pass(f.business_id, PassScope::Full).await.unwrap();
        assert!(matches!(outcome, PassOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn sweep_covers_enabled_tenants() {
        let f = fixture(Vec::new()).await;
        f.store
            .insert_certification(certification(&f, "Food Safety", Duration::days(3)))
            .await
            .unwrap();

        let sweep = f.monitor.run_certification_sweep().await.unwrap();
        assert_eq!(sweep.tenants, 1);
        assert_eq!(sweep.completed, 1);
        assert_eq!(sweep.status_changes, 1);
        assert_eq!(sweep.alerts_created, 1);
    }
}
