//! Alert lifecycle: turns findings into alert state while keeping at most one
//! open alert per deduplication key.
//!
//! ```text
//! ACTIVE ──acknowledge──▶ ACKNOWLEDGED
//!   │  ╲                     │
//!   │   ╲─resolve/dismiss─┐  │ resolve/dismiss
//!   ▼                     ▼  ▼
//! RESOLVED            DISMISSED        (terminal)
//! ```
//!
//! Pass results only ever create, escalate or refresh open alerts. A terminal
//! alert is history: a recurrence creates a new record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shiftguard_core::model::{AlertData, AlertStatus, ComplianceAlert, Severity};
use shiftguard_core::store::{AlertInsert, AlertPatch, ComplianceStore};
use shiftguard_core::{ComplianceError, ComplianceResult};
use shiftguard_notify::{Dispatcher, Notification, Priority};

use crate::finding::Finding;

/// Notes written when a pass stops detecting a rule violation.
pub const NO_LONGER_DETECTED: &str = "No longer detected by compliance pass";
/// Notes written when a re-dated certification clears its expiry alert.
pub const CERTIFICATION_RENEWED: &str = "Certification renewed";

/// What reconciling one finding did.
#[derive(Debug, Clone)]
pub enum Reconciled {
    Created(ComplianceAlert),
    /// An open alert was escalated or had its figures refreshed.
    Updated(ComplianceAlert),
    Unchanged(ComplianceAlert),
    /// Escalation-only finding with no open alert to escalate.
    Skipped,
}

pub struct AlertManager {
    store: Arc<dyn ComplianceStore>,
    dispatcher: Arc<Dispatcher>,
    hours_tolerance: f64,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        dispatcher: Arc<Dispatcher>,
        hours_tolerance: f64,
    ) -> Self {
        Self {
            store,
            dispatcher,
            hours_tolerance,
        }
    }

    // ── Pass-driven ─────────────────────────────────────────────────

    /// Create an alert for the finding, or update the open one with its key.
    pub async fn reconcile(&self, finding: &Finding, now: DateTime<Utc>) -> ComplianceResult<Reconciled> {
        if let Some(existing) = self.store.find_open_alert(&finding.key()).await? {
            return self.refresh(existing, finding).await;
        }

        match self.store.insert_alert_if_absent(new_alert(finding, now)).await? {
            AlertInsert::Inserted(alert) => {
                info!(
                    business_id = %alert.business_id,
                    alert_id = %alert.id,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    "alert created"
                );
                self.notify(&alert, false);
                Ok(Reconciled::Created(alert))
            }
            // Lost a race with a concurrent writer for the same key.
            AlertInsert::Existing(existing) => self.refresh(existing, finding).await,
        }
    }

    /// Escalate the open alert for the finding's key if there is one. Never creates.
    pub async fn escalate_only(&self, finding: &Finding) -> ComplianceResult<Reconciled> {
        match self.store.find_open_alert(&finding.key()).await? {
            Some(existing) => self.refresh(existing, finding).await,
            None => Ok(Reconciled::Skipped),
        }
    }

    async fn refresh(&self, existing: ComplianceAlert, finding: &Finding) -> ComplianceResult<Reconciled> {
        let (patch, escalated) = refresh_patch(&existing, finding, self.hours_tolerance);
        if patch.is_empty() {
            return Ok(Reconciled::Unchanged(existing));
        }

        let updated = match self
            .store
            .update_alert(existing.id, &patch.expecting(existing.status))
            .await
        {
            Ok(alert) => alert,
            // Closed or acknowledged since it was read; a closed alert stays closed.
            Err(e) if e.is_invalid_transition() => {
                debug!(alert_id = %existing.id, "alert changed during refresh; skipped");
                return Ok(Reconciled::Skipped);
            }
            Err(e) => return Err(e),
        };
        if escalated {
            info!(
                business_id = %updated.business_id,
                alert_id = %updated.id,
                from = %existing.severity,
                to = %updated.severity,
                "alert escalated"
            );
            self.notify(&updated, true);
        } else {
            debug!(alert_id = %updated.id, "alert figures refreshed");
        }
        Ok(Reconciled::Updated(updated))
    }

    /// Resolve an open alert on the system's behalf.
    pub async fn resolve_automatically(
        &self,
        alert: &ComplianceAlert,
        notes: &str,
        now: DateTime<Utc>,
    ) -> ComplianceResult<ComplianceAlert> {
        if !alert.is_open() {
            return Err(invalid_transition(alert, "resolve"));
        }
        let patch = AlertPatch {
            status: Some(AlertStatus::Resolved),
            resolved_by: Some(None),
            resolved_at: Some(now),
            resolution_notes: Some(notes.to_string()),
            ..Default::default()
        };
        let resolved = self.guarded_update(alert, patch, "resolve").await?;
        info!(
            business_id = %resolved.business_id,
            alert_id = %resolved.id,
            notes,
            "alert resolved automatically"
        );
        Ok(resolved)
    }

    // ── User-driven ─────────────────────────────────────────────────

    /// `ACTIVE -> ACKNOWLEDGED`.
    pub async fn acknowledge(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
    ) -> ComplianceResult<ComplianceAlert> {
        let alert = self.load(business_id, alert_id).await?;
        if alert.status != AlertStatus::Active {
            return Err(invalid_transition(&alert, "acknowledge"));
        }
        let patch = AlertPatch {
            status: Some(AlertStatus::Acknowledged),
            acknowledged_by: Some(user_id),
            acknowledged_at: Some(Utc::now()),
            ..Default::default()
        };
        self.guarded_update(&alert, patch, "acknowledge").await
    }

    /// `ACTIVE | ACKNOWLEDGED -> RESOLVED`.
    pub async fn resolve(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
    ) -> ComplianceResult<ComplianceAlert> {
        self.close(business_id, alert_id, user_id, AlertStatus::Resolved, "resolve", notes)
            .await
    }

    /// `ACTIVE | ACKNOWLEDGED -> DISMISSED`. The reason lands in the resolution notes.
    pub async fn dismiss(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> ComplianceResult<ComplianceAlert> {
        self.close(business_id, alert_id, user_id, AlertStatus::Dismissed, "dismiss", reason)
            .await
    }

    async fn close(
        &self,
        business_id: Uuid,
        alert_id: Uuid,
        user_id: Uuid,
        to: AlertStatus,
        requested: &str,
        notes: Option<String>,
    ) -> ComplianceResult<ComplianceAlert> {
        let alert = self.load(business_id, alert_id).await?;
        if !alert.is_open() {
            return Err(invalid_transition(&alert, requested));
        }
        let patch = AlertPatch {
            status: Some(to),
            resolved_by: Some(Some(user_id)),
            resolved_at: Some(Utc::now()),
            resolution_notes: notes,
            ..Default::default()
        };
        self.guarded_update(&alert, patch, requested).await
    }

    /// Write `patch` only if the alert still has the status it was read
    /// with. A lost race reports the transition against the current status.
    async fn guarded_update(
        &self,
        alert: &ComplianceAlert,
        patch: AlertPatch,
        requested: &str,
    ) -> ComplianceResult<ComplianceAlert> {
        match self
            .store
            .update_alert(alert.id, &patch.expecting(alert.status))
            .await
        {
            Err(e) if e.is_invalid_transition() => {
                let current = self
                    .store
                    .get_alert(alert.id)
                    .await?
                    .unwrap_or_else(|| alert.clone());
                Err(invalid_transition(&current, requested))
            }
            other => other,
        }
    }

    /// Alerts of another tenant are reported as not found.
    async fn load(&self, business_id: Uuid, alert_id: Uuid) -> ComplianceResult<ComplianceAlert> {
        self.store
            .get_alert(alert_id)
            .await?
            .filter(|a| a.business_id == business_id)
            .ok_or_else(|| ComplianceError::not_found("alert", alert_id))
    }

    // ── Notifications ───────────────────────────────────────────────

    fn notify(&self, alert: &ComplianceAlert, escalated: bool) {
        let Some(user_id) = alert.user_id else {
            return;
        };
        let title = if escalated {
            format!("Escalated: {}", alert.title)
        } else {
            alert.title.clone()
        };
        let notification = Notification::new(user_id, title, alert.description.clone())
            .with_priority(priority_for(alert.severity))
            .with_action(format!("alert:{}", alert.id))
            .with_meta("businessId", alert.business_id.to_string())
            .with_meta("alertType", alert.alert_type.as_str())
            .with_meta("severity", alert.severity.as_str());
        self.dispatcher.notify(notification);
    }
}

pub fn priority_for(severity: Severity) -> Priority {
    match severity {
        Severity::Low => Priority::Low,
        Severity::Medium => Priority::Normal,
        Severity::High => Priority::High,
        Severity::Critical => Priority::Urgent,
    }
}

fn invalid_transition(alert: &ComplianceAlert, requested: &str) -> ComplianceError {
    ComplianceError::InvalidTransition {
        entity: "alert",
        id: alert.id.to_string(),
        current: alert.status.as_str().to_string(),
        requested: requested.to_string(),
    }
}

fn new_alert(finding: &Finding, now: DateTime<Utc>) -> ComplianceAlert {
    ComplianceAlert {
        id: Uuid::new_v4(),
        business_id: finding.business_id,
        user_id: finding.user_id,
        rule_id: finding.rule_id(),
        alert_type: finding.alert_type(),
        severity: finding.severity,
        status: AlertStatus::Active,
        title: finding.title.clone(),
        description: finding.description.clone(),
        due_date: finding.due_date,
        related_entity_id: finding.data.related_entity_id(),
        related_data: finding.data.clone(),
        acknowledged_by: None,
        acknowledged_at: None,
        resolved_by: None,
        resolved_at: None,
        resolution_notes: None,
        created_at: now,
        updated_at: now,
    }
}

/// Fields of an open alert that a new finding legitimately changes, and
/// whether the change is an escalation.
///
/// Severity only ever rises. An expiring certification alert whose
/// certification has since expired is rewritten. Hours and rest figures
/// refresh when they moved by more than `tolerance`.
pub(crate) fn refresh_patch(
    existing: &ComplianceAlert,
    finding: &Finding,
    tolerance: f64,
) -> (AlertPatch, bool) {
    let escalated = finding.severity > existing.severity;
    let rewrite = escalated
        || match (&existing.related_data, &finding.data) {
            (
                AlertData::CertificationExpiry { expired: was, .. },
                AlertData::CertificationExpiry { expired: now, .. },
            ) => !was && *now,
            (
                AlertData::HoursViolation { current_hours: a, .. },
                AlertData::HoursViolation { current_hours: b, .. },
            ) => (a - b).abs() > tolerance,
            (
                AlertData::RestViolation { rest_hours: a, .. },
                AlertData::RestViolation { rest_hours: b, .. },
            ) => (a - b).abs() > tolerance,
            _ => false,
        };

    if !rewrite {
        return (AlertPatch::default(), false);
    }

    let patch = AlertPatch {
        severity: escalated.then_some(finding.severity),
        title: Some(finding.title.clone()),
        description: Some(finding.description.clone()),
        due_date: Some(finding.due_date),
        related_data: Some(finding.data.clone()),
        ..Default::default()
    };
    (patch, escalated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftguard_core::MemoryStore;
    use shiftguard_notify::{Notifier, NotifyError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
        count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
        fn channel_name(&self) -> &str {
            "mock"
        }
    }

    struct Harness {
        manager: AlertManager,
        sent: Arc<Mutex<Vec<Notification>>>,
        count: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![Arc::new(MockNotifier {
            sent: sent.clone(),
            count: count.clone(),
        })]);
        Harness {
            manager: AlertManager::new(Arc::new(MemoryStore::new()), Arc::new(dispatcher), 0.5),
            sent,
            count,
        }
    }

    async fn wait_for(count: &AtomicUsize, n: usize) {
        for _ in 0..50 {
            if count.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    fn expiry_finding(business_id: Uuid, cert_id: Uuid, user_id: Uuid, expired: bool) -> Finding {
        Finding {
            business_id,
            user_id: Some(user_id),
            severity: if expired { Severity::High } else { Severity::Medium },
            title: if expired { "First Aid certification expired" } else { "First Aid certification expiring soon" }
                .to_string(),
            description: "desc".to_string(),
            due_date: Some(Utc::now()),
            data: AlertData::CertificationExpiry {
                certification_id: cert_id,
                certification_name: "First Aid".into(),
                staff_name: "Ana".into(),
                expiry_date: Utc::now(),
                days_remaining: if expired { -1 } else { 10 },
                expired,
            },
        }
    }

    fn hours_finding(business_id: Uuid, rule_id: Uuid, user_id: Uuid, hours: f64, severity: Severity) -> Finding {
        Finding {
            business_id,
            user_id: Some(user_id),
            severity,
            title: "Weekly hours limit exceeded: Ana".into(),
            description: format!("{hours:.1}"),
            due_date: None,
            data: AlertData::HoursViolation {
                rule_id,
                rule_name: "Cap".into(),
                staff_name: "Ana".into(),
                current_hours: hours,
                max_weekly_hours: 40.0,
            },
        }
    }

    #[tokio::test]
    async fn repeated_findings_reuse_the_open_alert() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let finding = expiry_finding(b, c, u, false);

        let first = h.manager.reconcile(&finding, Utc::now()).await.unwrap();
        let second = h.manager.reconcile(&finding, Utc::now()).await.unwrap();

        let Reconciled::Created(created) = first else { panic!("expected create") };
        let Reconciled::Unchanged(same) = second else { panic!("expected unchanged") };
        assert_eq!(created.id, same.id);
        assert_eq!(created.status, AlertStatus::Active);
        assert_eq!(created.related_entity_id, c.to_string());
    }

    #[tokio::test]
    async fn expiry_escalates_to_high_and_notifies() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        h.manager.reconcile(&expiry_finding(b, c, u, false), Utc::now()).await.unwrap();
        let escalated = h
            .manager
            .escalate_only(&expiry_finding(b, c, u, true))
            .await
            .unwrap();

        let Reconciled::Updated(alert) = escalated else { panic!("expected update") };
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.title, "First Aid certification expired");

        wait_for(&h.count, 2).await;
        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].title.starts_with("Escalated:"));
        assert_eq!(sent[1].priority, Priority::High);
        assert_eq!(sent[1].action_ref.as_deref(), Some(format!("alert:{}", alert.id).as_str()));
    }

    #[tokio::test]
    async fn escalate_only_never_creates() {
        let h = harness();
        let finding = expiry_finding(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), true);
        assert!(matches!(
            h.manager.escalate_only(&finding).await.unwrap(),
            Reconciled::Skipped
        ));
    }

    #[tokio::test]
    async fn severity_is_never_downgraded() {
        let h = harness();
        let (b, r, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        h.manager
            .reconcile(&hours_finding(b, r, u, 50.0, Severity::Critical), Utc::now())
            .await
            .unwrap();
        let result = h
            .manager
            .reconcile(&hours_finding(b, r, u, 55.0, Severity::Low), Utc::now())
            .await
            .unwrap();
        let Reconciled::Updated(alert) = result else { panic!("expected update") };
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.description, "55.0");
    }

    #[test]
    fn hours_within_tolerance_do_not_refresh() {
        let (b, r, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = new_alert(&hours_finding(b, r, u, 50.0, Severity::High), Utc::now());
        let (patch, escalated) =
            refresh_patch(&existing, &hours_finding(b, r, u, 50.3, Severity::High), 0.5);
        assert!(patch.is_empty());
        assert!(!escalated);

        let (patch, _) = refresh_patch(&existing, &hours_finding(b, r, u, 51.0, Severity::High), 0.5);
        assert!(patch.related_data.is_some());
        assert!(patch.severity.is_none());
    }

    #[tokio::test]
    async fn user_transitions_enforce_legality() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let Reconciled::Created(alert) =
            h.manager.reconcile(&expiry_finding(b, c, u, true), Utc::now()).await.unwrap()
        else {
            panic!("expected create")
        };
        let actor = Uuid::new_v4();

        let acked = h.manager.acknowledge(b, alert.id, actor).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by, Some(actor));
        assert!(h.manager.acknowledge(b, alert.id, actor).await.unwrap_err().is_invalid_transition());

        let resolved = h
            .manager
            .resolve(b, alert.id, actor, Some("renewed".into()))
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(actor));

        let err = h.manager.acknowledge(b, alert.id, actor).await.unwrap_err();
        match err {
            ComplianceError::InvalidTransition { current, .. } => assert_eq!(current, "RESOLVED"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.manager.resolve(b, alert.id, actor, None).await.unwrap_err().is_invalid_transition());
        assert!(h.manager.dismiss(b, alert.id, actor, None).await.unwrap_err().is_invalid_transition());
    }

    #[tokio::test]
    async fn refresh_of_alert_closed_meanwhile_is_skipped() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let Reconciled::Created(stale) =
            h.manager.reconcile(&expiry_finding(b, c, u, false), Utc::now()).await.unwrap()
        else {
            panic!("expected create")
        };
        wait_for(&h.count, 1).await;
        h.manager.resolve(b, stale.id, Uuid::new_v4(), None).await.unwrap();

        // A pass that read the alert before the user resolved it.
        let result = h
            .manager
            .refresh(stale.clone(), &expiry_finding(b, c, u, true))
            .await
            .unwrap();
        assert!(matches!(result, Reconciled::Skipped));

        let stored = h.manager.load(b, stale.id).await.unwrap();
        assert_eq!(stored.status, AlertStatus::Resolved);
        assert_eq!(stored.severity, Severity::Medium);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(h.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dismissed_alert_is_not_resurrected() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let finding = expiry_finding(b, c, u, true);
        let Reconciled::Created(first) = h.manager.reconcile(&finding, Utc::now()).await.unwrap() else {
            panic!("expected create")
        };
        h.manager
            .dismiss(b, first.id, Uuid::new_v4(), Some("duplicate".into()))
            .await
            .unwrap();

        let Reconciled::Created(second) = h.manager.reconcile(&finding, Utc::now()).await.unwrap() else {
            panic!("expected a new record")
        };
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn other_tenant_alert_is_not_found() {
        let h = harness();
        let (b, c, u) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let Reconciled::Created(alert) =
            h.manager.reconcile(&expiry_finding(b, c, u, true), Utc::now()).await.unwrap()
        else {
            panic!("expected create")
        };
        let err = h
            .manager
            .acknowledge(Uuid::new_v4(), alert.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn priority_follows_severity() {
        assert_eq!(priority_for(Severity::Low), Priority::Low);
        assert_eq!(priority_for(Severity::Medium), Priority::Normal);
        assert_eq!(priority_for(Severity::Critical), Priority::Urgent);
    }
}
