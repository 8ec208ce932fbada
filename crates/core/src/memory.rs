//! In-process [`ComplianceStore`] backed by hash maps behind a tokio `RwLock`.
//!
//! Every write takes the single write lock, which makes per-id updates and
//! the keyed alert insert atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ComplianceError, ComplianceResult};
use crate::model::*;
use crate::store::*;

#[derive(Default)]
struct Tables {
    businesses: HashMap<Uuid, Business>,
    users: HashMap<Uuid, User>,
    configs: HashMap<(Uuid, String), AgentConfiguration>,
    certifications: HashMap<Uuid, StaffCertification>,
    rules: HashMap<Uuid, ComplianceRule>,
    alerts: HashMap<Uuid, ComplianceAlert>,
}

/// Hash-map store used by the worker binary and the test suites.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant (provisioning happens outside the engine).
    pub async fn insert_business(&self, business: Business) {
        self.tables
            .write()
            .await
            .businesses
            .insert(business.id, business);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Total number of alerts of any status.
    pub async fn alert_count(&self) -> usize {
        self.tables.read().await.alerts.len()
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn get_business(&self, id: Uuid) -> ComplianceResult<Option<Business>> {
        Ok(self.tables.read().await.businesses.get(&id).cloned())
    }

    async fn get_user(&self, id: Uuid) -> ComplianceResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_staff(&self, business_id: Uuid) -> ComplianceResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut staff: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.business_id == business_id && !u.is_deleted)
            .cloned()
            .collect();
        staff.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(staff)
    }

    async fn find_agent_configs(
        &self,
        filter: &ConfigFilter,
    ) -> ComplianceResult<Vec<AgentConfiguration>> {
        let tables = self.tables.read().await;
        let mut configs: Vec<AgentConfiguration> = tables
            .configs
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.business_id);
        Ok(configs)
    }

    async fn get_agent_config(
        &self,
        business_id: Uuid,
        agent_kind: &str,
    ) -> ComplianceResult<Option<AgentConfiguration>> {
        let tables = self.tables.read().await;
        Ok(tables
            .configs
            .get(&(business_id, agent_kind.to_string()))
            .cloned())
    }

    async fn upsert_agent_config(
        &self,
        config: AgentConfiguration,
    ) -> ComplianceResult<AgentConfiguration> {
        let mut tables = self.tables.write().await;
        tables.configs.insert(
            (config.business_id, config.agent_kind.clone()),
            config.clone(),
        );
        Ok(config)
    }

    async fn delete_agent_config(
        &self,
        business_id: Uuid,
        agent_kind: &str,
    ) -> ComplianceResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .configs
            .remove(&(business_id, agent_kind.to_string()))
            .is_some())
    }

    async fn find_certifications(
        &self,
        filter: &CertificationFilter,
    ) -> ComplianceResult<Vec<StaffCertification>> {
        let tables = self.tables.read().await;
        let mut certs: Vec<StaffCertification> = tables
            .certifications
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        certs.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then(a.id.cmp(&b.id)));
        Ok(certs)
    }

    async fn get_certification(&self, id: Uuid) -> ComplianceResult<Option<StaffCertification>> {
        Ok(self.tables.read().await.certifications.get(&id).cloned())
    }

    async fn insert_certification(
        &self,
        cert: StaffCertification,
    ) -> ComplianceResult<StaffCertification> {
        let mut tables = self.tables.write().await;
        if tables.certifications.contains_key(&cert.id) {
            return Err(ComplianceError::Store(format!(
                "certification {} already exists",
                cert.id
            )));
        }
        tables.certifications.insert(cert.id, cert.clone());
        Ok(cert)
    }

    async fn update_certification(
        &self,
        id: Uuid,
        patch: &CertificationPatch,
    ) -> ComplianceResult<StaffCertification> {
        let mut tables = self.tables.write().await;
        let cert = tables
            .certifications
            .get_mut(&id)
            .ok_or_else(|| ComplianceError::not_found("certification", id))?;
        patch.apply(cert);
        Ok(cert.clone())
    }

    async fn find_rules(&self, filter: &RuleFilter) -> ComplianceResult<Vec<ComplianceRule>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<ComplianceRule> = tables
            .rules
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn get_rule(&self, id: Uuid) -> ComplianceResult<Option<ComplianceRule>> {
        Ok(self.tables.read().await.rules.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: ComplianceRule) -> ComplianceResult<ComplianceRule> {
        let mut tables = self.tables.write().await;
        if tables.rules.contains_key(&rule.id) {
            return Err(ComplianceError::Store(format!("rule {} already exists", rule.id)));
        }
        tables.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, id: Uuid, patch: &RulePatch) -> ComplianceResult<ComplianceRule> {
        let mut tables = self.tables.write().await;
        let rule = tables
            .rules
            .get_mut(&id)
            .ok_or_else(|| ComplianceError::not_found("rule", id))?;
        patch.apply(rule);
        Ok(rule.clone())
    }

    async fn find_alerts(&self, filter: &AlertFilter) -> ComplianceResult<Vec<ComplianceAlert>> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<ComplianceAlert> = tables
            .alerts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(alerts)
    }

    async fn find_open_alert(&self, key: &AlertKey) -> ComplianceResult<Option<ComplianceAlert>> {
        let tables = self.tables.read().await;
        Ok(open_alert_for(&tables, key).cloned())
    }

    async fn get_alert(&self, id: Uuid) -> ComplianceResult<Option<ComplianceAlert>> {
        Ok(self.tables.read().await.alerts.get(&id).cloned())
    }

    async fn insert_alert_if_absent(&self, alert: ComplianceAlert) -> ComplianceResult<AlertInsert> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = open_alert_for(&tables, &alert.key()) {
            return Ok(AlertInsert::Existing(existing.clone()));
        }
        tables.alerts.insert(alert.id, alert.clone());
        Ok(AlertInsert::Inserted(alert))
    }

    async fn update_alert(&self, id: Uuid, patch: &AlertPatch) -> ComplianceResult<ComplianceAlert> {
        let mut tables = self.tables.write().await;
        let alert = tables
            .alerts
            .get_mut(&id)
            .ok_or_else(|| ComplianceError::not_found("alert", id))?;
        if let Some(expected) = patch.expected_status {
            if alert.status != expected {
                return Err(ComplianceError::InvalidTransition {
                    entity: "alert",
                    id: id.to_string(),
                    current: alert.status.to_string(),
                    requested: format!("update from {expected}"),
                });
            }
        }
        patch.apply(alert);
        Ok(alert.clone())
    }
}

fn open_alert_for<'a>(tables: &'a Tables, key: &AlertKey) -> Option<&'a ComplianceAlert> {
    tables
        .alerts
        .values()
        .find(|a| a.is_open() && a.key() == *key)
}
