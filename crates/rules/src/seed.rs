//! YAML seed data for the in-memory store.
//!
//! The worker binary has no database; it boots from a seed document listing
//! tenants, staff, configurations, certifications, rules and timesheets.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use shiftguard_core::model::{
    AgentConfiguration, Business, ComplianceRule, StaffCertification, User,
};
use shiftguard_core::providers::{StaticStaffing, Timesheet};
use shiftguard_core::{ComplianceStore, MemoryStore};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    pub businesses: Vec<Business>,
    pub users: Vec<User>,
    pub agent_configurations: Vec<AgentConfiguration>,
    pub certifications: Vec<StaffCertification>,
    pub rules: Vec<ComplianceRule>,
    pub timesheets: Vec<Timesheet>,
}

impl Seed {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing seed file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Insert every record and return the timesheets as a staffing provider.
    pub async fn load_into(self, store: &MemoryStore) -> anyhow::Result<StaticStaffing> {
        for business in self.businesses {
            store.insert_business(business).await;
        }
        for user in self.users {
            store.insert_user(user).await;
        }
        for config in self.agent_configurations {
            store.upsert_agent_config(config).await?;
        }
        for certification in self.certifications {
            store.insert_certification(certification).await?;
        }
        for rule in self.rules {
            store.insert_rule(rule).await?;
        }
        Ok(StaticStaffing::new(self.timesheets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftguard_core::providers::StaffingProvider;
    use shiftguard_core::store::{CertificationFilter, RuleFilter};
    use uuid::Uuid;

    const SEED: &str = r#"
businesses:
  - id: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    name: Harbor Cafe
    subscribedAgents: [compliance-monitoring]
users:
  - id: 0b7e4f0a-1d2c-4e55-8a3b-2f9d6c1e7a01
    businessId: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    name: Ana Silva
agentConfigurations:
  - businessId: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    isEnabled: true
    monitoringFrequencyHours: 6
certifications:
  - id: 9a4d2c7e-5b1f-4a08-b3e6-7c0d8f2e1a55
    businessId: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    userId: 0b7e4f0a-1d2c-4e55-8a3b-2f9d6c1e7a01
    name: Food Safety
    expiryDate: 2030-01-31T00:00:00Z
    status: ACTIVE
rules:
  - id: 3c8e1b6d-2f4a-4d9c-8e07-1a5b9c3d7f22
    businessId: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    name: Kitchen staff certifications
    type: CERTIFICATION_REQUIREMENT
    severity: HIGH
    parameters:
      requiredCertifications: [Food Safety, First Aid]
timesheets:
  - userId: 0b7e4f0a-1d2c-4e55-8a3b-2f9d6c1e7a01
    businessId: 6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11
    weeklyHours: 44.5
"#;

    #[tokio::test]
    async fn loads_every_section() {
        let seed = Seed::from_yaml(SEED).unwrap();
        assert_eq!(seed.businesses.len(), 1);
        assert_eq!(seed.agent_configurations[0].monitoring_frequency_hours, 6);

        let store = MemoryStore::new();
        let business_id: Uuid = "6f1c7a52-3a8e-4c61-9d2b-5b0a0e2f1c11".parse().unwrap();
        let user_id: Uuid = "0b7e4f0a-1d2c-4e55-8a3b-2f9d6c1e7a01".parse().unwrap();
        let staffing = seed.load_into(&store).await.unwrap();

        assert_eq!(store.find_staff(business_id).await.unwrap().len(), 1);
        assert_eq!(
            store
                .find_certifications(&CertificationFilter::for_business(business_id))
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store.find_rules(&RuleFilter::active_for(business_id)).await.unwrap().len(),
            1
        );
        assert_eq!(staffing.weekly_hours(user_id, business_id).await.unwrap(), 44.5);
    }

    #[test]
    fn empty_document_is_an_empty_seed() {
        let seed = Seed::from_yaml("{}").unwrap();
        assert!(seed.businesses.is_empty());
        assert!(seed.rules.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(Seed::from_yaml("businesses: [ { id: nope } ]").is_err());
    }
}
