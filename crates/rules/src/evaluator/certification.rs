//! `CERTIFICATION_REQUIREMENT`: every staff member must hold each listed
//! certification in a current (ACTIVE or EXPIRING_SOON) status.

use async_trait::async_trait;
use chrono::Duration;

use shiftguard_core::model::{AlertData, ComplianceRule, StaffCertification, User};
use shiftguard_core::ComplianceResult;

use super::{staff_label, RuleCheck, RuleContext, RuleOutcome};
use crate::finding::Finding;

/// Days given to obtain a missing certification.
const MISSING_CERTIFICATION_DUE_DAYS: i64 = 7;

pub struct CertificationRequirementCheck;

#[async_trait]
impl RuleCheck for CertificationRequirementCheck {
    async fn check(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome> {
        let required: Vec<&str> = rule
            .parameters
            .required_certifications
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();

        let mut findings = Vec::new();
        for user in ctx.staff.iter().filter(|u| !u.is_deleted) {
            for name in &required {
                if holds(user, name, ctx.certifications) {
                    continue;
                }
                let staff_name = staff_label(user);
                findings.push(Finding {
                    business_id: ctx.business_id,
                    user_id: Some(user.id),
                    severity: rule.severity,
                    title: format!("Missing required certification: {name}"),
                    description: format!(
                        "{staff_name} does not hold a current {name} certification required by rule '{}'.",
                        rule.name
                    ),
                    due_date: Some(ctx.now + Duration::days(MISSING_CERTIFICATION_DUE_DAYS)),
                    data: AlertData::MissingCertification {
                        rule_id: rule.id,
                        rule_name: rule.name.clone(),
                        certification_name: name.to_string(),
                        staff_name: staff_name.to_string(),
                    },
                });
            }
        }

        Ok(RuleOutcome::complete(findings))
    }
}

/// Certification names compare case-insensitively.
fn holds(user: &User, name: &str, certifications: &[StaffCertification]) -> bool {
    certifications.iter().any(|c| {
        c.user_id == user.id
            && !c.is_deleted
            && c.status.is_current()
            && c.name.trim().eq_ignore_ascii_case(name)
    })
}
