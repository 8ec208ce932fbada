//! `REQUIRED_REST`: shortest inter-shift gap against
//! `requiredRestHoursBetweenShifts`.

use async_trait::async_trait;
use chrono::Duration;
use tracing::warn;

use shiftguard_core::model::{AlertData, ComplianceRule};
use shiftguard_core::ComplianceResult;

use super::{missing_parameter, staff_label, RuleCheck, RuleContext, RuleOutcome};
use crate::finding::Finding;

pub struct RequiredRestCheck;

#[async_trait]
impl RuleCheck for RequiredRestCheck {
    async fn check(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome> {
        let required = rule
            .parameters
            .required_rest_hours_between_shifts
            .filter(|h| *h > 0.0)
            .ok_or_else(|| missing_parameter(rule, "requiredRestHoursBetweenShifts"))?;

        let mut outcome = RuleOutcome::complete(Vec::new());
        for user in ctx.staff.iter().filter(|u| !u.is_deleted) {
            let gap = match ctx.staffing.inter_shift_gap(user.id, ctx.business_id).await {
                Ok(g) => g,
                Err(e) => {
                    warn!(
                        business_id = %ctx.business_id,
                        rule_id = %rule.id,
                        user_id = %user.id,
                        error = %e,
                        "inter-shift gap unavailable"
                    );
                    outcome.complete = false;
                    continue;
                }
            };
            if gap >= required {
                continue;
            }

            let staff_name = staff_label(user);
            outcome.findings.push(Finding {
                business_id: ctx.business_id,
                user_id: Some(user.id),
                severity: rule.severity,
                title: format!("Insufficient rest between shifts: {staff_name}"),
                description: describe(staff_name, gap, required, &rule.name),
                due_date: Some(ctx.now + Duration::days(1)),
                data: AlertData::RestViolation {
                    rule_id: rule.id,
                    rule_name: rule.name.clone(),
                    staff_name: staff_name.to_string(),
                    rest_hours: gap,
                    required_rest_hours: required,
                },
            });
        }

        Ok(outcome)
    }
}

fn describe(staff_name: &str, gap: f64, required: f64, rule_name: &str) -> String {
    format!(
        "{staff_name} has only {gap:.1} hours between shifts; rule '{rule_name}' requires {required:.1}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::test_support::{rule, staff};
    use chrono::Utc;
    use shiftguard_core::model::{RuleParameters, RuleType};
    use shiftguard_core::providers::{StaticStaffing, Timesheet};
    use uuid::Uuid;

    #[tokio::test]
    async fn short_gap_is_flagged_and_unscheduled_staff_pass() {
        let business_id = Uuid::new_v4();
        let ana = staff(business_id, "Ana");
        let ben = staff(business_id, "Ben");
        let staffing = StaticStaffing::new(vec![Timesheet {
            user_id: ana.id,
            business_id,
            weekly_hours: 30.0,
            shortest_rest_hours: Some(8.0),
        }]);
        let staff = vec![ana.clone(), ben];
        let ctx = RuleContext {
            business_id,
            staff: &staff,
            certifications: &[],
            staffing: &staffing,
            now: Utc::now(),
        };
        let rule = rule(
            business_id,
            RuleType::RequiredRest,
            RuleParameters {
                required_rest_hours_between_shifts: Some(11.0),
                ..Default::default()
            },
        );

        let outcome = RequiredRestCheck.check(&rule, &ctx).await.unwrap();
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].user_id, Some(ana.id));
        match &outcome.findings[0].data {
            AlertData::RestViolation { rest_hours, required_rest_hours, .. } => {
                assert_eq!(*rest_hours, 8.0);
                assert_eq!(*required_rest_hours, 11.0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
