//! `MAXIMUM_HOURS`: weekly hours per staff member against `maxWeeklyHours`.
//!
//! Hours come from the [`StaffingProvider`](shiftguard_core::providers::StaffingProvider);
//! this check only compares.

use async_trait::async_trait;
use chrono::Duration;
use tracing::warn;

use shiftguard_core::model::{AlertData, ComplianceRule};
use shiftguard_core::ComplianceResult;

use super::{missing_parameter, staff_label, RuleCheck, RuleContext, RuleOutcome};
use crate::finding::Finding;

pub struct MaximumHoursCheck;

#[async_trait]
impl RuleCheck for MaximumHoursCheck {
    async fn check(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome> {
        let max = rule
            .parameters
            .max_weekly_hours
            .filter(|h| *h > 0.0)
            .ok_or_else(|| missing_parameter(rule, "maxWeeklyHours"))?;

        let mut outcome = RuleOutcome::complete(Vec::new());
        for user in ctx.staff.iter().filter(|u| !u.is_deleted) {
            let hours = match ctx.staffing.weekly_hours(user.id, ctx.business_id).await {
                Ok(h) => h,
                Err(e) => {
                    warn!(
                        business_id = %ctx.business_id,
                        rule_id = %rule.id,
                        user_id = %user.id,
                        error = %e,
                        "weekly hours unavailable"
                    );
                    outcome.complete = false;
                    continue;
                }
            };
            if hours <= max {
                continue;
            }

            let staff_name = staff_label(user);
            outcome.findings.push(Finding {
                business_id: ctx.business_id,
                user_id: Some(user.id),
                severity: rule.severity,
                title: format!("Weekly hours limit exceeded: {staff_name}"),
                description: describe(staff_name, hours, max, &rule.name),
                due_date: Some(ctx.now + Duration::days(1)),
                data: AlertData::HoursViolation {
                    rule_id: rule.id,
                    rule_name: rule.name.clone(),
                    staff_name: staff_name.to_string(),
                    current_hours: hours,
                    max_weekly_hours: max,
                },
            });
        }

        Ok(outcome)
    }
}

fn describe(staff_name: &str, hours: f64, max: f64, rule_name: &str) -> String {
    format!(
        "{staff_name} is at {hours:.1} hours this week, above the {max:.1}-hour limit set by rule '{rule_name}'."
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

    fn sheet(user_id: Uuid, business_id: Uuid, hours: f64) -> Timesheet {
        Timesheet {
            user_id,
            business_id,
            weekly_hours: hours,
            shortest_rest_hours: None,
        }
    }

    #[tokio::test]
    async fn flags_only_staff_over_the_limit() {
        let business_id = Uuid::new_v4();
        let ana = staff(business_id, "Ana");
        let ben = staff(business_id, "Ben");
        let staffing = StaticStaffing::new(vec![
            sheet(ana.id, business_id, 52.5),
            sheet(ben.id, business_id, 40.0),
        ]);
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
            RuleType::MaximumHours,
            RuleParameters {
                max_weekly_hours: Some(40.0),
                ..Default::default()
            },
        );

        let outcome = MaximumHoursCheck.check(&rule, &ctx).await.unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].user_id, Some(ana.id));
        assert!(outcome.findings[0].description.contains("52.5"));
        assert_eq!(outcome.findings[0].data.related_entity_id(), rule.id.to_string());
    }

    #[tokio::test]
    async fn missing_limit_is_an_evaluation_error() {
        let business_id = Uuid::new_v4();
        let staffing = StaticStaffing::new(Vec::<Timesheet>::new());
        let ctx = RuleContext {
            business_id,
            staff: &[],
            certifications: &[],
            staffing: &staffing,
            now: Utc::now(),
        };
        let rule = rule(business_id, RuleType::MaximumHours, RuleParameters::default());
        let err = MaximumHoursCheck.check(&rule, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("maxWeeklyHours"));
    }
}
