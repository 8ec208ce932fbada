//! Rule evaluation with per-type dispatch.
//!
//! Each [`RuleType`] maps to a [`RuleCheck`] registered in a lookup table.
//! Types without a check fall through to a placeholder that logs and
//! produces nothing, so tenants can author rules this build cannot evaluate
//! yet without breaking the pass. Every rule is evaluated independently: an
//! error in one is logged and recorded, never propagated.

mod certification;
mod hours;
mod rest;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shiftguard_core::model::{ComplianceRule, RuleType, StaffCertification, User};
use shiftguard_core::providers::StaffingProvider;
use shiftguard_core::{ComplianceError, ComplianceResult};

use crate::finding::Finding;

pub use certification::CertificationRequirementCheck;
pub use hours::MaximumHoursCheck;
pub use rest::RequiredRestCheck;

// ── Check contract ──────────────────────────────────────────────────

/// Tenant data a rule check reads. Built once per pass.
pub struct RuleContext<'a> {
    pub business_id: Uuid,
    /// Non-deleted staff of the tenant.
    pub staff: &'a [User],
    /// Non-deleted certifications of the tenant, statuses already advanced.
    pub certifications: &'a [StaffCertification],
    pub staffing: &'a dyn StaffingProvider,
    pub now: DateTime<Utc>,
}

/// What one rule check produced.
#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub findings: Vec<Finding>,
    /// Every staff member was checked. Open alerts of an incomplete rule are
    /// left alone by stale-alert resolution.
    pub complete: bool,
}

impl RuleOutcome {
    pub fn complete(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            complete: true,
        }
    }

    /// Nothing evaluated.
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Evaluation logic for one rule type.
#[async_trait]
pub trait RuleCheck: Send + Sync {
    async fn check(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome>;
}

/// Declared rule types with no evaluation logic yet.
struct Unimplemented;

#[async_trait]
impl RuleCheck for Unimplemented {
    async fn check(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome> {
        debug!(
            business_id = %ctx.business_id,
            rule_id = %rule.id,
            rule_type = %rule.rule_type,
            "no check for rule type; skipping"
        );
        Ok(RuleOutcome::skipped())
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Aggregate result of evaluating a tenant's rules.
#[derive(Debug, Default)]
pub struct RuleEvaluation {
    pub findings: Vec<Finding>,
    /// Rules that ran to completion.
    pub completed: HashSet<Uuid>,
    /// Rules whose check failed, with the error.
    pub failures: Vec<(Uuid, ComplianceError)>,
    pub evaluated: usize,
}

/// Dispatches rules to their registered [`RuleCheck`].
pub struct RuleEvaluator {
    checks: HashMap<RuleType, Arc<dyn RuleCheck>>,
    fallback: Arc<dyn RuleCheck>,
}

impl RuleEvaluator {
    /// Evaluator with the built-in checks registered.
    pub fn new() -> Self {
        let mut evaluator = Self::empty();
        evaluator.register(
            RuleType::CertificationRequirement,
            Arc::new(CertificationRequirementCheck),
        );
        evaluator.register(RuleType::MaximumHours, Arc::new(MaximumHoursCheck));
        evaluator.register(RuleType::RequiredRest, Arc::new(RequiredRestCheck));
        evaluator
    }

    /// Evaluator where every type is a placeholder.
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
            fallback: Arc::new(Unimplemented),
        }
    }

    /// Install or replace the check for a rule type.
    pub fn register(&mut self, rule_type: RuleType, check: Arc<dyn RuleCheck>) {
        self.checks.insert(rule_type, check);
    }

    pub fn is_registered(&self, rule_type: RuleType) -> bool {
        self.checks.contains_key(&rule_type)
    }

    fn check_for(&self, rule_type: RuleType) -> &Arc<dyn RuleCheck> {
        self.checks.get(&rule_type).unwrap_or(&self.fallback)
    }

    /// Evaluate a single rule. Inactive or deleted rules yield nothing.
    pub async fn evaluate(
        &self,
        rule: &ComplianceRule,
        ctx: &RuleContext<'_>,
    ) -> ComplianceResult<RuleOutcome> {
        if !rule.is_active || rule.is_deleted {
            return Ok(RuleOutcome::skipped());
        }
        self.check_for(rule.rule_type).check(rule, ctx).await
    }

    /// Evaluate every rule, containing failures per rule.
    pub async fn evaluate_all(
        &self,
        rules: &[ComplianceRule],
        ctx: &RuleContext<'_>,
    ) -> RuleEvaluation {
        let mut out = RuleEvaluation::default();

        for rule in rules {
            out.evaluated += 1;
            match self.evaluate(rule, ctx).await {
                Ok(outcome) => {
                    if outcome.complete {
                        out.completed.insert(rule.id);
                    }
                    out.findings.extend(outcome.findings);
                }
                Err(e) => {
                    warn!(
                        business_id = %ctx.business_id,
                        rule_id = %rule.id,
                        rule_type = %rule.rule_type,
                        error = %e,
                        "rule evaluation failed"
                    );
                    out.failures.push((rule.id, e));
                }
            }
        }

        out
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Display name for a staff member in alert text.
pub(crate) fn staff_label(user: &User) -> &str {
    if user.name.trim().is_empty() {
        "Staff member"
    } else {
        &user.name
    }
}

fn missing_parameter(rule: &ComplianceRule, parameter: &str) -> ComplianceError {
    ComplianceError::evaluation(
        format!("rule {}", rule.id),
        format!("{} rule has no {parameter}", rule.rule_type),
    )
}
