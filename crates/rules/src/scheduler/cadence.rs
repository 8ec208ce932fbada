//! Frequency-to-cron conversion and cron parsing helpers.

use std::str::FromStr;

use cron::Schedule;

use shiftguard_core::{ComplianceError, ComplianceResult};

/// Recurrence of a tenant's full pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once a day at midnight UTC.
    Daily,
    /// On every hour divisible by N (1..=23). Values that do not divide 24
    /// leave a shorter gap across midnight, as cron step syntax does.
    EveryHours(u32),
}

impl Cadence {
    /// Validate a configured `monitoringFrequencyHours` value.
    pub fn from_frequency(hours: u32) -> ComplianceResult<Self> {
        match hours {
            24 => Ok(Cadence::Daily),
            1..=23 => Ok(Cadence::EveryHours(hours)),
            _ => Err(ComplianceError::validation(format!(
                "monitoringFrequencyHours must be between 1 and 24, got {hours}"
            ))),
        }
    }

    pub fn frequency_hours(&self) -> u32 {
        match self {
            Cadence::Daily => 24,
            Cadence::EveryHours(n) => *n,
        }
    }

    /// 6-field cron expression for this cadence.
    pub fn cron_expression(&self) -> String {
        match self {
            Cadence::Daily => "0 0 0 * * *".to_string(),
            Cadence::EveryHours(n) => format!("0 0 */{n} * * *"),
        }
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Operators configure standard 5-field cron: `min hour day-of-month month day-of-week`.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse a 5- or 6-field cron expression.
pub fn parse_schedule(expr: &str) -> ComplianceResult<Schedule> {
    Schedule::from_str(&normalize_cron(expr)).map_err(|e| ComplianceError::Scheduling {
        target: format!("cron '{expr}'"),
        message: e.to_string(),
    })
}
