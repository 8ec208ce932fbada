//! Certification lifecycle evaluation.
//!
//! Status is a pure function of expiry date, "now" and the tenant's warning
//! window, applied forward-only: `ACTIVE -> EXPIRING_SOON -> EXPIRED`.
//! [`review`] never performs I/O; the orchestrator applies the transitions
//! it returns and reconciles its findings.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use shiftguard_core::model::{AlertData, CertificationStatus, Severity, StaffCertification};

use crate::finding::Finding;

const SECONDS_PER_DAY: i64 = 86_400;

/// Status a certification with this expiry date should carry at `now`.
///
/// Used both by [`review`] and when a certification is created or re-dated.
pub fn status_for(
    expiry_date: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_days: u32,
) -> CertificationStatus {
    // A window reaching past the representable range covers every date.
    let within_window = Duration::try_days(i64::from(warning_days))
        .and_then(|window| now.checked_add_signed(window))
        .map_or(true, |limit| expiry_date <= limit);

    if expiry_date < now {
        CertificationStatus::Expired
    } else if within_window {
        CertificationStatus::ExpiringSoon
    } else {
        CertificationStatus::Active
    }
}

/// Whole days until expiry, rounded away from zero; negative once expired.
pub fn days_remaining(expiry_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (expiry_date - now).num_seconds();
    if secs >= 0 {
        (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    } else {
        -((-secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY)
    }
}

/// A status write the orchestrator must persist.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub certification_id: Uuid,
    pub from: CertificationStatus,
    pub to: CertificationStatus,
}

/// Output of one lifecycle review.
#[derive(Debug, Default)]
pub struct CertificationReview {
    pub transitions: Vec<StatusTransition>,
    /// Findings for certifications that changed status in this review.
    pub findings: Vec<Finding>,
    /// Already-expired certifications whose open alert may still need raising
    /// to HIGH. These never create alerts.
    pub escalations: Vec<Finding>,
}

/// Review a tenant's certifications.
///
/// `staff_names` supplies display names for alert snapshots; unknown users
/// fall back to "Staff member". Deleted and PENDING certifications are ignored.
pub fn review(
    certifications: &[StaffCertification],
    staff_names: &HashMap<Uuid, String>,
    now: DateTime<Utc>,
    warning_days: u32,
) -> CertificationReview {
    let mut out = CertificationReview::default();

    for cert in certifications.iter().filter(|c| !c.is_deleted) {
        let staff_name = staff_names
            .get(&cert.user_id)
            .map(String::as_str)
            .unwrap_or("Staff member");

        match cert.status {
            CertificationStatus::Pending => continue,
            CertificationStatus::Expired => {
                out.escalations.push(expired_finding(cert, staff_name, now));
                continue;
            }
            CertificationStatus::Active | CertificationStatus::ExpiringSoon => {}
        }

        let target = status_for(cert.expiry_date, now, warning_days);
        if target == cert.status || !advances(cert.status, target) {
            continue;
        }

        let finding = match target {
            CertificationStatus::Expired => expired_finding(cert, staff_name, now),
            _ => expiring_finding(cert, staff_name, now),
        };
        out.transitions.push(StatusTransition {
            certification_id: cert.id,
            from: cert.status,
            to: target,
        });
        out.findings.push(finding);
    }

    out
}

fn advances(from: CertificationStatus, to: CertificationStatus) -> bool {
    matches!((from.stage(), to.stage()), (Some(a), Some(b)) if b > a)
}

fn expired_finding(cert: &StaffCertification, staff_name: &str, now: DateTime<Utc>) -> Finding {
    Finding {
        business_id: cert.business_id,
        user_id: Some(cert.user_id),
        severity: Severity::High,
        title: format!("{} certification expired", cert.name),
        description: format!(
            "{}'s {} certification expired on {}. They may not be qualified for assigned duties until it is renewed.",
            staff_name,
            cert.name,
            cert.expiry_date.format("%Y-%m-%d"),
        ),
        due_date: Some(now),
        data: AlertData::CertificationExpiry {
            certification_id: cert.id,
            certification_name: cert.name.clone(),
            staff_name: staff_name.to_string(),
            expiry_date: cert.expiry_date,
            days_remaining: days_remaining(cert.expiry_date, now),
            expired: true,
        },
    }
}

fn expiring_finding(cert: &StaffCertification, staff_name: &str, now: DateTime<Utc>) -> Finding {
    let days = days_remaining(cert.expiry_date, now);
    Finding {
        business_id: cert.business_id,
        user_id: Some(cert.user_id),
        severity: Severity::Medium,
        title: format!("{} certification expiring soon", cert.name),
        description: format!(
            "{}'s {} certification expires on {} ({} day{} remaining).",
            staff_name,
            cert.name,
            cert.expiry_date.format("%Y-%m-%d"),
            days,
            if days == 1 { "" } else { "s" },
        ),
        due_date: Some(cert.expiry_date),
        data: AlertData::CertificationExpiry {
            certification_id: cert.id,
            certification_name: cert.name.clone(),
            staff_name: staff_name.to_string(),
            expiry_date: cert.expiry_date,
            days_remaining: days,
            expired: false,
        },
    }
}
