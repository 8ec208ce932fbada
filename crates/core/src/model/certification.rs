use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a staff certification.
///
/// `Pending` is an initial state set outside the engine; the other three
/// only ever advance `Active -> ExpiringSoon -> Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationStatus {
    Active,
    ExpiringSoon,
    Expired,
    Pending,
}

impl CertificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationStatus::Active => "ACTIVE",
            CertificationStatus::ExpiringSoon => "EXPIRING_SOON",
            CertificationStatus::Expired => "EXPIRED",
            CertificationStatus::Pending => "PENDING",
        }
    }

    /// Whether the certification currently counts as held.
    pub fn is_current(&self) -> bool {
        matches!(
            self,
            CertificationStatus::Active | CertificationStatus::ExpiringSoon
        )
    }

    /// Position along the forward-only lifecycle; `None` for `Pending`.
    pub fn stage(&self) -> Option<u8> {
        match self {
            CertificationStatus::Active => Some(0),
            CertificationStatus::ExpiringSoon => Some(1),
            CertificationStatus::Expired => Some(2),
            CertificationStatus::Pending => None,
        }
    }
}

impl std::fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential held by one staff member of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffCertification {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub issuing_authority: Option<String>,
    pub expiry_date: DateTime<Utc>,
    pub status: CertificationStatus,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}
