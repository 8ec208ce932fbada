//! Tenant-scoped records the compliance engine reads and writes.
//!
//! Serialized field names follow the API's camelCase convention; enum
//! values are SCREAMING_SNAKE_CASE.

mod alert;
mod business;
mod certification;
mod rule;

pub use alert::*;
pub use business::*;
pub use certification::*;
pub use rule::*;

use serde::{Deserialize, Serialize};

/// Severity shared by rules and alerts. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
