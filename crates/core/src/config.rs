use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Default warning window applied when a tenant has no configuration row.
pub const DEFAULT_WARNING_DAYS: u32 = 30;
/// Default per-tenant full-pass frequency.
pub const DEFAULT_FREQUENCY_HOURS: u32 = 24;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cron expression (5 or 6 fields, UTC) for the global certification sweep.
    pub sweep_cron: String,
    /// Warning window used when a tenant has no configuration row.
    pub default_warning_days: u32,
    /// Minimum change in an hours/rest figure before an open alert is refreshed.
    pub hours_tolerance: f64,
    /// Horizon for "upcoming expirations" in the compliance summary.
    pub summary_horizon_days: u32,
    pub notify: NotifyConfig,
}

impl MonitorConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            sweep_cron: env_or("COMPLIANCE_SWEEP_CRON", "0 6 * * *"),
            default_warning_days: env_parse("COMPLIANCE_DEFAULT_WARNING_DAYS", DEFAULT_WARNING_DAYS),
            hours_tolerance: env_parse("COMPLIANCE_HOURS_TOLERANCE", 0.5),
            summary_horizon_days: env_parse("COMPLIANCE_SUMMARY_HORIZON_DAYS", 90),
            notify: NotifyConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  sweep:       cron={}", self.sweep_cron);
        tracing::info!("  warning:     default_days={}", self.default_warning_days);
        tracing::info!("  tolerance:   hours={}", self.hours_tolerance);
        tracing::info!("  summary:     horizon_days={}", self.summary_horizon_days);
        tracing::info!(
            "  notify:      webhook={}",
            if self.notify.is_configured() { "configured" } else { "(none)" }
        );
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_cron: "0 6 * * *".to_string(),
            default_warning_days: DEFAULT_WARNING_DAYS,
            hours_tolerance: 0.5,
            summary_horizon_days: 90,
            notify: NotifyConfig::default(),
        }
    }
}

// ── Notification channels ─────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    /// Bearer token sent with every webhook request.
    pub webhook_token: Option<String>,
    /// Per-request timeout; the channel default applies when unset.
    pub webhook_timeout_secs: Option<u64>,
    /// Optional minijinja body template for webhook deliveries.
    pub webhook_template: Option<String>,
}

impl NotifyConfig {
    fn from_env() -> Self {
        Self {
            webhook_url: env_opt("NOTIFY_WEBHOOK_URL"),
            webhook_token: env_opt("NOTIFY_WEBHOOK_TOKEN"),
            webhook_timeout_secs: env_opt("NOTIFY_WEBHOOK_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            webhook_template: env_opt("NOTIFY_WEBHOOK_TEMPLATE"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}
