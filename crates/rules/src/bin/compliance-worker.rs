//! compliance-worker — runs the tenant scheduler against seeded data.
//!
//! Loads a YAML seed into the in-memory store, starts one recurring pass per
//! enabled tenant plus the global certification sweep, and runs until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use shiftguard_core::config::{load_dotenv, MonitorConfig};
use shiftguard_core::providers::StoreAccessPolicy;
use shiftguard_core::store::ConfigFilter;
use shiftguard_core::{ComplianceStore, MemoryStore, COMPLIANCE_AGENT};
use shiftguard_notify::log::LogNotifier;
use shiftguard_notify::templating::TemplateRenderer;
use shiftguard_notify::webhook::{WebhookNotifier, WebhookSettings};
use shiftguard_notify::{Dispatcher, Notifier};
use shiftguard_rules::seed::Seed;
use shiftguard_rules::{ComplianceMonitor, PassOutcome, PassScope, TenantScheduler};

// ── CLI ─────────────────────────────────────────────────────────────

/// Staff compliance monitor worker.
#[derive(Parser, Debug)]
#[command(name = "compliance-worker", version, about)]
struct Cli {
    /// Path to the YAML seed document.
    #[arg(long, env = "COMPLIANCE_SEED", default_value = "data/seed.yaml")]
    seed: PathBuf,

    /// Override the certification sweep cron (5 or 6 fields, UTC).
    #[arg(long)]
    sweep_cron: Option<String>,

    /// Run one full pass for every enabled tenant and exit.
    #[arg(long)]
    run_once: bool,
}

fn build_dispatcher(config: &MonitorConfig) -> anyhow::Result<Dispatcher> {
    let notify = &config.notify;
    let channel: Arc<dyn Notifier> = match &notify.webhook_url {
        Some(url) => {
            let mut settings = WebhookSettings::new(url.clone())
                .with_token(notify.webhook_token.clone())
                .with_template(notify.webhook_template.clone());
            if let Some(secs) = notify.webhook_timeout_secs {
                settings = settings.with_timeout(Duration::from_secs(secs));
            }
            Arc::new(WebhookNotifier::new(settings, Arc::new(TemplateRenderer::new()))?)
        }
        None => Arc::new(LogNotifier),
    };
    info!(channel = channel.channel_name(), "notification channel ready");
    Ok(Dispatcher::new(vec![channel]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = MonitorConfig::from_env();
    if let Some(cron) = cli.sweep_cron {
        config.sweep_cron = cron;
    }
    config.log_summary();

    let store = Arc::new(MemoryStore::new());
    let staffing = Seed::from_path(&cli.seed)?.load_into(&store).await?;
    info!(path = %cli.seed.display(), "seed loaded");

    let store: Arc<dyn ComplianceStore> = store;
    let dispatcher = Arc::new(build_dispatcher(&config)?);
    let sweep_cron = config.sweep_cron.clone();
    let monitor = Arc::new(ComplianceMonitor::new(
        store.clone(),
        Arc::new(StoreAccessPolicy::new(store.clone())),
        Arc::new(staffing),
        dispatcher,
        config,
    ));

    if cli.run_once {
        let configs = store
            .find_agent_configs(&ConfigFilter::enabled(COMPLIANCE_AGENT))
            .await?;
        for cfg in configs {
            match monitor.run_pass(cfg.business_id, PassScope::Full).await {
                Ok(PassOutcome::Completed(report)) => {
                    println!("{}", serde_json::to_string_pretty(&report)?)
                }
                Ok(PassOutcome::Skipped(reason)) => {
                    info!(business_id = %cfg.business_id, reason = ?reason, "pass skipped")
                }
                Err(e) => warn!(business_id = %cfg.business_id, error = %e, "pass failed"),
            }
        }
        return Ok(());
    }

    let scheduler = TenantScheduler::new(store, monitor, sweep_cron);
    let jobs = scheduler.initialize().await?;
    info!(jobs, "compliance-worker running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    scheduler.shutdown().await;
    info!("compliance-worker exited cleanly");
    Ok(())
}
