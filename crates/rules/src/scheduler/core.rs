//! [`TenantScheduler`] — owns the running job set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shiftguard_core::model::{AgentConfiguration, COMPLIANCE_AGENT};
use shiftguard_core::store::{ComplianceStore, ConfigFilter};
use shiftguard_core::{ComplianceError, ComplianceResult};

use super::cadence::{parse_schedule, Cadence};
use super::entry::TenantScheduleEntry;
use super::job::{JobHandle, PassRunner};

/// Effect of [`TenantScheduler::reconcile`] on a tenant's job.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleChange {
    /// A job now runs with this schedule (created or replaced).
    Scheduled(TenantScheduleEntry),
    /// The tenant's job was stopped and removed.
    Removed,
    /// Disabled or unconfigured tenant with no job; nothing to do.
    NotScheduled,
}

struct ScheduledJob {
    entry: TenantScheduleEntry,
    handle: JobHandle,
}

/// One job per enabled tenant plus the global certification sweep.
///
/// Call [`initialize`](TenantScheduler::initialize) once at startup and
/// [`reconcile`](TenantScheduler::reconcile) after every configuration
/// change for a tenant.
pub struct TenantScheduler {
    store: Arc<dyn ComplianceStore>,
    runner: Arc<dyn PassRunner>,
    sweep_cron: String,
    jobs: Mutex<HashMap<Uuid, ScheduledJob>>,
    sweep: Mutex<Option<JobHandle>>,
}

impl TenantScheduler {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        runner: Arc<dyn PassRunner>,
        sweep_cron: impl Into<String>,
    ) -> Self {
        Self {
            store,
            runner,
            sweep_cron: sweep_cron.into(),
            jobs: Mutex::new(HashMap::new()),
            sweep: Mutex::new(None),
        }
    }

    /// Start the sweep and one job per enabled tenant.
    ///
    /// Idempotent: tenants that already have a job keep it. An invalid sweep
    /// cron or tenant frequency is logged and skipped. Returns the number of
    /// registered tenant jobs.
    pub async fn initialize(&self) -> ComplianceResult<usize> {
        self.start_sweep().await;

        let configs = self
            .store
            .find_agent_configs(&ConfigFilter::enabled(COMPLIANCE_AGENT))
            .await?;

        let mut jobs = self.jobs.lock().await;
        for config in &configs {
            if jobs.contains_key(&config.business_id) {
                continue;
            }
            match prepare(config) {
                Ok((entry, schedule)) => {
                    let handle = self.spawn_tenant_job(config.business_id, schedule);
                    jobs.insert(config.business_id, ScheduledJob { entry, handle });
                }
                Err(e) => warn!(
                    business_id = %config.business_id,
                    error = %e,
                    "tenant job not created"
                ),
            }
        }

        info!(jobs = jobs.len(), "tenant scheduler initialized");
        Ok(jobs.len())
    }

    async fn start_sweep(&self) {
        let mut sweep = self.sweep.lock().await;
        if sweep.is_some() {
            return;
        }
        match parse_schedule(&self.sweep_cron) {
            Ok(schedule) => {
                let runner = self.runner.clone();
                *sweep = Some(JobHandle::spawn("certification-sweep", schedule, move || {
                    let runner = runner.clone();
                    async move { runner.run_certification_sweep().await }
                }));
                debug!(cron = %self.sweep_cron, "certification sweep scheduled");
            }
            Err(e) => warn!(
                cron = %self.sweep_cron,
                error = %e,
                "invalid sweep cron; certification sweep disabled"
            ),
        }
    }

    /// Bring a tenant's job in line with its stored configuration.
    ///
    /// The registry lock is held for the whole read-stop-create sequence, so
    /// concurrent reconciles for a tenant serialize. If the new job cannot be
    /// prepared the previous one keeps running and the error is returned.
    pub async fn reconcile(&self, business_id: Uuid) -> ComplianceResult<ScheduleChange> {
        let mut jobs = self.jobs.lock().await;

        let config = self
            .store
            .get_agent_config(business_id, COMPLIANCE_AGENT)
            .await?
            .filter(|c| c.is_enabled);

        let Some(config) = config else {
            return Ok(match jobs.remove(&business_id) {
                Some(old) => {
                    drop(old.handle.stop());
                    info!(business_id = %business_id, "tenant job removed");
                    ScheduleChange::Removed
                }
                None => ScheduleChange::NotScheduled,
            });
        };

        let (entry, schedule) = prepare(&config).map_err(|e| {
            warn!(
                business_id = %business_id,
                error = %e,
                "tenant job not replaced; keeping previous schedule"
            );
            e
        })?;

        if let Some(old) = jobs.remove(&business_id) {
            drop(old.handle.stop());
        }
        let handle = self.spawn_tenant_job(business_id, schedule);
        jobs.insert(
            business_id,
            ScheduledJob {
                entry: entry.clone(),
                handle,
            },
        );
        info!(
            business_id = %business_id,
            frequency_hours = entry.frequency_hours,
            cron = %entry.cron_expression,
            "tenant job scheduled"
        );
        Ok(ScheduleChange::Scheduled(entry))
    }

    fn spawn_tenant_job(&self, business_id: Uuid, schedule: Schedule) -> JobHandle {
        let runner = self.runner.clone();
        JobHandle::spawn(format!("tenant:{business_id}"), schedule, move || {
            let runner = runner.clone();
            async move { runner.run_tenant_pass(business_id).await }
        })
    }

    /// Snapshot of a tenant's registered job.
    pub async fn job(&self, business_id: Uuid) -> Option<TenantScheduleEntry> {
        self.jobs
            .lock()
            .await
            .get(&business_id)
            .map(|j| j.entry.clone())
    }

    /// Number of registered tenant jobs (the sweep is not counted).
    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn has_sweep(&self) -> bool {
        self.sweep.lock().await.is_some()
    }

    /// Stop every job and wait for in-flight firings to finish.
    pub async fn shutdown(&self) {
        let mut handles = Vec::new();
        for (_, job) in self.jobs.lock().await.drain() {
            handles.push(job.handle.stop());
        }
        if let Some(sweep) = self.sweep.lock().await.take() {
            handles.push(sweep.stop());
        }

        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "job task ended abnormally");
            }
        }
        info!(jobs = count, "tenant scheduler shut down");
    }
}

/// Validate a configuration and build its schedule without touching any job.
fn prepare(config: &AgentConfiguration) -> ComplianceResult<(TenantScheduleEntry, Schedule)> {
    let target = || format!("business {}", config.business_id);
    let cadence = Cadence::from_frequency(config.monitoring_frequency_hours).map_err(|e| {
        ComplianceError::Scheduling {
            target: target(),
            message: e.to_string(),
        }
    })?;
    let cron_expression = cadence.cron_expression();
    let schedule = parse_schedule(&cron_expression).map_err(|e| ComplianceError::Scheduling {
        target: target(),
        message: e.to_string(),
    })?;

    Ok((
        TenantScheduleEntry {
            business_id: config.business_id,
            frequency_hours: cadence.frequency_hours(),
            cron_expression,
            created_at: Utc::now(),
        },
        schedule,
    ))
}
