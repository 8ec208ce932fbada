//! A single recurring job: a tokio task that sleeps until the next cron tick,
//! runs its body, and repeats until stopped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use shiftguard_core::ComplianceResult;

/// Work the scheduler triggers.
#[async_trait]
pub trait PassRunner: Send + Sync + 'static {
    /// Full pass for one tenant.
    async fn run_tenant_pass(&self, business_id: Uuid) -> ComplianceResult<()>;

    /// Certification-only pass for every enabled tenant.
    async fn run_certification_sweep(&self) -> ComplianceResult<()>;
}

/// Handle to a running job. Dropping it does not stop the job; call
/// [`stop`](JobHandle::stop).
pub struct JobHandle {
    name: String,
    cancel: Arc<Notify>,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Spawn a job that invokes `body` on every tick of `schedule`.
    ///
    /// Each invocation runs in its own task, so an `Err` or a panic is logged
    /// and the next tick still fires. Missed ticks are not replayed.
    pub fn spawn<F, Fut>(name: impl Into<String>, schedule: Schedule, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ComplianceResult<()>> + Send + 'static,
    {
        let name = name.into();
        let cancel = Arc::new(Notify::new());
        let task = tokio::spawn(run_loop(name.clone(), schedule, cancel.clone(), body));
        Self { name, cancel, task }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop future firings. A firing already in progress runs to completion;
    /// await the returned handle to wait for it.
    pub fn stop(self) -> JoinHandle<()> {
        // notify_one keeps a permit, so a stop during a firing is seen as
        // soon as the loop next waits.
        self.cancel.notify_one();
        debug!(job = %self.name, "job stopped");
        self.task
    }
}

async fn run_loop<F, Fut>(name: String, schedule: Schedule, cancel: Arc<Notify>, body: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ComplianceResult<()>> + Send + 'static,
{
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!(job = %name, "schedule has no upcoming ticks; job exiting");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.notified() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        debug!(job = %name, tick = %next, "job firing");
        fire(&name, body()).await;
    }
}

async fn fire<Fut>(name: &str, fut: Fut)
where
    Fut: Future<Output = ComplianceResult<()>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(job = %name, error = %e, "job run failed"),
        Err(e) if e.is_panic() => warn!(job = %name, "job run panicked"),
        Err(e) => warn!(job = %name, error = %e, "job run cancelled"),
    }
}
