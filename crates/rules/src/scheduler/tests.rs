//! Tests for the scheduler module.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use shiftguard_core::model::AgentConfiguration;
    use shiftguard_core::store::ComplianceStore;
    use shiftguard_core::{ComplianceError, ComplianceResult, MemoryStore};

    use crate::scheduler::{
        normalize_cron, parse_schedule, Cadence, JobHandle, PassRunner, ScheduleChange,
        TenantScheduler,
    };

    /// Counts calls. The sweep errors on its first call, panics on its second
    /// and succeeds afterwards.
    #[derive(Default)]
    struct MockRunner {
        tenant_runs: AtomicUsize,
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl PassRunner for MockRunner {
        async fn run_tenant_pass(&self, _business_id: Uuid) -> ComplianceResult<()> {
            self.tenant_runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run_certification_sweep(&self) -> ComplianceResult<()> {
            match self.sweeps.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ComplianceError::Store("connection reset".into())),
                1 => panic!("sweep blew up"),
                _ => Ok(()),
            }
        }
    }

    const DAILY_SWEEP: &str = "0 6 * * *";

    fn scheduler(store: &Arc<MemoryStore>, sweep_cron: &str) -> (TenantScheduler, Arc<MockRunner>) {
        let runner = Arc::new(MockRunner::default());
        let scheduler = TenantScheduler::new(store.clone(), runner.clone(), sweep_cron);
        (scheduler, runner)
    }

    async fn configure(store: &MemoryStore, business_id: Uuid, enabled: bool, hours: u32) {
        store
            .upsert_agent_config(
                AgentConfiguration::compliance(business_id, enabled).with_frequency(hours),
            )
            .await
            .unwrap();
    }

    // -- cadence -----------------------------------------------------------

    #[test]
    fn frequency_maps_to_cron() {
        assert_eq!(Cadence::from_frequency(24).unwrap(), Cadence::Daily);
        assert_eq!(Cadence::Daily.cron_expression(), "0 0 0 * * *");
        assert_eq!(
            Cadence::from_frequency(6).unwrap().cron_expression(),
            "0 0 */6 * * *"
        );
        assert_eq!(Cadence::from_frequency(1).unwrap().frequency_hours(), 1);
    }

    #[test]
    fn frequency_out_of_range_is_rejected() {
        assert!(Cadence::from_frequency(0).is_err());
        assert!(Cadence::from_frequency(25).is_err());
    }

    #[test]
    fn every_cadence_parses() {
        for hours in 1..=24 {
            let cadence = Cadence::from_frequency(hours).unwrap();
            assert!(parse_schedule(&cadence.cron_expression()).is_ok(), "{hours}");
        }
    }

    // -- normalize_cron ----------------------------------------------------

    #[test]
    fn normalize_cron_5_to_6_fields() {
        assert_eq!(normalize_cron("0 6 * * *"), "0 0 6 * * *");
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
    }

    #[test]
    fn normalize_cron_already_6_fields() {
        assert_eq!(normalize_cron("0 0 */6 * * *"), "0 0 */6 * * *");
    }

    #[test]
    fn normalize_cron_trims_whitespace() {
        assert_eq!(normalize_cron("  30 2 * * *  "), "0 30 2 * * *");
    }

    #[test]
    fn invalid_cron_is_a_scheduling_error() {
        match parse_schedule("not a cron").unwrap_err() {
            ComplianceError::Scheduling { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // -- initialize --------------------------------------------------------

    #[tokio::test]
    async fn initialize_with_no_configurations() {
        let store = Arc::new(MemoryStore::new());
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);

        assert_eq!(scheduler.initialize().await.unwrap(), 0);
        assert!(scheduler.has_sweep().await);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn initialize_creates_one_job_per_enabled_tenant_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        configure(&store, a, true, 24).await;
        configure(&store, b, true, 4).await;
        configure(&store, c, false, 24).await;

        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        assert_eq!(scheduler.initialize().await.unwrap(), 2);
        let first = scheduler.job(b).await.unwrap();

        assert_eq!(scheduler.initialize().await.unwrap(), 2);
        assert_eq!(scheduler.job(b).await.unwrap(), first);
        assert!(scheduler.job(c).await.is_none());
        scheduler.shutdown().await;
        assert_eq!(scheduler.job_count().await, 0);
        assert!(!scheduler.has_sweep().await);
    }

    #[tokio::test]
    async fn invalid_sweep_cron_does_not_block_tenant_jobs() {
        let store = Arc::new(MemoryStore::new());
        configure(&store, Uuid::new_v4(), true, 12).await;

        let (scheduler, _) = scheduler(&store, "every morning");
        assert_eq!(scheduler.initialize().await.unwrap(), 1);
        assert!(!scheduler.has_sweep().await);
        scheduler.shutdown().await;
    }

    // -- reconcile ---------------------------------------------------------

    #[tokio::test]
    async fn reconcile_unconfigured_tenant_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        assert_eq!(
            scheduler.reconcile(Uuid::new_v4()).await.unwrap(),
            ScheduleChange::NotScheduled
        );
        assert_eq!(scheduler.job_count().await, 0);
    }

    #[tokio::test]
    async fn disable_then_reenable() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        configure(&store, tenant, true, 24).await;
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        scheduler.initialize().await.unwrap();
        assert_eq!(scheduler.job_count().await, 1);

        configure(&store, tenant, false, 24).await;
        assert_eq!(
            scheduler.reconcile(tenant).await.unwrap(),
            ScheduleChange::Removed
        );
        assert_eq!(scheduler.job_count().await, 0);
        assert_eq!(
            scheduler.reconcile(tenant).await.unwrap(),
            ScheduleChange::NotScheduled
        );

        configure(&store, tenant, true, 24).await;
        assert!(matches!(
            scheduler.reconcile(tenant).await.unwrap(),
            ScheduleChange::Scheduled(_)
        ));
        assert_eq!(scheduler.job_count().await, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn frequency_change_replaces_the_job() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        configure(&store, tenant, true, 24).await;
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        scheduler.initialize().await.unwrap();
        assert_eq!(scheduler.job(tenant).await.unwrap().cron_expression, "0 0 0 * * *");

        configure(&store, tenant, true, 6).await;
        scheduler.reconcile(tenant).await.unwrap();

        let entry = scheduler.job(tenant).await.unwrap();
        assert_eq!(entry.frequency_hours, 6);
        assert_eq!(entry.cron_expression, "0 0 */6 * * *");
        assert_eq!(scheduler.job_count().await, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_frequency_keeps_previous_job() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        configure(&store, tenant, true, 8).await;
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        scheduler.initialize().await.unwrap();

        // Bypasses service validation.
        configure(&store, tenant, true, 48).await;
        match scheduler.reconcile(tenant).await.unwrap_err() {
            ComplianceError::Scheduling { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(scheduler.job(tenant).await.unwrap().frequency_hours, 8);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_reconciles_leave_one_job() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();
        configure(&store, tenant, true, 3).await;
        let (scheduler, _) = scheduler(&store, DAILY_SWEEP);
        let scheduler = Arc::new(scheduler);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            tasks.push(tokio::spawn(async move { scheduler.reconcile(tenant).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(scheduler.job_count().await, 1);
        scheduler.shutdown().await;
    }

    // -- firing ------------------------------------------------------------

    #[tokio::test]
    async fn failing_and_panicking_runs_do_not_stop_the_job() {
        let store = Arc::new(MemoryStore::new());
        let (scheduler, runner) = scheduler(&store, "* * * * * *");
        scheduler.initialize().await.unwrap();

        for _ in 0..60 {
            if runner.sweeps.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(runner.sweeps.load(Ordering::SeqCst) >= 3);
        assert!(scheduler.has_sweep().await);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn stopped_job_does_not_fire_again() {
        let count = Arc::new(AtomicUsize::new(0));
        let schedule = parse_schedule("* * * * * *").unwrap();
        let counter = count.clone();
        let handle = JobHandle::spawn("test", schedule, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        for _ in 0..30 {
            if count.load(Ordering::SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        handle.stop().await.unwrap();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
