#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use scheduler_core::{
        models::{MisfireStrategy, ScheduleKind, TriggerStatus, TriggerType},
        traits::{JobLock, JobStore},
        SchedulerConfig, SchedulerError,
    };
    use scheduler_dispatcher::{
        CoreScanner, JobControlService, JobRegistration, TimeRing, SCAN_LOCK_NAME,
    };
    use scheduler_infrastructure::{InMemoryJobStore, LocalJobLock};
    use scheduler_testing_utils::{
        GatedJobStore, JobBuilder, ManualClock, RecordingDispatcher, MINUTE_ALIGNED_MS,
    };

    const NOW: i64 = MINUTE_ALIGNED_MS + 3_000;

    fn service(jobs: Vec<scheduler_core::models::JobDefinition>) -> (JobControlService, InMemoryJobStore, RecordingDispatcher) {
        let store = InMemoryJobStore::with_jobs(jobs);
        let clock = ManualClock::new(NOW);
        let dispatcher = RecordingDispatcher::new(Arc::new(clock.clone()));
        let service = JobControlService::new(
            &SchedulerConfig::default(),
            Arc::new(store.clone()),
            Arc::new(LocalJobLock::new(SCAN_LOCK_NAME)),
            Arc::new(dispatcher.clone()),
            Arc::new(clock),
        );
        (service, store, dispatcher)
    }

    #[tokio::test]
    async fn test_start_job_schedules_after_pre_read_window() {
        let (service, store, _) = service(vec![JobBuilder::new(1).fixed_interval(10).disabled().build()]);

        let job = service.start_job(1).await.unwrap();
        assert_eq!(job.trigger_status, TriggerStatus::Enabled);
        assert_eq!(job.next_fire_time, NOW + 5_000 + 10_000);
        assert_eq!(job.last_fire_time, 0);
        assert_eq!(store.load_by_id(1).await.unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn test_start_job_rejects_unschedulable() {
        let (service, store, _) = service(vec![
            JobBuilder::new(1).without_schedule().disabled().build(),
            JobBuilder::new(2).with_schedule_expr("-1").disabled().build(),
        ]);

        for id in [1, 2] {
            let result = service.start_job(id).await;
            assert!(matches!(result, Err(SchedulerError::ScheduleExpression { .. })));
            assert!(!store.load_by_id(id).await.unwrap().unwrap().is_enabled());
        }
    }

    #[tokio::test]
    async fn test_stop_job_clears_fire_times() {
        let (service, store, _) = service(vec![JobBuilder::new(1)
            .with_next_fire_time(NOW + 1_000)
            .with_last_fire_time(NOW - 4_000)
            .build()]);

        service.stop_job(1).await.unwrap();
        let job = store.load_by_id(1).await.unwrap().unwrap();
        assert_eq!(job.trigger_status, TriggerStatus::Disabled);
        assert_eq!(job.next_fire_time, 0);
        assert_eq!(job.last_fire_time, 0);
    }

    #[tokio::test]
    async fn test_trigger_job_submits_api_request() {
        let (service, _, dispatcher) = service(vec![JobBuilder::new(1).with_param("stored").build()]);

        service
            .trigger_job(1, Some("once".to_string()))
            .await
            .unwrap();

        let records = dispatcher.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request.trigger_type, TriggerType::Api);
        assert_eq!(records[0].request.executor_param.as_deref(), Some("once"));

        let missing = service.trigger_job(99, None).await;
        assert!(matches!(missing, Err(SchedulerError::JobNotFound { id: 99 })));
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_update_schedule() {
        let (service, store, _) = service(vec![
            JobBuilder::new(1).fixed_interval(5).with_next_fire_time(NOW).build(),
            JobBuilder::new(2).fixed_interval(5).disabled().build(),
        ]);

        let invalid = service.update_schedule(1, ScheduleKind::Cron, "nope").await;
        assert!(matches!(invalid, Err(SchedulerError::ScheduleExpression { .. })));
        assert_eq!(store.load_by_id(1).await.unwrap().unwrap().schedule_expr, "5");

        let job = service
            .update_schedule(1, ScheduleKind::FixedInterval, "30")
            .await
            .unwrap();
        assert_eq!(job.next_fire_time, NOW + 5_000 + 30_000);

        let disabled = service
            .update_schedule(2, ScheduleKind::Cron, "0 * * * * *")
            .await
            .unwrap();
        assert_eq!(disabled.schedule_kind, ScheduleKind::Cron);
        assert_eq!(disabled.next_fire_time, 0);
    }

    #[tokio::test]
    async fn test_update_param() {
        let (service, store, _) = service(vec![JobBuilder::new(1).with_param("old").build()]);

        service.update_param(1, Some("new".to_string())).await.unwrap();
        let job = store.load_by_id(1).await.unwrap().unwrap();
        assert_eq!(job.executor_param.as_deref(), Some("new"));

        let missing = service.update_param(2, None).await;
        assert!(matches!(missing, Err(SchedulerError::JobNotFound { id: 2 })));
    }

    #[tokio::test]
    async fn test_register_creates_stopped_cron_job() {
        let (service, store, _) = service(vec![]);

        let id = service
            .register_or_update_job(
                JobRegistration::new("daily-report", "0 0 2 * * *", "report")
                    .with_param("yesterday")
                    .with_description("每日报表"),
            )
            .await
            .unwrap();

        let job = store.load_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.name, "daily-report");
        assert_eq!(job.schedule_kind, ScheduleKind::Cron);
        assert_eq!(job.trigger_status, TriggerStatus::Disabled);
        assert_eq!(job.next_fire_time, 0);
        assert_eq!(job.misfire_strategy, Some(MisfireStrategy::DoNothing));
        assert_eq!(job.fail_retry_count, Some(0));
        assert_eq!(job.executor_param.as_deref(), Some("yesterday"));
        assert_eq!(job.description.as_deref(), Some("每日报表"));

        let invalid = service
            .register_or_update_job(JobRegistration::new("broken", "every day", "report"))
            .await;
        assert!(matches!(invalid, Err(SchedulerError::ScheduleExpression { .. })));
        assert!(service.get_job_by_name("broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_updates_existing_by_name() {
        let (service, store, _) = service(vec![]);
        let registration = JobRegistration::new("sync", "0 * * * * *", "sync").with_param("v1");
        let id = service
            .register_or_update_job(registration.clone())
            .await
            .unwrap();

        let updated_id = service
            .register_or_update_job(
                JobRegistration::new("sync", "30 * * * * *", "sync-v2")
                    .with_param("v2")
                    .auto_start(),
            )
            .await
            .unwrap();
        assert_eq!(updated_id, id);
        assert_eq!(store.query_all().await.unwrap().len(), 1);

        let job = store.load_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.schedule_expr, "30 * * * * *");
        assert_eq!(job.handler, "sync-v2");
        assert_eq!(job.executor_param.as_deref(), Some("v2"));
        assert!(job.is_enabled());
        // 从 now + 预读窗口之后的第一个 30 秒开始
        assert_eq!(job.next_fire_time, MINUTE_ALIGNED_MS + 30_000);

        // auto_start 为 false 时不会停止已启用的任务
        service.register_or_update_job(registration).await.unwrap();
        let job = store.load_by_id(id).await.unwrap().unwrap();
        assert!(job.is_enabled());
        assert_eq!(job.schedule_expr, "0 * * * * *");
        assert_eq!(job.next_fire_time, MINUTE_ALIGNED_MS + 60_000);
    }

    #[tokio::test]
    async fn test_create_job_applies_defaults() {
        let (service, store, _) = service(vec![JobBuilder::new(3).with_name("existing").build()]);

        let id = service
            .create_job(
                JobBuilder::new(0)
                    .fixed_interval(10)
                    .with_name("cleanup")
                    .with_next_fire_time(NOW)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(id, 4);

        let job = store.load_by_id(id).await.unwrap().unwrap();
        assert!(!job.is_enabled());
        assert_eq!(job.next_fire_time, 0);
        assert_eq!(job.misfire_strategy, Some(MisfireStrategy::DoNothing));
        assert_eq!(job.fail_retry_count, Some(0));

        let started = service.start_job(id).await.unwrap();
        assert_eq!(started.next_fire_time, NOW + 5_000 + 10_000);

        let duplicate = service
            .create_job(JobBuilder::new(0).with_name("existing").build())
            .await;
        assert!(matches!(duplicate, Err(SchedulerError::DuplicateJobName(name)) if name == "existing"));

        let invalid = service
            .create_job(JobBuilder::new(0).with_schedule_expr("0").build())
            .await;
        assert!(matches!(invalid, Err(SchedulerError::ScheduleExpression { .. })));
        assert_eq!(store.query_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_lookup() {
        let (service, store, _) = service(vec![
            JobBuilder::new(1).with_name("a").with_handler("mail").build(),
            JobBuilder::new(2).with_name("b").with_handler("mail").build(),
            JobBuilder::new(3).with_name("c").with_handler("report").build(),
        ]);

        let mail: Vec<i64> = service
            .get_jobs_by_handler("mail")
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(mail, vec![1, 2]);
        assert_eq!(service.get_job_by_name("c").await.unwrap().unwrap().id, 3);

        assert!(service.delete_job(1).await.unwrap());
        assert!(!service.delete_job(1).await.unwrap());
        assert!(service.delete_job_by_name("b").await.unwrap());
        assert!(!service.delete_job_by_name("b").await.unwrap());

        let remaining = service.get_all_jobs().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 3);
        assert!(store.load_by_id(2).await.unwrap().is_none());
        assert!(service.get_job(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stop_during_scan_is_not_overwritten() {
        let store = InMemoryJobStore::with_jobs(vec![JobBuilder::new(1)
            .fixed_interval(5)
            .with_next_fire_time(NOW + 2_000)
            .build()]);
        let gated = Arc::new(GatedJobStore::new(Arc::new(store.clone())));
        let config = SchedulerConfig::default();
        let clock = ManualClock::new(NOW);
        let dispatcher = RecordingDispatcher::new(Arc::new(clock.clone()));
        let lock: Arc<dyn JobLock> = Arc::new(LocalJobLock::new(SCAN_LOCK_NAME));
        let scanner = Arc::new(CoreScanner::new(
            &config,
            gated.clone(),
            Arc::clone(&lock),
            Arc::new(dispatcher.clone()),
            Arc::new(TimeRing::new()),
            Arc::new(clock.clone()),
        ));
        let control = Arc::new(JobControlService::new(
            &config,
            Arc::new(store.clone()),
            lock,
            Arc::new(dispatcher),
            Arc::new(clock),
        ));

        let scan = {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move { scanner.scan_once().await })
        };
        gated.wait_entered().await;

        let stop = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.stop_job(1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!stop.is_finished(), "stop must wait for the scan cycle");

        gated.release();
        let outcome = scan.await.unwrap().unwrap();
        assert_eq!(outcome.ringed, 1);
        stop.await.unwrap().unwrap();

        let job = store.load_by_id(1).await.unwrap().unwrap();
        assert_eq!(job.trigger_status, TriggerStatus::Disabled);
        assert_eq!(job.next_fire_time, 0);
    }
}
