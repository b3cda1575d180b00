use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use scheduler_core::{
    models::{ExecutionLogEntry, JobDefinition, TriggerRequest},
    traits::{HandlerRegistry, JobContext, JobLogSink, JobStore},
    Clock, SchedulerResult,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::worker_pool::panic_message;

/// 单次触发执行器
///
/// 在执行线程上运行：重新加载任务，合并请求中的覆盖参数，
/// 写入 `PENDING` 日志，调用处理器，最后把结果写回日志。
pub struct TriggerExecutor {
    store: Arc<dyn JobStore>,
    registry: Arc<dyn HandlerRegistry>,
    clock: Arc<dyn Clock>,
    default_fail_retry_count: i32,
}

impl TriggerExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<dyn HandlerRegistry>,
        clock: Arc<dyn Clock>,
        default_fail_retry_count: i32,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            default_fail_retry_count,
        }
    }

    /// 执行一次触发
    ///
    /// 任务已不存在时返回 `Ok(None)`，不写日志。
    /// 处理器缺失、返回错误或发生panic都记为 `FAILURE`，不向调用方传播。
    pub async fn trigger(
        &self,
        request: &TriggerRequest,
    ) -> SchedulerResult<Option<ExecutionLogEntry>> {
        let Some(job) = self.store.load_by_id(request.job_id).await? else {
            warn!("触发任务时任务已不存在，忽略本次触发: job_id={}", request.job_id);
            return Ok(None);
        };

        let mut entry = self.prepare_log(&job, request);
        entry.id = self.store.insert_log(&entry).await?;

        let Some(handler) = self.registry.resolve(&job.handler).await else {
            warn!(
                "任务 {} 的处理器 {} 未注册，本次触发记为失败",
                job.id, job.handler
            );
            entry.fail(0, format!("handler not found: {}", job.handler));
            self.finish(&entry).await?;
            return Ok(Some(entry));
        };

        let context = JobContext {
            job_id: job.id,
            log_id: entry.id,
            trigger_type: request.trigger_type,
            param: entry.executor_param.clone(),
            sharding_param: entry.sharding_param.clone(),
            fail_retry_count: entry.fail_retry_count,
            details: JobLogSink::new(job.id, entry.id, Arc::clone(&self.clock)),
        };

        debug!(
            "开始执行任务 {} (处理器: {}, 触发类型: {})",
            job.id, job.handler, request.trigger_type
        );
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.execute(&context))
            .catch_unwind()
            .await;
        let cost_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(Ok(())) => {
                entry.succeed(cost_ms);
                info!("任务 {} 执行成功，耗时: {}ms", job.id, cost_ms);
            }
            Ok(Err(e)) => {
                entry.fail(cost_ms, e.to_string());
                error!("任务 {} 执行失败: {}", job.id, e);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                entry.fail(cost_ms, format!("handler panicked: {message}"));
                error!("任务 {} 执行时发生panic: {}", job.id, message);
            }
        }

        self.save_details(&context.details).await;
        self.finish(&entry).await?;
        Ok(Some(entry))
    }

    /// 写入处理器追加的详细日志，单条失败不影响执行结果
    async fn save_details(&self, details: &JobLogSink) {
        for detail in details.take() {
            if let Err(e) = self.store.insert_log_detail(&detail).await {
                warn!("写入执行日志详情失败: log_id={}, {}", detail.log_id, e);
            }
        }
    }

    fn prepare_log(&self, job: &JobDefinition, request: &TriggerRequest) -> ExecutionLogEntry {
        let mut entry = ExecutionLogEntry::pending(
            job.id,
            job.handler.clone(),
            request.trigger_type,
            self.clock.now_millis(),
        );
        entry.executor_param = request
            .executor_param
            .clone()
            .or_else(|| job.executor_param.clone());
        entry.sharding_param = request.sharding_param.clone();
        entry.fail_retry_count = if request.fail_retry_count >= 0 {
            request.fail_retry_count
        } else {
            job.fail_retry_count.unwrap_or(self.default_fail_retry_count)
        };
        entry
    }

    async fn finish(&self, entry: &ExecutionLogEntry) -> SchedulerResult<()> {
        metrics::counter!(
            "scheduler_trigger_executions_total",
            "status" => entry.status.as_str()
        )
        .increment(1);
        self.store.update_log(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_registry::DefaultHandlerRegistry;
    use scheduler_core::{
        models::{ExecutionStatus, LogLevel, ScheduleKind, TriggerType},
        SchedulerError, SystemClock,
    };
    use scheduler_infrastructure::InMemoryJobStore;
    use scheduler_testing_utils::PanickingHandler;

    async fn setup(job: JobDefinition) -> (InMemoryJobStore, DefaultHandlerRegistry, TriggerExecutor) {
        let store = InMemoryJobStore::with_jobs(vec![job]);
        let registry = DefaultHandlerRegistry::new();
        let executor = TriggerExecutor::new(
            Arc::new(store.clone()),
            Arc::new(registry.clone()),
            Arc::new(SystemClock),
            3,
        );
        (store, registry, executor)
    }

    fn job(id: i64, handler: &str) -> JobDefinition {
        let mut job = JobDefinition::new(id, ScheduleKind::FixedInterval, "5", handler);
        job.executor_param = Some("stored".to_string());
        job
    }

    #[tokio::test]
    async fn test_success_updates_log_once() {
        let (store, registry, executor) = setup(job(1, "ok")).await;
        registry.register_fn("ok", |_| async { Ok(()) }).await;

        let entry = executor
            .trigger(&TriggerRequest::cron(1))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.status, ExecutionStatus::Success);
        assert!(entry.message.unwrap().starts_with("执行成功"));
        let logs = store.logs_for_job(1).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, ExecutionStatus::Success);
        assert_eq!(logs[0].trigger_type, TriggerType::Cron);
    }

    #[tokio::test]
    async fn test_request_overrides_param_and_retry() {
        let (store, registry, executor) = setup(job(2, "echo")).await;
        registry
            .register_fn("echo", |ctx: JobContext| async move {
                assert_eq!(ctx.param.as_deref(), Some("override"));
                assert_eq!(ctx.fail_retry_count, 0);
                Ok(())
            })
            .await;

        let request = TriggerRequest::new(2, TriggerType::Api)
            .with_executor_param(Some("override".to_string()))
            .with_fail_retry_count(0);
        executor.trigger(&request).await.unwrap();

        let log = &store.logs_for_job(2).await[0];
        assert_eq!(log.executor_param.as_deref(), Some("override"));
        assert_eq!(log.fail_retry_count, 0);
        assert_eq!(log.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_retry_count_falls_back_to_job_then_default() {
        let mut with_retry = job(3, "ok");
        with_retry.fail_retry_count = Some(5);
        let (store, registry, executor) = setup(with_retry).await;
        store.insert_job(job(4, "ok")).await;
        registry.register_fn("ok", |_| async { Ok(()) }).await;

        executor.trigger(&TriggerRequest::cron(3)).await.unwrap();
        executor.trigger(&TriggerRequest::cron(4)).await.unwrap();

        assert_eq!(store.logs_for_job(3).await[0].fail_retry_count, 5);
        assert_eq!(store.logs_for_job(4).await[0].fail_retry_count, 3);
        assert_eq!(
            store.logs_for_job(4).await[0].executor_param.as_deref(),
            Some("stored")
        );
    }

    #[tokio::test]
    async fn test_missing_handler_recorded_as_failure() {
        let (store, _registry, executor) = setup(job(5, "ghost")).await;

        let entry = executor
            .trigger(&TriggerRequest::cron(5))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.status, ExecutionStatus::Failure);
        assert_eq!(entry.message.as_deref(), Some("handler not found: ghost"));
        assert_eq!(store.logs_for_job(5).await[0].status, ExecutionStatus::Failure);
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_recorded_as_failure() {
        let (store, registry, executor) = setup(job(6, "err")).await;
        store.insert_job(job(7, "panic")).await;
        registry
            .register_fn("err", |_| async {
                Err(SchedulerError::HandlerExecution("下游不可用".to_string()))
            })
            .await;
        registry
            .register("panic", Arc::new(PanickingHandler("handler exploded")))
            .await;

        let failed = executor
            .trigger(&TriggerRequest::cron(6))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, ExecutionStatus::Failure);
        assert!(failed.message.unwrap().contains("下游不可用"));

        let panicked = executor
            .trigger(&TriggerRequest::cron(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(panicked.status, ExecutionStatus::Failure);
        assert!(panicked.message.unwrap().contains("handler exploded"));
        assert_eq!(store.logs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_job_is_skipped() {
        let (store, _registry, executor) = setup(job(8, "ok")).await;
        store.remove_job(8).await;

        let result = executor.trigger(&TriggerRequest::cron(8)).await.unwrap();
        assert!(result.is_none());
        assert!(store.logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_details_linked_to_log() {
        let (store, registry, executor) = setup(job(9, "report")).await;
        registry
            .register_fn("report", |ctx: JobContext| async move {
                ctx.details.info("读取 3 条记录");
                ctx.details.error("第 2 条记录格式错误");
                Err(SchedulerError::HandlerExecution("部分失败".to_string()))
            })
            .await;

        let entry = executor
            .trigger(&TriggerRequest::cron(9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, ExecutionStatus::Failure);

        let details = store.log_details(entry.id).await;
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].level, LogLevel::Info);
        assert_eq!(details[0].content, "读取 3 条记录");
        assert_eq!(details[1].level, LogLevel::Error);
        assert!(details.iter().all(|d| d.job_id == 9 && d.id > 0));
    }
}
