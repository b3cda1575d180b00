use std::future::Future;
use std::sync::Arc;

use scheduler_core::{
    models::{
        JobDefinition, MisfireStrategy, ScheduleKind, TriggerRequest, TriggerStatus, TriggerType,
    },
    traits::{JobLock, JobStore, TriggerDispatcher},
    Clock, SchedulerConfig, SchedulerError, SchedulerResult,
};
use tracing::{info, warn};

use crate::cron_utils::NextFireTimeCalculator;

/// 按名称注册的 CRON 任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRegistration {
    pub name: String,
    pub cron: String,
    pub handler: String,
    pub param: Option<String>,
    pub description: Option<String>,
    /// 注册后是否立即启用
    pub auto_start: bool,
}

impl JobRegistration {
    pub fn new(
        name: impl Into<String>,
        cron: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            handler: handler.into(),
            param: None,
            description: None,
            auto_start: false,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn auto_start(mut self) -> Self {
        self.auto_start = true;
        self
    }
}

/// 任务动态控制
///
/// 注册、创建、删除、启停任务，手动触发，修改调度表达式和执行参数。
/// 所有写操作都持有与扫描线程相同的调度锁，不会与进行中的扫描周期交错。
/// 启用或改期时下次触发时间从 `now + 预读窗口` 起算，避开正在进行的扫描周期。
pub struct JobControlService {
    store: Arc<dyn JobStore>,
    lock: Arc<dyn JobLock>,
    dispatcher: Arc<dyn TriggerDispatcher>,
    clock: Arc<dyn Clock>,
    calculator: NextFireTimeCalculator,
    pre_read_window_ms: i64,
    owner: String,
}

impl JobControlService {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn JobStore>,
        lock: Arc<dyn JobLock>,
        dispatcher: Arc<dyn TriggerDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            lock,
            dispatcher,
            clock,
            calculator: NextFireTimeCalculator::new(),
            pre_read_window_ms: config.pre_read_window_ms,
            owner: format!("job-control-{}", uuid::Uuid::new_v4()),
        }
    }

    /// 按名称注册或更新 CRON 任务，返回任务ID
    ///
    /// 同名任务存在时更新表达式、处理器、参数和描述；`auto_start` 只会启用停止中的任务，
    /// 不会停止已启用的任务。新建任务使用默认过期策略，失败重试次数为 0。
    pub async fn register_or_update_job(
        &self,
        registration: JobRegistration,
    ) -> SchedulerResult<i64> {
        NextFireTimeCalculator::validate(ScheduleKind::Cron, &registration.cron)?;

        self.locked(async {
            match self.store.load_by_name(&registration.name).await? {
                Some(mut job) => {
                    let reschedule = job.schedule_kind != ScheduleKind::Cron
                        || job.schedule_expr != registration.cron;
                    job.schedule_kind = ScheduleKind::Cron;
                    job.schedule_expr = registration.cron.clone();
                    job.handler = registration.handler.clone();
                    job.executor_param = registration.param.clone();
                    job.description = registration.description.clone();

                    if registration.auto_start && !job.is_enabled() {
                        self.enable(&mut job)?;
                    } else if job.is_enabled() && reschedule {
                        job.next_fire_time = self.first_fire_time(&job)?;
                    }
                    self.store.update(&job).await?;
                    info!("任务更新成功: jobId={}, jobName={}", job.id, job.name);
                    Ok(job.id)
                }
                None => {
                    let mut job = JobDefinition::new(
                        0,
                        ScheduleKind::Cron,
                        registration.cron.clone(),
                        registration.handler.clone(),
                    );
                    job.name = registration.name.clone();
                    job.executor_param = registration.param.clone();
                    job.description = registration.description.clone();
                    job.misfire_strategy = Some(MisfireStrategy::DoNothing);
                    job.fail_retry_count = Some(0);
                    job.disable();
                    if registration.auto_start {
                        self.enable(&mut job)?;
                    }

                    let id = self.store.insert(&job).await?;
                    info!("任务创建成功: jobId={}, jobName={}", id, job.name);
                    Ok(id)
                }
            }
        })
        .await
    }

    /// 新增任务，返回任务ID
    ///
    /// 新任务处于停止状态，需要调用 [`start_job`](Self::start_job) 启用。
    /// 未配置的过期策略和失败重试次数分别取 `DO_NOTHING` 和 0。
    pub async fn create_job(&self, mut job: JobDefinition) -> SchedulerResult<i64> {
        NextFireTimeCalculator::validate(job.schedule_kind, &job.schedule_expr)?;
        job.misfire_strategy = Some(job.effective_misfire_strategy());
        job.fail_retry_count = Some(job.fail_retry_count.unwrap_or(0));
        job.disable();

        self.locked(async {
            if !job.name.is_empty() && self.store.load_by_name(&job.name).await?.is_some() {
                return Err(SchedulerError::DuplicateJobName(job.name.clone()));
            }
            let id = self.store.insert(&job).await?;
            info!("任务创建成功: jobId={}, jobName={}", id, job.name);
            Ok(id)
        })
        .await
    }

    /// 停止并删除任务，任务不存在时返回 `false`
    pub async fn delete_job(&self, id: i64) -> SchedulerResult<bool> {
        self.locked(async {
            let Some(mut job) = self.store.load_by_id(id).await? else {
                warn!("删除任务时任务不存在: jobId={}", id);
                return Ok(false);
            };
            job.disable();
            self.store.update(&job).await?;
            let deleted = self.store.delete(id).await?;
            info!("任务已删除: jobId={}", id);
            Ok(deleted)
        })
        .await
    }

    /// 按名称删除任务，任务不存在时返回 `false`
    pub async fn delete_job_by_name(&self, name: &str) -> SchedulerResult<bool> {
        match self.store.load_by_name(name).await? {
            Some(job) => self.delete_job(job.id).await,
            None => Ok(false),
        }
    }

    pub async fn get_job(&self, id: i64) -> SchedulerResult<Option<JobDefinition>> {
        self.store.load_by_id(id).await
    }

    pub async fn get_job_by_name(&self, name: &str) -> SchedulerResult<Option<JobDefinition>> {
        self.store.load_by_name(name).await
    }

    pub async fn get_jobs_by_handler(&self, handler: &str) -> SchedulerResult<Vec<JobDefinition>> {
        self.store.query_by_handler(handler).await
    }

    pub async fn get_all_jobs(&self) -> SchedulerResult<Vec<JobDefinition>> {
        self.store.query_all().await
    }

    /// 启用任务并计算下次触发时间
    pub async fn start_job(&self, id: i64) -> SchedulerResult<JobDefinition> {
        self.locked(async {
            let mut job = self.load(id).await?;
            self.enable(&mut job)?;
            self.store.update(&job).await?;
            info!("任务 {} 已启用，下次触发时间 {}", id, job.next_fire_time);
            Ok(job)
        })
        .await
    }

    /// 停用任务并清空触发时间
    pub async fn stop_job(&self, id: i64) -> SchedulerResult<JobDefinition> {
        self.locked(async {
            let mut job = self.load(id).await?;
            job.disable();
            self.store.update(&job).await?;
            info!("任务 {} 已停用", id);
            Ok(job)
        })
        .await
    }

    /// 手动触发一次，`param` 只对本次触发生效
    pub async fn trigger_job(&self, id: i64, param: Option<String>) -> SchedulerResult<()> {
        self.load(id).await?;
        let request = TriggerRequest::new(id, TriggerType::Api).with_executor_param(param);
        self.dispatcher.submit(request).await?;
        info!("任务 {} 已手动触发", id);
        Ok(())
    }

    /// 修改调度类型和表达式，启用中的任务重新计算下次触发时间
    pub async fn update_schedule(
        &self,
        id: i64,
        kind: ScheduleKind,
        expr: &str,
    ) -> SchedulerResult<JobDefinition> {
        NextFireTimeCalculator::validate(kind, expr)?;

        self.locked(async {
            let mut job = self.load(id).await?;
            job.schedule_kind = kind;
            job.schedule_expr = expr.to_string();
            if job.is_enabled() {
                job.next_fire_time = self.first_fire_time(&job)?;
            }
            self.store.update(&job).await?;
            info!("任务 {} 调度已更新为 {} '{}'", id, kind, expr);
            Ok(job)
        })
        .await
    }

    /// 替换任务存储的执行参数
    pub async fn update_param(
        &self,
        id: i64,
        param: Option<String>,
    ) -> SchedulerResult<JobDefinition> {
        self.locked(async {
            let mut job = self.load(id).await?;
            job.executor_param = param;
            self.store.update(&job).await?;
            info!("任务 {} 执行参数已更新", id);
            Ok(job)
        })
        .await
    }

    /// 在调度锁内执行一次读改写
    async fn locked<T>(
        &self,
        operation: impl Future<Output = SchedulerResult<T>>,
    ) -> SchedulerResult<T> {
        self.lock.lock(&self.owner).await?;
        let result = operation.await;
        if let Err(e) = self.lock.unlock(&self.owner).await {
            warn!("释放调度锁 {} 失败: {}", self.lock.name(), e);
        }
        result
    }

    async fn load(&self, id: i64) -> SchedulerResult<JobDefinition> {
        self.store
            .load_by_id(id)
            .await?
            .ok_or(SchedulerError::JobNotFound { id })
    }

    fn enable(&self, job: &mut JobDefinition) -> SchedulerResult<()> {
        let next = self.first_fire_time(job)?;
        job.trigger_status = TriggerStatus::Enabled;
        job.last_fire_time = 0;
        job.next_fire_time = next;
        Ok(())
    }

    fn first_fire_time(&self, job: &JobDefinition) -> SchedulerResult<i64> {
        let from = self.clock.now_millis() + self.pre_read_window_ms;
        self.calculator.compute(job, from)?.ok_or_else(|| {
            SchedulerError::schedule_expression(
                job.schedule_kind.as_str(),
                &job.schedule_expr,
                "没有后续触发时间，无法启用",
            )
        })
    }
}
