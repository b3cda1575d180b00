use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scheduler_core::{
    models::{ExecutionLogDetail, ExecutionLogEntry, JobDefinition},
    traits::JobStore,
    SchedulerError, SchedulerResult,
};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存任务存储
///
/// 适用于嵌入式单机运行和测试场景，任务、执行日志和日志详情都保存在进程内。
#[derive(Debug, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<i64, JobDefinition>>>,
    logs: Arc<RwLock<HashMap<i64, ExecutionLogEntry>>>,
    details: Arc<RwLock<Vec<ExecutionLogDetail>>>,
    next_log_id: Arc<AtomicI64>,
    next_detail_id: Arc<AtomicI64>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            logs: Arc::new(RwLock::new(HashMap::new())),
            details: Arc::new(RwLock::new(Vec::new())),
            next_log_id: Arc::new(AtomicI64::new(1)),
            next_detail_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn with_jobs(jobs: Vec<JobDefinition>) -> Self {
        let job_map = jobs.into_iter().map(|job| (job.id, job)).collect();
        Self {
            jobs: Arc::new(RwLock::new(job_map)),
            ..Self::new()
        }
    }

    /// 写入或覆盖任务定义
    pub async fn insert_job(&self, job: JobDefinition) {
        debug!("写入任务定义: jobId={}", job.id);
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn remove_job(&self, id: i64) -> Option<JobDefinition> {
        self.jobs.write().await.remove(&id)
    }

    pub async fn jobs(&self) -> Vec<JobDefinition> {
        Self::sorted(self.jobs.read().await.values().cloned().collect())
    }

    /// 全部执行日志，按日志ID升序
    pub async fn logs(&self) -> Vec<ExecutionLogEntry> {
        let mut logs: Vec<_> = self.logs.read().await.values().cloned().collect();
        logs.sort_by_key(|entry| entry.id);
        logs
    }

    pub async fn logs_for_job(&self, job_id: i64) -> Vec<ExecutionLogEntry> {
        self.logs()
            .await
            .into_iter()
            .filter(|entry| entry.job_id == job_id)
            .collect()
    }

    pub async fn log_by_id(&self, log_id: i64) -> Option<ExecutionLogEntry> {
        self.logs.read().await.get(&log_id).cloned()
    }

    /// 某条执行日志的详情，按写入顺序
    pub async fn log_details(&self, log_id: i64) -> Vec<ExecutionLogDetail> {
        self.details
            .read()
            .await
            .iter()
            .filter(|detail| detail.log_id == log_id)
            .cloned()
            .collect()
    }

    fn sorted(mut jobs: Vec<JobDefinition>) -> Vec<JobDefinition> {
        jobs.sort_by_key(|job| job.id);
        jobs
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn load_by_name(&self, name: &str) -> SchedulerResult<Option<JobDefinition>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.name == name)
            .min_by_key(|job| job.id)
            .cloned())
    }

    async fn query_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        Ok(self.jobs().await)
    }

    async fn query_by_handler(&self, handler: &str) -> SchedulerResult<Vec<JobDefinition>> {
        let jobs = self.jobs.read().await;
        Ok(Self::sorted(
            jobs.values()
                .filter(|job| job.handler == handler)
                .cloned()
                .collect(),
        ))
    }

    async fn query_due(
        &self,
        before_epoch_ms: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<JobDefinition>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<JobDefinition> = jobs
            .values()
            .filter(|job| job.is_enabled() && job.next_fire_time <= before_epoch_ms)
            .cloned()
            .collect();
        due.sort_by(|a, b| b.id.cmp(&a.id));
        due.truncate(limit);
        Ok(due)
    }

    async fn insert(&self, job: &JobDefinition) -> SchedulerResult<i64> {
        let mut jobs = self.jobs.write().await;
        let id = if job.id > 0 {
            job.id
        } else {
            jobs.keys().max().copied().unwrap_or(0) + 1
        };
        if jobs.contains_key(&id) {
            return Err(SchedulerError::Store(format!("任务已存在: {id}")));
        }

        let mut stored = job.clone();
        stored.id = id;
        jobs.insert(id, stored);
        debug!("新增任务: jobId={}", id);
        Ok(id)
    }

    async fn update(&self, job: &JobDefinition) -> SchedulerResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(SchedulerError::JobNotFound { id: job.id }),
        }
    }

    async fn delete(&self, id: i64) -> SchedulerResult<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }

    async fn batch_update_trigger_info(&self, jobs: &[JobDefinition]) -> SchedulerResult<()> {
        let mut stored_jobs = self.jobs.write().await;
        for job in jobs {
            if let Some(stored) = stored_jobs.get_mut(&job.id) {
                stored.apply_trigger_info(job);
            }
        }
        Ok(())
    }

    async fn insert_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<i64> {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.logs.write().await.insert(id, stored);
        Ok(id)
    }

    async fn update_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<()> {
        let mut logs = self.logs.write().await;
        match logs.get_mut(&entry.id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(SchedulerError::Store(format!(
                "执行日志不存在: {}",
                entry.id
            ))),
        }
    }

    async fn insert_log_detail(&self, detail: &ExecutionLogDetail) -> SchedulerResult<i64> {
        let id = self.next_detail_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = detail.clone();
        stored.id = id;
        self.details.write().await.push(stored);
        Ok(id)
    }
}
