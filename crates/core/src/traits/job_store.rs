use async_trait::async_trait;

use crate::{
    models::{ExecutionLogDetail, ExecutionLogEntry, JobDefinition},
    SchedulerResult,
};

/// 任务存储接口
///
/// 由宿主进程提供，调度引擎的扫描线程和执行线程会并发调用。
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 按ID加载任务
    async fn load_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>>;

    /// 按名称加载任务，同名时返回任意一条
    async fn load_by_name(&self, name: &str) -> SchedulerResult<Option<JobDefinition>>;

    /// 全部任务，按ID升序
    async fn query_all(&self) -> SchedulerResult<Vec<JobDefinition>>;

    /// 使用指定处理器的任务，按ID升序
    async fn query_by_handler(&self, handler: &str) -> SchedulerResult<Vec<JobDefinition>>;

    /// 查询待触发任务：启用状态、`next_fire_time <= before_epoch_ms`，按ID倒序，最多 `limit` 条
    async fn query_due(&self, before_epoch_ms: i64, limit: usize)
        -> SchedulerResult<Vec<JobDefinition>>;

    /// 新增任务，`id <= 0` 时由存储分配，返回任务ID
    async fn insert(&self, job: &JobDefinition) -> SchedulerResult<i64>;

    /// 整行更新任务
    async fn update(&self, job: &JobDefinition) -> SchedulerResult<()>;

    /// 删除任务，返回是否存在
    async fn delete(&self, id: i64) -> SchedulerResult<bool>;

    /// 批量写回触发信息（`trigger_status`、`next_fire_time`、`last_fire_time`）
    ///
    /// 其余字段保持存储中的值；任务已被删除时跳过。
    /// 默认实现逐条读取再写回，存储可覆盖为原子的字段级更新。
    async fn batch_update_trigger_info(&self, jobs: &[JobDefinition]) -> SchedulerResult<()> {
        for job in jobs {
            if let Some(mut stored) = self.load_by_id(job.id).await? {
                stored.apply_trigger_info(job);
                self.update(&stored).await?;
            }
        }
        Ok(())
    }

    /// 写入执行日志，返回日志ID
    async fn insert_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<i64>;

    /// 更新执行日志
    async fn update_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<()>;

    /// 写入执行日志详情，返回详情ID
    async fn insert_log_detail(&self, detail: &ExecutionLogDetail) -> SchedulerResult<i64>;
}
