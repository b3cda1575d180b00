use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效的调度表达式: {kind} '{expr}' - {message}")]
    ScheduleExpression {
        kind: String,
        expr: String,
        message: String,
    },

    #[error("任务处理器未找到: {0}")]
    HandlerNotFound(String),

    #[error("任务处理器执行失败: {0}")]
    HandlerExecution(String),

    #[error("任务存储错误: {0}")]
    Store(String),

    #[error("获取任务锁失败: {0}")]
    LockAcquisition(String),

    #[error("任务未找到: {id}")]
    JobNotFound { id: i64 },

    #[error("任务名称已存在: {0}")]
    DuplicateJobName(String),

    #[error("线程池 {pool} 已满，拒绝任务 {job_id}")]
    PoolRejected { pool: String, job_id: i64 },

    #[error("线程池已关闭: {0}")]
    PoolClosed(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn schedule_expression(
        kind: impl Into<String>,
        expr: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ScheduleExpression {
            kind: kind.into(),
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// 错误是否只影响单个任务，不应中断整个扫描周期
    pub fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            Self::ScheduleExpression { .. }
                | Self::HandlerNotFound(_)
                | Self::HandlerExecution(_)
                | Self::JobNotFound { .. }
                | Self::PoolRejected { .. }
        )
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
