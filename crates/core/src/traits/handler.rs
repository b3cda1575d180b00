use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    clock::Clock,
    models::{ExecutionLogDetail, LogLevel, TriggerType},
    SchedulerResult,
};

/// 任务执行上下文
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: i64,
    pub log_id: i64,
    pub trigger_type: TriggerType,
    /// 本次生效的执行参数
    pub param: Option<String>,
    pub sharding_param: Option<String>,
    /// 本次生效的失败重试次数，引擎只记录不重驱
    pub fail_retry_count: i32,
    /// 本次执行的详细日志
    pub details: JobLogSink,
}

/// 执行详细日志收集器
///
/// 处理器执行期间追加明细行，执行结束后由执行器统一写入任务存储。
/// 处理器返回错误或panic时，已追加的行同样会被保存。
#[derive(Clone)]
pub struct JobLogSink {
    job_id: i64,
    log_id: i64,
    clock: Arc<dyn Clock>,
    lines: Arc<Mutex<Vec<ExecutionLogDetail>>>,
}

impl JobLogSink {
    pub fn new(job_id: i64, log_id: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            job_id,
            log_id,
            clock,
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self, level: LogLevel, content: impl Into<String>) {
        let detail = ExecutionLogDetail {
            id: 0,
            log_id: self.log_id,
            job_id: self.job_id,
            level,
            content: content.into(),
            time_ms: self.clock.now_millis(),
        };
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(detail);
    }

    pub fn debug(&self, content: impl Into<String>) {
        self.log(LogLevel::Debug, content);
    }

    pub fn info(&self, content: impl Into<String>) {
        self.log(LogLevel::Info, content);
    }

    pub fn warn(&self, content: impl Into<String>) {
        self.log(LogLevel::Warn, content);
    }

    pub fn error(&self, content: impl Into<String>) {
        self.log(LogLevel::Error, content);
    }

    /// 已追加的明细行
    pub fn lines(&self) -> Vec<ExecutionLogDetail> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 取出并清空已追加的明细行
    pub fn take(&self) -> Vec<ExecutionLogDetail> {
        std::mem::take(
            &mut *self
                .lines
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl fmt::Debug for JobLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLogSink")
            .field("job_id", &self.job_id)
            .field("log_id", &self.log_id)
            .field("lines", &self.lines().len())
            .finish()
    }
}

/// 任务处理器接口
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 执行任务，返回错误即视为执行失败
    async fn execute(&self, context: &JobContext) -> SchedulerResult<()>;
}

/// 处理器注册表接口
#[async_trait]
pub trait HandlerRegistry: Send + Sync {
    /// 按标识查找处理器
    async fn resolve(&self, identifier: &str) -> Option<Arc<dyn JobHandler>>;

    /// 已注册的处理器标识
    async fn identifiers(&self) -> Vec<String>;
}
