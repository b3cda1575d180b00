use std::fmt;

use serde::{Deserialize, Serialize};

use super::TriggerType;

/// 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行日志
///
/// 每次分发的触发对应一条日志：调用处理器前以 `PENDING` 写入，
/// 处理器返回后只更新一次为 `SUCCESS` 或 `FAILURE`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// 由任务存储分配，写入前为 0
    pub id: i64,
    pub job_id: i64,
    pub handler: String,
    pub trigger_type: TriggerType,
    /// 触发时间（epoch毫秒）
    pub trigger_time: i64,
    pub executor_param: Option<String>,
    pub sharding_param: Option<String>,
    pub fail_retry_count: i32,
    pub status: ExecutionStatus,
    /// 处理耗时（毫秒）
    pub cost_ms: i64,
    pub message: Option<String>,
}

impl ExecutionLogEntry {
    pub fn pending(
        job_id: i64,
        handler: impl Into<String>,
        trigger_type: TriggerType,
        trigger_time: i64,
    ) -> Self {
        Self {
            id: 0,
            job_id,
            handler: handler.into(),
            trigger_type,
            trigger_time,
            executor_param: None,
            sharding_param: None,
            fail_retry_count: 0,
            status: ExecutionStatus::Pending,
            cost_ms: 0,
            message: None,
        }
    }

    pub fn succeed(&mut self, cost_ms: i64) {
        self.status = ExecutionStatus::Success;
        self.cost_ms = cost_ms;
        self.message = Some(format!("执行成功，耗时: {cost_ms}ms"));
    }

    pub fn fail(&mut self, cost_ms: i64, message: impl Into<String>) {
        self.status = ExecutionStatus::Failure;
        self.cost_ms = cost_ms;
        self.message = Some(message.into());
    }
}

/// 执行日志详情级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "DEBUG")]
    Debug,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERROR")]
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行日志详情
///
/// 处理器在一次执行过程中写入的明细行，通过 `log_id` 关联到 [`ExecutionLogEntry`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogDetail {
    /// 由任务存储分配，写入前为 0
    pub id: i64,
    pub log_id: i64,
    pub job_id: i64,
    pub level: LogLevel,
    pub content: String,
    /// 写入时间（epoch毫秒）
    pub time_ms: i64,
}
