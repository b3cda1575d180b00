use std::fmt;

use serde::{Deserialize, Serialize};

/// 触发类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    #[serde(rename = "CRON")]
    Cron,
    #[serde(rename = "MISFIRE")]
    Misfire,
    #[serde(rename = "MANUAL")]
    Manual,
    #[serde(rename = "API")]
    Api,
    #[serde(rename = "RETRY")]
    Retry,
    #[serde(rename = "PARENT")]
    Parent,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "CRON",
            Self::Misfire => "MISFIRE",
            Self::Manual => "MANUAL",
            Self::Api => "API",
            Self::Retry => "RETRY",
            Self::Parent => "PARENT",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次触发请求，不会被引擎持久化
///
/// `fail_retry_count` 为 -1 时使用任务自身的重试次数，
/// `executor_param` 为 `None` 时使用任务存储的参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub job_id: i64,
    pub trigger_type: TriggerType,
    pub fail_retry_count: i32,
    pub sharding_param: Option<String>,
    pub executor_param: Option<String>,
}

impl TriggerRequest {
    pub fn new(job_id: i64, trigger_type: TriggerType) -> Self {
        Self {
            job_id,
            trigger_type,
            fail_retry_count: -1,
            sharding_param: None,
            executor_param: None,
        }
    }

    /// 时间环或扫描线程发起的常规触发
    pub fn cron(job_id: i64) -> Self {
        Self::new(job_id, TriggerType::Cron)
    }

    /// 调度过期后的补偿触发
    pub fn misfire(job_id: i64) -> Self {
        Self::new(job_id, TriggerType::Misfire)
    }

    pub fn with_fail_retry_count(mut self, fail_retry_count: i32) -> Self {
        self.fail_retry_count = fail_retry_count;
        self
    }

    pub fn with_sharding_param(mut self, sharding_param: impl Into<String>) -> Self {
        self.sharding_param = Some(sharding_param.into());
        self
    }

    pub fn with_executor_param(mut self, executor_param: Option<String>) -> Self {
        self.executor_param = executor_param;
        self
    }
}
