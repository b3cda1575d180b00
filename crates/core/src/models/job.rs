use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 任务定义
///
/// 由任务存储持久化，调度引擎只修改其中的触发信息
/// （`trigger_status`、`next_fire_time`、`last_fire_time`）。
///
/// # 字段说明
///
/// - `id`: 任务的唯一标识符
/// - `schedule_kind`: 调度类型（CRON / FIXED_INTERVAL / NONE）
/// - `schedule_expr`: cron 表达式或固定间隔秒数
/// - `trigger_status`: 触发状态，禁用的任务不会被扫描
/// - `next_fire_time`: 下次触发时间（epoch毫秒，0 表示没有）
/// - `last_fire_time`: 上次触发时间（epoch毫秒）
/// - `misfire_strategy`: 调度过期策略，缺省为 `DO_NOTHING`
/// - `handler`: 处理器标识
/// - `executor_param`: 执行参数，对引擎透明
/// - `fail_retry_count`: 默认失败重试次数
/// - `name` / `description`: 任务名称与描述，按名称注册的任务以名称为唯一键
///
/// # 使用示例
///
/// ```rust
/// use scheduler_core::models::{JobDefinition, ScheduleKind};
///
/// let job = JobDefinition::new(1, ScheduleKind::FixedInterval, "30", "log");
/// assert!(job.is_enabled());
/// assert_eq!(job.next_fire_time, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub schedule_kind: ScheduleKind,
    #[serde(default)]
    pub schedule_expr: String,
    #[serde(default)]
    pub trigger_status: TriggerStatus,
    #[serde(default)]
    pub next_fire_time: i64,
    #[serde(default)]
    pub last_fire_time: i64,
    #[serde(default)]
    pub misfire_strategy: Option<MisfireStrategy>,
    pub handler: String,
    #[serde(default)]
    pub executor_param: Option<String>,
    #[serde(default)]
    pub fail_retry_count: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl JobDefinition {
    pub fn new(
        id: i64,
        schedule_kind: ScheduleKind,
        schedule_expr: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: String::new(),
            schedule_kind,
            schedule_expr: schedule_expr.into(),
            trigger_status: TriggerStatus::Enabled,
            next_fire_time: 0,
            last_fire_time: 0,
            misfire_strategy: None,
            handler: handler.into(),
            executor_param: None,
            fail_retry_count: None,
            description: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.trigger_status == TriggerStatus::Enabled
    }

    /// 生效的过期策略，未配置时为 `DO_NOTHING`
    pub fn effective_misfire_strategy(&self) -> MisfireStrategy {
        self.misfire_strategy.unwrap_or_default()
    }

    /// 只复制触发信息（状态和触发时间），其余字段保持不变
    pub fn apply_trigger_info(&mut self, other: &JobDefinition) {
        self.trigger_status = other.trigger_status;
        self.next_fire_time = other.next_fire_time;
        self.last_fire_time = other.last_fire_time;
    }

    /// 禁用任务并清空触发时间
    pub fn disable(&mut self) {
        self.trigger_status = TriggerStatus::Disabled;
        self.next_fire_time = 0;
        self.last_fire_time = 0;
    }
}

/// 调度类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleKind {
    #[serde(rename = "CRON", alias = "cron")]
    Cron,
    #[serde(rename = "FIXED_INTERVAL", alias = "fixed", alias = "FIXED")]
    FixedInterval,
    #[serde(rename = "NONE", alias = "none")]
    None,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cron => "CRON",
            Self::FixedInterval => "FIXED_INTERVAL",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRON" => Ok(Self::Cron),
            "FIXED_INTERVAL" | "FIXED" => Ok(Self::FixedInterval),
            "NONE" => Ok(Self::None),
            other => Err(format!("未知的调度类型: {other}")),
        }
    }
}

/// 触发状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerStatus {
    #[serde(rename = "DISABLED")]
    Disabled = 0,
    #[default]
    #[serde(rename = "ENABLED")]
    Enabled = 1,
}

impl TriggerStatus {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// 调度过期策略
///
/// - `DoNothing`: 跳过本次执行，只刷新下次触发时间
/// - `FireOnceNow`: 立即补触发一次，再刷新下次触发时间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MisfireStrategy {
    #[default]
    #[serde(rename = "DO_NOTHING")]
    DoNothing,
    #[serde(rename = "FIRE_ONCE_NOW")]
    FireOnceNow,
}

impl MisfireStrategy {
    /// 按名称匹配策略，无法识别时返回默认值
    pub fn match_or(name: Option<&str>, default: Self) -> Self {
        name.and_then(|n| n.parse().ok()).unwrap_or(default)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoNothing => "DO_NOTHING",
            Self::FireOnceNow => "FIRE_ONCE_NOW",
        }
    }
}

impl FromStr for MisfireStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DO_NOTHING" => Ok(Self::DoNothing),
            "FIRE_ONCE_NOW" => Ok(Self::FireOnceNow),
            other => Err(format!("未知的过期策略: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_kind_parse() {
        assert_eq!("cron".parse::<ScheduleKind>().unwrap(), ScheduleKind::Cron);
        assert_eq!(
            "FIXED".parse::<ScheduleKind>().unwrap(),
            ScheduleKind::FixedInterval
        );
        assert!("hourly".parse::<ScheduleKind>().is_err());
    }

    #[test]
    fn test_misfire_strategy_match_or_default() {
        assert_eq!(
            MisfireStrategy::match_or(Some("fire_once_now"), MisfireStrategy::DoNothing),
            MisfireStrategy::FireOnceNow
        );
        assert_eq!(
            MisfireStrategy::match_or(Some("RETRY_LATER"), MisfireStrategy::DoNothing),
            MisfireStrategy::DoNothing
        );
        assert_eq!(
            MisfireStrategy::match_or(None, MisfireStrategy::DoNothing),
            MisfireStrategy::DoNothing
        );
    }

    #[test]
    fn test_disable_clears_fire_times() {
        let mut job = JobDefinition::new(3, ScheduleKind::Cron, "0 * * * * *", "log");
        job.next_fire_time = 1_000;
        job.last_fire_time = 500;

        job.disable();

        assert!(!job.is_enabled());
        assert_eq!(job.next_fire_time, 0);
        assert_eq!(job.last_fire_time, 0);
        assert_eq!(job.trigger_status.code(), 0);
    }

    #[test]
    fn test_apply_trigger_info_keeps_other_fields() {
        let mut stored = JobDefinition::new(5, ScheduleKind::FixedInterval, "5", "log");
        stored.executor_param = Some("new".to_string());

        let mut scanned = JobDefinition::new(5, ScheduleKind::FixedInterval, "5", "log");
        scanned.executor_param = Some("old".to_string());
        scanned.next_fire_time = 7_000;
        scanned.last_fire_time = 2_000;

        stored.apply_trigger_info(&scanned);

        assert_eq!(stored.next_fire_time, 7_000);
        assert_eq!(stored.last_fire_time, 2_000);
        assert_eq!(stored.executor_param.as_deref(), Some("new"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let job: JobDefinition = serde_json::from_str(
            r#"{"id": 9, "schedule_kind": "FIXED_INTERVAL", "schedule_expr": "5", "handler": "log"}"#,
        )
        .unwrap();

        assert!(job.is_enabled());
        assert_eq!(job.effective_misfire_strategy(), MisfireStrategy::DoNothing);
        assert_eq!(job.fail_retry_count, None);
    }
}
