//! 调度引擎核心：模型、协作方接口、错误类型与配置

pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use clock::{Clock, SystemClock};
pub use config::{AppConfig, LoggingConfig, SchedulerConfig};
pub use errors::*;
pub use models::{
    ExecutionLogDetail, ExecutionLogEntry, ExecutionStatus, JobDefinition, LogLevel,
    MisfireStrategy, ScheduleKind, TriggerRequest, TriggerStatus, TriggerType,
};
pub use traits::{
    HandlerRegistry, JobContext, JobHandler, JobLock, JobLogSink, JobStore, TriggerDispatcher,
};
