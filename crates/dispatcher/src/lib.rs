//! 触发调度：扫描线程、秒级时间环与任务动态控制

pub mod cron_utils;
pub mod job_control;
pub mod pacing;
pub mod ring_dispatcher;
pub mod scanner;
pub mod time_ring;

pub use cron_utils::NextFireTimeCalculator;
pub use job_control::{JobControlService, JobRegistration};
pub use ring_dispatcher::RingDispatcher;
pub use scanner::{classify, Classification, CoreScanner, ScanOutcome, SCAN_LOCK_NAME};
pub use time_ring::{TimeRing, RING_SLOTS};
