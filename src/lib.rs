//! 秒级精度的周期任务触发调度引擎
//!
//! 宿主进程提供任务存储、处理器注册表和调度锁，
//! 通过 [`SchedulerLifecycle`] 启停扫描线程、时间环分发线程和执行池。

pub mod app;
pub mod handlers;
pub mod seed;
pub mod shutdown;

pub use app::{LifecycleState, SchedulerContext, SchedulerLifecycle};
pub use handlers::{LogHandler, LOG_HANDLER};
pub use seed::seed_jobs;
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
