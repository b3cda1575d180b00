//! 触发执行：自适应快慢池、慢执行统计与单次触发执行器

pub mod dispatch_pool;
pub mod handler_registry;
pub mod timeout_stats;
pub mod trigger_executor;
pub mod worker_pool;

pub use dispatch_pool::{DispatchPool, PoolKind};
pub use handler_registry::{DefaultHandlerRegistry, FnHandler};
pub use timeout_stats::TimeoutStats;
pub use trigger_executor::TriggerExecutor;
pub use worker_pool::{PoolTask, WorkerPool};
