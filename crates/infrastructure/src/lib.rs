//! 调度引擎的进程内协作方实现：内存任务存储与本地调度锁

pub mod lock;
pub mod store;

pub use lock::LocalJobLock;
pub use store::InMemoryJobStore;
