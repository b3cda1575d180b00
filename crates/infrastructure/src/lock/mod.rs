pub mod local_lock;

pub use local_lock::LocalJobLock;
