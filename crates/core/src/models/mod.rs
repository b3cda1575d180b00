pub mod job;
pub mod job_log;
pub mod trigger;

pub use job::*;
pub use job_log::*;
pub use trigger::*;
