pub mod dispatcher;
pub mod handler;
pub mod job_store;
pub mod lock;

pub use dispatcher::*;
pub use handler::*;
pub use job_store::*;
pub use lock::*;
