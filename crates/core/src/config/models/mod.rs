pub mod app_config;
pub mod logging;
pub mod scheduler;

pub use app_config::AppConfig;
pub use logging::LoggingConfig;
pub use scheduler::SchedulerConfig;
