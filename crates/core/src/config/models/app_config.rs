use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{logging::LoggingConfig, scheduler::SchedulerConfig};
use crate::models::JobDefinition;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    /// 启动时写入任务存储的任务定义
    pub jobs: Vec<JobDefinition>,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/scheduler.toml", "scheduler.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEDULER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.logging.validate()?;

        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.id) {
                return Err(anyhow::anyhow!("任务ID重复: {}", job.id));
            }
            if job.handler.trim().is_empty() {
                return Err(anyhow::anyhow!("任务 {} 的处理器标识不能为空", job.id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::models::{MisfireStrategy, ScheduleKind};

    const SAMPLE: &str = r#"
[scheduler]
pre_read_window_ms = 3000
fast_pool_max_size = 50

[logging]
level = "debug"
format = "json"

[[jobs]]
id = 1
name = "heartbeat"
schedule_kind = "FIXED_INTERVAL"
schedule_expr = "10"
handler = "log"
misfire_strategy = "FIRE_ONCE_NOW"

[[jobs]]
id = 2
schedule_kind = "CRON"
schedule_expr = "0 */5 * * * *"
handler = "log"
executor_param = "report"
"#;

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.scheduler.pre_read_window_ms, 3000);
        assert_eq!(config.scheduler.fast_pool_max_size, 50);
        assert_eq!(config.scheduler.slow_pool_max_size, 100);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.jobs[0].schedule_kind, ScheduleKind::FixedInterval);
        assert_eq!(
            config.jobs[0].misfire_strategy,
            Some(MisfireStrategy::FireOnceNow)
        );
        assert_eq!(config.jobs[1].executor_param.as_deref(), Some("report"));
    }

    #[test]
    fn test_duplicate_job_ids_rejected() {
        let toml = r#"
[[jobs]]
id = 1
schedule_kind = "NONE"
handler = "log"

[[jobs]]
id = 1
schedule_kind = "NONE"
handler = "log"
"#;
        assert!(AppConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.scheduler.pre_read_window_ms, 3000);
        assert_eq!(config.jobs.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/scheduler.toml")).is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_defaults() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.scheduler, config.scheduler);
    }
}
