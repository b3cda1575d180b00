use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

/// 调度引擎参数
///
/// 所有字段都有默认值，配置文件中只需覆盖关心的项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 预读时间窗口（毫秒）
    pub pre_read_window_ms: i64,
    pub fast_pool_core_size: usize,
    pub fast_pool_max_size: usize,
    pub slow_pool_core_size: usize,
    pub slow_pool_max_size: usize,
    pub fast_queue_capacity: usize,
    pub slow_queue_capacity: usize,
    /// 单次执行超过该耗时（毫秒）记为一次慢执行
    pub slow_threshold_ms: u64,
    /// 一分钟内慢执行次数超过该值后路由到慢线程池
    pub slow_count_threshold: u32,
    pub default_fail_retry_count: i32,
    /// 停止时等待时间环清空的上限（毫秒）
    pub ring_drain_timeout_ms: u64,
    /// 停止扫描线程后留给在途触发的缓冲时间（毫秒）
    pub shutdown_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pre_read_window_ms: 5000,
            fast_pool_core_size: 10,
            fast_pool_max_size: 200,
            slow_pool_core_size: 10,
            slow_pool_max_size: 100,
            fast_queue_capacity: 1000,
            slow_queue_capacity: 2000,
            slow_threshold_ms: 500,
            slow_count_threshold: 10,
            default_fail_retry_count: 3,
            ring_drain_timeout_ms: 8000,
            shutdown_grace_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    /// 单次预读数量：线程池大小 * 触发qps（每次触发约50ms，qps = 20）
    pub fn pre_read_count(&self) -> usize {
        (self.fast_pool_max_size + self.slow_pool_max_size) * 20
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.pre_read_window_ms <= 0 {
            return Err(SchedulerError::Configuration(
                "预读时间窗口必须大于0".to_string(),
            ));
        }

        Self::validate_pool("fast", self.fast_pool_core_size, self.fast_pool_max_size)?;
        Self::validate_pool("slow", self.slow_pool_core_size, self.slow_pool_max_size)?;

        if self.fast_queue_capacity == 0 || self.slow_queue_capacity == 0 {
            return Err(SchedulerError::Configuration(
                "线程池队列容量必须大于0".to_string(),
            ));
        }

        if self.slow_threshold_ms == 0 {
            return Err(SchedulerError::Configuration(
                "慢执行阈值必须大于0".to_string(),
            ));
        }

        if self.slow_count_threshold == 0 {
            return Err(SchedulerError::Configuration(
                "慢执行次数阈值必须大于0".to_string(),
            ));
        }

        if self.default_fail_retry_count < 0 {
            return Err(SchedulerError::Configuration(
                "默认失败重试次数不能为负数".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_pool(name: &str, core: usize, max: usize) -> SchedulerResult<()> {
        if core == 0 {
            return Err(SchedulerError::Configuration(format!(
                "{name} 线程池核心大小必须大于0"
            )));
        }
        if max < core {
            return Err(SchedulerError::Configuration(format!(
                "{name} 线程池最大大小 {max} 不能小于核心大小 {core}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pre_read_window_ms, 5000);
        assert_eq!(config.pre_read_count(), 6000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pool_sizes() {
        let config = SchedulerConfig {
            fast_pool_core_size: 20,
            fast_pool_max_size: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SchedulerConfig {
            slow_pool_core_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_window() {
        let config = SchedulerConfig {
            pre_read_window_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::Configuration(_))
        ));
    }
}
