//! 内置任务处理器

use async_trait::async_trait;
use scheduler_core::{
    traits::{JobContext, JobHandler},
    SchedulerResult,
};
use tracing::info;

/// 内置处理器标识
pub const LOG_HANDLER: &str = "log";

/// 把执行参数写入日志的处理器，用于演示和连通性检查
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[async_trait]
impl JobHandler for LogHandler {
    async fn execute(&self, context: &JobContext) -> SchedulerResult<()> {
        info!(
            job_id = context.job_id,
            log_id = context.log_id,
            trigger_type = %context.trigger_type,
            "任务执行: 参数={}",
            context.param.as_deref().unwrap_or("")
        );
        context
            .details
            .info(format!("参数: {}", context.param.as_deref().unwrap_or("")));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scheduler_core::{models::TriggerType, traits::JobLogSink, SystemClock};

    #[tokio::test]
    async fn test_log_handler_succeeds() {
        let context = JobContext {
            job_id: 1,
            log_id: 2,
            trigger_type: TriggerType::Cron,
            param: None,
            sharding_param: None,
            fail_retry_count: 3,
            details: JobLogSink::new(1, 2, Arc::new(SystemClock)),
        };
        assert!(LogHandler.execute(&context).await.is_ok());
        assert_eq!(context.details.lines()[0].content, "参数: ");
    }
}
