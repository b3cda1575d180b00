use async_trait::async_trait;

use crate::{models::TriggerRequest, SchedulerResult};

/// 触发分发接口
///
/// 扫描线程和时间环通过它把触发请求交给执行线程池。
#[async_trait]
pub trait TriggerDispatcher: Send + Sync {
    async fn submit(&self, request: TriggerRequest) -> SchedulerResult<()>;
}
