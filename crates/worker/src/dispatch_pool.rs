use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use scheduler_core::{
    models::TriggerRequest, traits::TriggerDispatcher, Clock, SchedulerConfig, SchedulerResult,
};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::{timeout_stats::TimeoutStats, trigger_executor::TriggerExecutor, worker_pool::WorkerPool};

/// 执行池类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Fast,
    Slow,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 自适应分发池
///
/// 默认把触发送往快池；同一任务在当前分钟内慢执行次数超过
/// `slow_count_threshold` 后，本分钟剩余时间改走慢池，
/// 避免个别慢任务拖住快池。
pub struct DispatchPool {
    fast: WorkerPool,
    slow: WorkerPool,
    executor: Arc<TriggerExecutor>,
    stats: Arc<TimeoutStats>,
    clock: Arc<dyn Clock>,
    slow_count_threshold: u32,
}

impl DispatchPool {
    pub fn new(
        config: &SchedulerConfig,
        executor: Arc<TriggerExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fast: WorkerPool::new(
                "fast-trigger-pool",
                config.fast_pool_core_size,
                config.fast_pool_max_size,
                config.fast_queue_capacity,
            ),
            slow: WorkerPool::new(
                "slow-trigger-pool",
                config.slow_pool_core_size,
                config.slow_pool_max_size,
                config.slow_queue_capacity,
            ),
            executor,
            stats: Arc::new(TimeoutStats::new(Duration::from_millis(
                config.slow_threshold_ms,
            ))),
            clock,
            slow_count_threshold: config.slow_count_threshold,
        }
    }

    pub fn start(&self) {
        self.fast.start();
        self.slow.start();
    }

    /// 计算任务当前应使用的执行池
    pub fn route(&self, job_id: i64) -> PoolKind {
        self.stats.roll_window(self.clock.now_millis());
        if self.stats.count(job_id) > self.slow_count_threshold {
            PoolKind::Slow
        } else {
            PoolKind::Fast
        }
    }

    /// 把触发请求投递到对应执行池，返回实际使用的池
    pub fn dispatch(&self, request: TriggerRequest) -> SchedulerResult<PoolKind> {
        let kind = self.route(request.job_id);
        let job_id = request.job_id;
        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);
        let clock = Arc::clone(&self.clock);

        let task = async move {
            let started = Instant::now();
            if let Err(e) = executor.trigger(&request).await {
                error!("任务 {} 触发执行异常: {}", request.job_id, e);
            }
            let cost = started.elapsed();
            if stats.record(request.job_id, cost, clock.now_millis()) {
                debug!(
                    "任务 {} 慢执行 {}ms，本分钟累计 {} 次",
                    request.job_id,
                    cost.as_millis(),
                    stats.count(request.job_id)
                );
            }
        }
        .boxed();

        let pool = match kind {
            PoolKind::Fast => &self.fast,
            PoolKind::Slow => &self.slow,
        };
        match pool.submit(job_id, task) {
            Ok(()) => {
                metrics::counter!("scheduler_trigger_dispatched_total", "pool" => kind.as_str())
                    .increment(1);
                Ok(kind)
            }
            Err(e) => {
                metrics::counter!("scheduler_trigger_rejected_total", "pool" => kind.as_str())
                    .increment(1);
                warn!("任务 {} 投递到{}池失败: {}", job_id, kind, e);
                Err(e)
            }
        }
    }

    /// 立即关闭两个执行池，执行中的任务被中止
    pub fn shutdown_now(&self) {
        self.fast.shutdown_now();
        self.slow.shutdown_now();
    }

    pub fn is_closed(&self) -> bool {
        self.fast.is_closed() && self.slow.is_closed()
    }

    pub fn timeout_stats(&self) -> &TimeoutStats {
        &self.stats
    }

    pub fn pool(&self, kind: PoolKind) -> &WorkerPool {
        match kind {
            PoolKind::Fast => &self.fast,
            PoolKind::Slow => &self.slow,
        }
    }
}

#[async_trait]
impl TriggerDispatcher for DispatchPool {
    async fn submit(&self, request: TriggerRequest) -> SchedulerResult<()> {
        self.dispatch(request).map(|_| ())
    }
}
