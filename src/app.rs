use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scheduler_core::{
    traits::{HandlerRegistry, JobLock, JobStore},
    Clock, SchedulerConfig, SystemClock,
};
use scheduler_dispatcher::{
    CoreScanner, JobControlService, RingDispatcher, TimeRing, SCAN_LOCK_NAME,
};
use scheduler_infrastructure::LocalJobLock;
use scheduler_worker::{DispatchPool, TriggerExecutor};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

/// 调度实例的协作方
///
/// 启动时显式构造一次并传给生命周期，不使用进程级单例。
#[derive(Clone)]
pub struct SchedulerContext {
    pub config: SchedulerConfig,
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<dyn HandlerRegistry>,
    pub lock: Arc<dyn JobLock>,
    pub clock: Arc<dyn Clock>,
}

impl SchedulerContext {
    /// 使用本地调度锁和系统时钟
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        registry: Arc<dyn HandlerRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            lock: Arc::new(LocalJobLock::new(SCAN_LOCK_NAME)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn JobLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
}

/// 调度引擎生命周期
///
/// 启动顺序：时间环分发线程 → 扫描线程 → 执行池。
/// 停止顺序相反：停止扫描，等待在途分发落地，排空时间环，最后立即关闭执行池。
pub struct SchedulerLifecycle {
    context: SchedulerContext,
    ring: Arc<TimeRing>,
    pool: Arc<DispatchPool>,
    scanner: Arc<CoreScanner>,
    ring_dispatcher: Arc<RingDispatcher>,
    control: JobControlService,
    state: Mutex<LifecycleState>,
}

impl SchedulerLifecycle {
    pub fn new(context: SchedulerContext) -> Result<Self> {
        context.config.validate().context("调度配置无效")?;
        let config = &context.config;

        let executor = Arc::new(TriggerExecutor::new(
            Arc::clone(&context.store),
            Arc::clone(&context.registry),
            Arc::clone(&context.clock),
            config.default_fail_retry_count,
        ));
        let pool = Arc::new(DispatchPool::new(config, executor, Arc::clone(&context.clock)));
        let ring = Arc::new(TimeRing::new());

        let scanner = Arc::new(CoreScanner::new(
            config,
            Arc::clone(&context.store),
            Arc::clone(&context.lock),
            pool.clone(),
            Arc::clone(&ring),
            Arc::clone(&context.clock),
        ));
        let ring_dispatcher = Arc::new(RingDispatcher::new(
            config,
            Arc::clone(&ring),
            pool.clone(),
            Arc::clone(&context.clock),
        ));
        let control = JobControlService::new(
            config,
            Arc::clone(&context.store),
            Arc::clone(&context.lock),
            pool.clone(),
            Arc::clone(&context.clock),
        );

        Ok(Self {
            context,
            ring,
            pool,
            scanner,
            ring_dispatcher,
            control,
            state: Mutex::new(LifecycleState::Created),
        })
    }

    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Created {
            return Err(anyhow::anyhow!("调度引擎无法从 {:?} 状态启动", *state));
        }

        info!("启动调度引擎");
        self.ring_dispatcher.start().await;
        self.scanner.start().await;
        self.pool.start();

        *state = LifecycleState::Running;
        info!("调度引擎已启动");
        Ok(())
    }

    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Running {
            warn!("调度引擎未在运行，忽略停止请求: {:?}", *state);
            return;
        }

        info!("开始停止调度引擎");
        self.scanner.stop().await;
        tokio::time::sleep(Duration::from_millis(self.context.config.shutdown_grace_ms)).await;
        self.ring_dispatcher.stop().await;
        self.pool.shutdown_now();

        *state = LifecycleState::Stopped;
        info!("调度引擎已停止");
    }

    /// 启动后一直运行到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.start().await?;
        let _ = shutdown_rx.recv().await;
        info!("调度引擎收到关闭信号");
        self.stop().await;
        Ok(())
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    pub fn control(&self) -> &JobControlService {
        &self.control
    }

    pub fn dispatch_pool(&self) -> &Arc<DispatchPool> {
        &self.pool
    }

    pub fn time_ring(&self) -> &Arc<TimeRing> {
        &self.ring
    }

    pub fn scanner(&self) -> &Arc<CoreScanner> {
        &self.scanner
    }

    pub fn context(&self) -> &SchedulerContext {
        &self.context
    }
}
