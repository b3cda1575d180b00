use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scheduler_core::{models::TriggerRequest, traits::TriggerDispatcher, Clock, SchedulerConfig};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    pacing::{initial_delay_ms, sleep_or_shutdown},
    time_ring::TimeRing,
};

const DRAIN_POLL: Duration = Duration::from_millis(200);

/// 时间环分发线程
///
/// 每秒取出当前秒和前一秒槽位中的任务并提交到执行池。
/// 停止时先等待时间环排空（有上限），再结束循环。
pub struct RingDispatcher {
    ring: Arc<TimeRing>,
    dispatcher: Arc<dyn TriggerDispatcher>,
    clock: Arc<dyn Clock>,
    drain_timeout: Duration,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RingDispatcher {
    pub fn new(
        config: &SchedulerConfig,
        ring: Arc<TimeRing>,
        dispatcher: Arc<dyn TriggerDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            ring,
            dispatcher,
            clock,
            drain_timeout: Duration::from_millis(config.ring_drain_timeout_ms),
            running: AtomicBool::new(false),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn ring(&self) -> &Arc<TimeRing> {
        &self.ring
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let dispatcher = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { dispatcher.run_loop(shutdown_rx).await });
        *self.handle.lock().await = Some(handle);
        info!("时间环分发线程已启动");
    }

    /// 等待时间环排空后停止循环，超时后丢弃剩余任务
    ///
    /// 并发调用时只有一次会执行排空等待，其余调用等它结束后直接返回。
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if !self.is_running() {
            self.discard_leftovers();
            return;
        }

        let deadline = Instant::now() + self.drain_timeout;
        while !self.ring.is_empty() && Instant::now() < deadline {
            debug!("等待时间环排空，剩余 {} 个任务", self.ring.len());
            tokio::time::sleep(DRAIN_POLL).await;
        }

        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = handle.take() {
            if let Err(e) = handle.await {
                warn!("等待时间环分发线程退出时出错: {}", e);
            }
        }
        self.discard_leftovers();
        info!("时间环分发线程已停止");
    }

    /// 分发指定秒对应的两个槽位，返回分发的任务数
    pub async fn drain_once(&self, now_ms: i64) -> usize {
        let second = TimeRing::slot_for(now_ms);
        let job_ids = self.ring.drain(second);
        if job_ids.is_empty() {
            return 0;
        }

        debug!("时间环第 {} 秒取出任务: {:?}", second, job_ids);
        for &job_id in &job_ids {
            if let Err(e) = self.dispatcher.submit(TriggerRequest::cron(job_id)).await {
                error!("时间环分发任务 {} 失败: {}", job_id, e);
            }
        }
        job_ids.len()
    }

    async fn run_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        if sleep_or_shutdown(initial_delay_ms(self.clock.now_millis()), &mut shutdown_rx).await {
            return;
        }

        while self.is_running() {
            self.drain_once(self.clock.now_millis()).await;

            let delay = initial_delay_ms(self.clock.now_millis());
            if sleep_or_shutdown(delay, &mut shutdown_rx).await {
                break;
            }
        }
        debug!("时间环分发循环退出");
    }

    fn discard_leftovers(&self) {
        let discarded = self.ring.clear();
        if discarded > 0 {
            metrics::counter!("scheduler_ring_discarded_total").increment(discarded as u64);
            warn!("时间环停止时丢弃 {} 个未分发的任务", discarded);
        }
    }
}
