use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scheduler_core::{
    models::{JobDefinition, MisfireStrategy, TriggerRequest},
    traits::{JobLock, JobStore, TriggerDispatcher},
    Clock, SchedulerConfig, SchedulerResult,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    cron_utils::NextFireTimeCalculator,
    pacing::{initial_delay_ms, next_cycle_delay_ms, sleep_or_shutdown},
    time_ring::TimeRing,
};

/// 调度锁名称
pub const SCAN_LOCK_NAME: &str = "job";

/// 预读任务的分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 过期超过预读窗口，按过期策略处理
    Misfire,
    /// 已到期但仍在容忍范围内，立即分发
    Immediate,
    /// 本窗口内稍后到期，放入时间环
    Ring,
}

/// 按 `offset = now - next_fire_time` 分类
pub fn classify(now_ms: i64, next_fire_time: i64, window_ms: i64) -> Classification {
    let offset = now_ms - next_fire_time;
    if offset > window_ms {
        Classification::Misfire
    } else if offset > 0 {
        Classification::Immediate
    } else {
        Classification::Ring
    }
}

/// 单次扫描统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    pub pre_read: usize,
    pub misfired: usize,
    pub immediate: usize,
    pub ringed: usize,
    pub disabled: usize,
}

/// 扫描线程
///
/// 每秒在调度锁保护下预读即将到期的任务，按偏移量分类后分发或放入时间环，
/// 重新计算下次触发时间，只把触发信息批量写回任务存储。
pub struct CoreScanner {
    store: Arc<dyn JobStore>,
    lock: Arc<dyn JobLock>,
    dispatcher: Arc<dyn TriggerDispatcher>,
    ring: Arc<TimeRing>,
    clock: Arc<dyn Clock>,
    calculator: NextFireTimeCalculator,
    pre_read_window_ms: i64,
    pre_read_count: usize,
    owner: String,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CoreScanner {
    pub fn new(
        config: &SchedulerConfig,
        store: Arc<dyn JobStore>,
        lock: Arc<dyn JobLock>,
        dispatcher: Arc<dyn TriggerDispatcher>,
        ring: Arc<TimeRing>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            lock,
            dispatcher,
            ring,
            clock,
            calculator: NextFireTimeCalculator::new(),
            pre_read_window_ms: config.pre_read_window_ms,
            pre_read_count: config.pre_read_count(),
            owner: format!("scanner-{}", uuid::Uuid::new_v4()),
            running: AtomicBool::new(false),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动扫描循环，重复调用无效
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scanner = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { scanner.run_loop(shutdown_rx).await });
        *self.handle.lock().await = Some(handle);
        info!("扫描线程已启动，预读窗口 {}ms，预读数量 {}", self.pre_read_window_ms, self.pre_read_count);
    }

    /// 请求停止并等待循环退出
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("等待扫描线程退出时出错: {}", e);
            }
        }
        info!("扫描线程已停止");
    }

    async fn run_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        if sleep_or_shutdown(initial_delay_ms(self.clock.now_millis()), &mut shutdown_rx).await {
            return;
        }

        while self.is_running() {
            let started = Instant::now();
            let pre_read_ok = match self.scan_once().await {
                Ok(outcome) => outcome.pre_read > 0,
                Err(e) => {
                    if !self.is_running() {
                        break;
                    }
                    error!("扫描周期失败，下一秒重试: {}", e);
                    true
                }
            };

            let cost_ms = started.elapsed().as_millis() as i64;
            let delay = next_cycle_delay_ms(
                cost_ms,
                pre_read_ok,
                self.clock.now_millis(),
                self.pre_read_window_ms,
            );
            if sleep_or_shutdown(delay, &mut shutdown_rx).await {
                break;
            }
        }
        debug!("扫描循环退出");
    }

    /// 执行一个完整的扫描周期：加锁、预读、分类、写回、解锁
    pub async fn scan_once(&self) -> SchedulerResult<ScanOutcome> {
        self.lock.lock(&self.owner).await?;
        // 等锁期间时间会推进，当前时间只能在持锁后读取
        let now = self.clock.now_millis();
        let result = self
            .scan_locked(now)
            .instrument(info_span!("scan_cycle", now))
            .await;
        if let Err(e) = self.lock.unlock(&self.owner).await {
            warn!("释放调度锁 {} 失败: {}", self.lock.name(), e);
        }
        result
    }

    async fn scan_locked(&self, now: i64) -> SchedulerResult<ScanOutcome> {
        let jobs = self
            .store
            .query_due(now + self.pre_read_window_ms, self.pre_read_count)
            .await?;
        let mut outcome = ScanOutcome {
            pre_read: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return Ok(outcome);
        }

        let mut updated = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            self.process_job(&mut job, now, &mut outcome).await;
            updated.push(job);
        }

        self.store.batch_update_trigger_info(&updated).await?;
        debug!(
            "扫描完成: 预读 {}，过期 {}，立即触发 {}，入环 {}，禁用 {}",
            outcome.pre_read, outcome.misfired, outcome.immediate, outcome.ringed, outcome.disabled
        );
        Ok(outcome)
    }

    async fn process_job(&self, job: &mut JobDefinition, now: i64, outcome: &mut ScanOutcome) {
        match classify(now, job.next_fire_time, self.pre_read_window_ms) {
            Classification::Misfire => {
                outcome.misfired += 1;
                metrics::counter!("scheduler_misfires_total").increment(1);
                warn!(
                    "任务 {} 调度过期，计划触发时间 {}，当前 {}",
                    job.id, job.next_fire_time, now
                );

                let Some(next) = self.compute_or_disable(job, now, outcome) else {
                    return;
                };
                if job.effective_misfire_strategy() == MisfireStrategy::FireOnceNow {
                    self.submit(TriggerRequest::misfire(job.id)).await;
                    info!("任务 {} 按过期策略立即补偿触发一次", job.id);
                }
                self.apply_next(job, next, outcome);
            }
            Classification::Immediate => {
                outcome.immediate += 1;
                let Some(next) = self.compute_or_disable(job, now, outcome) else {
                    return;
                };
                // 没有后续触发时间时本次仍然分发，之后由 apply_next 禁用任务
                self.submit(TriggerRequest::cron(job.id)).await;
                self.apply_next(job, next, outcome);

                // 下次触发仍在窗口内则直接入环，避免高频任务漏掉
                if job.is_enabled() && now + self.pre_read_window_ms > job.next_fire_time {
                    let from = job.next_fire_time;
                    let Some(next) = self.compute_or_disable(job, from, outcome) else {
                        return;
                    };
                    self.push_ring(job, outcome);
                    self.apply_next(job, next, outcome);
                }
            }
            Classification::Ring => {
                let from = job.next_fire_time;
                let Some(next) = self.compute_or_disable(job, from, outcome) else {
                    return;
                };
                self.push_ring(job, outcome);
                self.apply_next(job, next, outcome);
            }
        }
    }

    /// 计算下次触发时间，表达式无效时禁用任务并返回 `None`
    fn compute_or_disable(
        &self,
        job: &mut JobDefinition,
        from: i64,
        outcome: &mut ScanOutcome,
    ) -> Option<Option<i64>> {
        match self.calculator.compute(job, from) {
            Ok(next) => Some(next),
            Err(e) => {
                warn!("任务 {} 调度表达式无效，已禁用: {}", job.id, e);
                self.disable(job, outcome);
                None
            }
        }
    }

    fn apply_next(&self, job: &mut JobDefinition, next: Option<i64>, outcome: &mut ScanOutcome) {
        match next {
            Some(next) => {
                job.last_fire_time = job.next_fire_time;
                job.next_fire_time = next;
            }
            None => {
                warn!("任务 {} 没有后续触发时间，已禁用", job.id);
                self.disable(job, outcome);
            }
        }
    }

    fn disable(&self, job: &mut JobDefinition, outcome: &mut ScanOutcome) {
        job.disable();
        outcome.disabled += 1;
        metrics::counter!("scheduler_jobs_disabled_total").increment(1);
    }

    fn push_ring(&self, job: &JobDefinition, outcome: &mut ScanOutcome) {
        self.ring.push(TimeRing::slot_for(job.next_fire_time), job.id);
        outcome.ringed += 1;
    }

    async fn submit(&self, request: TriggerRequest) {
        let job_id = request.job_id;
        if let Err(e) = self.dispatcher.submit(request).await {
            error!("任务 {} 分发失败: {}", job_id, e);
        }
    }
}
