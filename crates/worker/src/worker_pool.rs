use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use scheduler_core::{SchedulerError, SchedulerResult};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 提交到线程池的任务
pub type PoolTask = BoxFuture<'static, ()>;

/// 有界工作池
///
/// 行为与有界线程池一致：核心 worker 常驻并从有界队列取任务；
/// 队列满时临时扩容一个 worker 直接执行该任务，直到 `max_size`；
/// 队列和 worker 都饱和时拒绝任务。
pub struct WorkerPool {
    name: String,
    core_size: usize,
    max_size: usize,
    sender: Mutex<Option<mpsc::Sender<PoolTask>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<PoolTask>>>,
    worker_count: Arc<AtomicUsize>,
    busy_count: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl WorkerPool {
    pub fn new(
        name: impl Into<String>,
        core_size: usize,
        max_size: usize,
        queue_capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        Self {
            name: name.into(),
            core_size,
            max_size: max_size.max(core_size),
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            worker_count: Arc::new(AtomicUsize::new(0)),
            busy_count: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 启动核心 worker，重复调用无效
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = self.lock_handles();
        for index in 0..self.core_size {
            self.worker_count.fetch_add(1, Ordering::SeqCst);
            let name = self.name.clone();
            let receiver = Arc::clone(&self.receiver);
            let busy = Arc::clone(&self.busy_count);
            handles.push(tokio::spawn(async move {
                debug!("线程池 {} 核心worker-{} 启动", name, index);
                loop {
                    let task = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    match task {
                        Some(task) => run_task(&name, task, &busy).await,
                        None => break,
                    }
                }
                debug!("线程池 {} 核心worker-{} 退出", name, index);
            }));
        }
        info!(
            "线程池 {} 已启动: core={}, max={}",
            self.name, self.core_size, self.max_size
        );
    }

    /// 提交任务，队列和 worker 都饱和时返回 `PoolRejected`
    pub fn submit(&self, job_id: i64, task: PoolTask) -> SchedulerResult<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| SchedulerError::Internal(format!("线程池状态损坏: {e}")))?
            .clone();
        let Some(sender) = sender else {
            return Err(SchedulerError::PoolClosed(self.name.clone()));
        };

        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                if self.try_reserve_worker() {
                    self.spawn_burst_worker(task);
                    Ok(())
                } else {
                    error!(
                        "线程池 {} 已饱和（max={}），拒绝任务: jobId={}",
                        self.name, self.max_size, job_id
                    );
                    Err(SchedulerError::PoolRejected {
                        pool: self.name.clone(),
                        job_id,
                    })
                }
            }
            Err(TrySendError::Closed(_)) => Err(SchedulerError::PoolClosed(self.name.clone())),
        }
    }

    /// 立即关闭：不再接受任务，中止所有 worker
    pub fn shutdown_now(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handles: Vec<_> = self.lock_handles().drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        info!("线程池 {} 已关闭，中止 {} 个worker", self.name, handles.len());
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// 当前存活的 worker 数（核心 + 临时）
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }

    /// 正在执行任务的 worker 数
    pub fn busy_count(&self) -> usize {
        self.busy_count.load(Ordering::SeqCst)
    }

    fn try_reserve_worker(&self) -> bool {
        let max = self.max_size;
        self.worker_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    fn spawn_burst_worker(&self, first: PoolTask) {
        let name = self.name.clone();
        let receiver = Arc::clone(&self.receiver);
        let busy = Arc::clone(&self.busy_count);
        let workers = Arc::clone(&self.worker_count);
        debug!("线程池 {} 队列已满，扩容临时worker", self.name);

        let handle = tokio::spawn(async move {
            run_task(&name, first, &busy).await;
            loop {
                let next = match receiver.try_lock() {
                    Ok(mut rx) => rx.try_recv().ok(),
                    Err(_) => None,
                };
                match next {
                    Some(task) => run_task(&name, task, &busy).await,
                    None => break,
                }
            }
            workers.fetch_sub(1, Ordering::SeqCst);
        });

        let mut handles = self.lock_handles();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_task(pool: &str, task: PoolTask, busy: &AtomicUsize) {
    busy.fetch_add(1, Ordering::SeqCst);
    if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
        error!("线程池 {} 任务异常终止: {}", pool, panic_message(panic.as_ref()));
    }
    busy.fetch_sub(1, Ordering::SeqCst);
}

/// 提取 panic 携带的信息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
