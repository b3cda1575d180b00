use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

const MINUTE_MS: i64 = 60_000;

/// 慢执行统计
///
/// 记录当前这一分钟内每个任务耗时超过阈值的执行次数，
/// 墙钟分钟推进时整表清空，路由只参考当前分钟的历史。
#[derive(Debug)]
pub struct TimeoutStats {
    counts: DashMap<i64, u32>,
    window_minute: AtomicI64,
    slow_threshold: Duration,
}

impl TimeoutStats {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            counts: DashMap::new(),
            window_minute: AtomicI64::new(i64::MIN),
            slow_threshold,
        }
    }

    /// 分钟推进时清空统计
    pub fn roll_window(&self, now_ms: i64) {
        let minute = now_ms.div_euclid(MINUTE_MS);
        let previous = self.window_minute.swap(minute, Ordering::SeqCst);
        if previous != minute && previous != i64::MIN {
            debug!("慢执行统计进入新的分钟窗口，清空 {} 条记录", self.counts.len());
            self.counts.clear();
        }
    }

    /// 记录一次执行耗时，返回本次是否为慢执行
    ///
    /// 首次慢执行插入计数 1，已有计数则自增。
    pub fn record(&self, job_id: i64, cost: Duration, now_ms: i64) -> bool {
        self.roll_window(now_ms);
        if cost <= self.slow_threshold {
            return false;
        }

        self.counts
            .entry(job_id)
            .and_modify(|count| *count += 1)
            .or_insert(1);
        true
    }

    pub fn count(&self, job_id: i64) -> u32 {
        self.counts.get(&job_id).map(|c| *c).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
