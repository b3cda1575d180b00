use dashmap::DashMap;
use tracing::debug;

/// 时间环槽位数（一分钟的秒数）
pub const RING_SLOTS: u32 = 60;

/// 秒级时间环
///
/// 以"分钟内的秒"为槽位暂存即将到期的任务ID。扫描线程写入，
/// 时间环分发线程按秒取出，两者只通过这里交互。
#[derive(Debug, Default)]
pub struct TimeRing {
    slots: DashMap<u32, Vec<i64>>,
}

impl TimeRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发时间对应的槽位
    pub fn slot_for(epoch_ms: i64) -> u32 {
        epoch_ms.div_euclid(1000).rem_euclid(RING_SLOTS as i64) as u32
    }

    pub fn push(&self, second: u32, job_id: i64) {
        let second = second % RING_SLOTS;
        self.slots.entry(second).or_default().push(job_id);
        debug!("时间环推入任务 {}，槽位 {}", job_id, second);
    }

    /// 取出当前秒和前一秒两个槽位的任务
    ///
    /// 多取前一秒是为了容忍上一次分发跨过秒边界。
    pub fn drain(&self, second: u32) -> Vec<i64> {
        let second = second % RING_SLOTS;
        let previous = (second + RING_SLOTS - 1) % RING_SLOTS;

        let mut job_ids = Vec::new();
        for slot in [second, previous] {
            if let Some((_, ids)) = self.slots.remove(&slot) {
                job_ids.extend(ids);
            }
        }
        job_ids
    }

    /// 环中是否还有未分发的任务
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.value().is_empty())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|slot| slot.value().len()).sum()
    }

    /// 清空时间环，返回丢弃的任务数
    pub fn clear(&self) -> usize {
        let discarded = self.len();
        self.slots.clear();
        discarded
    }
}
