use chrono::Utc;

/// 毫秒级时钟抽象
///
/// 扫描线程、时间环和线程池都通过它读取当前时间，测试中可替换为可控时钟。
pub trait Clock: Send + Sync {
    /// 当前时间（epoch毫秒）
    fn now_millis(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
