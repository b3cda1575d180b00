//! 秒边界对齐

use std::time::Duration;

use tokio::sync::broadcast;

/// 首次循环前的对齐等待：睡到下一个整秒
pub fn initial_delay_ms(now_ms: i64) -> i64 {
    1000 - now_ms.rem_euclid(1000)
}

/// 一个扫描周期结束后的等待时长
///
/// 周期耗时不少于一秒时立即进入下一轮；预读为空时等待一个预读窗口，
/// 否则对齐到下一个整秒。
pub fn next_cycle_delay_ms(cost_ms: i64, pre_read_ok: bool, now_ms: i64, window_ms: i64) -> i64 {
    if cost_ms >= 1000 {
        return 0;
    }
    let base = if pre_read_ok { 1000 } else { window_ms };
    (base - now_ms.rem_euclid(1000)).max(0)
}

/// 睡眠指定时长，期间收到关闭信号则提前返回 `true`
pub async fn sleep_or_shutdown(delay_ms: i64, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    if delay_ms <= 0 {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(delay_ms as u64)) => false,
        _ = shutdown_rx.recv() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_delay_aligns_to_second() {
        assert_eq!(initial_delay_ms(10_000), 1000);
        assert_eq!(initial_delay_ms(10_250), 750);
        assert_eq!(initial_delay_ms(10_999), 1);
    }

    #[test]
    fn test_next_cycle_delay() {
        assert_eq!(next_cycle_delay_ms(30, true, 10_030, 5000), 970);
        assert_eq!(next_cycle_delay_ms(30, false, 10_030, 5000), 4970);
        assert_eq!(next_cycle_delay_ms(1000, true, 11_000, 5000), 0);
        assert_eq!(next_cycle_delay_ms(1500, false, 11_500, 5000), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_shutdown() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        assert!(sleep_or_shutdown(60_000, &mut rx).await);

        let (_tx, mut rx) = broadcast::channel::<()>(1);
        assert!(!sleep_or_shutdown(10, &mut rx).await);
        assert!(!sleep_or_shutdown(0, &mut rx).await);
    }
}
