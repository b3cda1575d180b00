use scheduler_core::models::JobDefinition;
use scheduler_dispatcher::NextFireTimeCalculator;
use scheduler_infrastructure::InMemoryJobStore;
use tracing::{info, warn};

/// 把配置中的任务写入内存任务存储
///
/// 启用但没有下次触发时间的任务从 `now + 预读窗口` 起算；
/// 表达式无效的任务以禁用状态写入。返回写入的任务数。
pub async fn seed_jobs(
    store: &InMemoryJobStore,
    jobs: Vec<JobDefinition>,
    now_ms: i64,
    pre_read_window_ms: i64,
) -> usize {
    let calculator = NextFireTimeCalculator::new();
    let mut seeded = 0;

    for mut job in jobs {
        if job.is_enabled() && job.next_fire_time == 0 {
            match calculator.compute(&job, now_ms + pre_read_window_ms) {
                Ok(Some(next)) => job.next_fire_time = next,
                Ok(None) => {
                    warn!("任务 {} 没有后续触发时间，以禁用状态写入", job.id);
                    job.disable();
                }
                Err(e) => {
                    warn!("任务 {} 调度表达式无效，以禁用状态写入: {}", job.id, e);
                    job.disable();
                }
            }
        }
        store.insert_job(job).await;
        seeded += 1;
    }

    info!("已写入 {} 个配置任务", seeded);
    seeded
}
