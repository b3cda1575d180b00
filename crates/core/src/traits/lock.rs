use async_trait::async_trait;

use crate::SchedulerResult;

/// 调度锁接口
///
/// 使一次"预读-分类-持久化"扫描周期相对其他调度实例原子化。
/// 单机运行使用进程内锁，集群部署可替换为分布式锁实现。
/// 同一 `owner` 可重入，加锁几次就需要解锁几次。
#[async_trait]
pub trait JobLock: Send + Sync {
    /// 锁名称
    fn name(&self) -> &str;

    /// 阻塞直到获取锁
    async fn lock(&self, owner: &str) -> SchedulerResult<()>;

    /// 释放一次持有
    async fn unlock(&self, owner: &str) -> SchedulerResult<()>;
}
