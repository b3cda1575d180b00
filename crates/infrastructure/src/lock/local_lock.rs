use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scheduler_core::{traits::JobLock, SchedulerError, SchedulerResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// 进程内调度锁
///
/// 同一 `owner` 可重入；不同 `owner` 之间互斥。只能保护单进程内的多个调度实例，
/// 集群部署需要替换为分布式锁实现。
pub struct LocalJobLock {
    name: String,
    semaphore: Arc<Semaphore>,
    state: Mutex<HoldState>,
}

#[derive(Default)]
struct HoldState {
    owner: Option<String>,
    depth: u32,
    permit: Option<OwnedSemaphorePermit>,
}

impl LocalJobLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(1)),
            state: Mutex::new(HoldState::default()),
        }
    }

    /// 当前持有者
    pub fn holder(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.owner.clone())
    }

    fn try_reenter(&self, owner: &str) -> SchedulerResult<bool> {
        let mut state = self.state_guard()?;
        if state.depth > 0 && state.owner.as_deref() == Some(owner) {
            state.depth += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn state_guard(&self) -> SchedulerResult<std::sync::MutexGuard<'_, HoldState>> {
        self.state
            .lock()
            .map_err(|e| SchedulerError::LockAcquisition(format!("锁状态损坏: {e}")))
    }
}

#[async_trait]
impl JobLock for LocalJobLock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&self, owner: &str) -> SchedulerResult<()> {
        if self.try_reenter(owner)? {
            return Ok(());
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| SchedulerError::LockAcquisition(format!("{}: {e}", self.name)))?;

        let mut state = self.state_guard()?;
        state.owner = Some(owner.to_string());
        state.depth = 1;
        state.permit = Some(permit);
        debug!("获取调度锁: name={}, owner={}", self.name, owner);
        Ok(())
    }

    async fn unlock(&self, owner: &str) -> SchedulerResult<()> {
        let mut state = self.state_guard()?;
        if state.depth == 0 || state.owner.as_deref() != Some(owner) {
            return Err(SchedulerError::LockAcquisition(format!(
                "{} 未持有锁 {}",
                owner, self.name
            )));
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            state.permit = None;
            debug!("释放调度锁: name={}, owner={}", self.name, owner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reentrant_for_same_owner() {
        let lock = LocalJobLock::new("job");

        lock.lock("scanner-a").await.unwrap();
        lock.lock("scanner-a").await.unwrap();
        assert_eq!(lock.holder().as_deref(), Some("scanner-a"));

        lock.unlock("scanner-a").await.unwrap();
        assert_eq!(lock.holder().as_deref(), Some("scanner-a"));

        lock.unlock("scanner-a").await.unwrap();
        assert_eq!(lock.holder(), None);
    }

    #[tokio::test]
    async fn test_mutual_exclusion_between_owners() {
        let lock = Arc::new(LocalJobLock::new("job"));
        lock.lock("scanner-a").await.unwrap();

        let contender = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                lock.lock("scanner-b").await.unwrap();
                lock.holder()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        lock.unlock("scanner-a").await.unwrap();
        let holder = tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(holder.as_deref(), Some("scanner-b"));
    }

    #[tokio::test]
    async fn test_unlock_by_non_owner_fails() {
        let lock = LocalJobLock::new("job");
        assert!(lock.unlock("nobody").await.is_err());

        lock.lock("scanner-a").await.unwrap();
        assert!(matches!(
            lock.unlock("scanner-b").await,
            Err(SchedulerError::LockAcquisition(_))
        ));
    }
}
