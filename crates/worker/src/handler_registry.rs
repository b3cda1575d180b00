use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use scheduler_core::{
    traits::{HandlerRegistry, JobContext, JobHandler},
    SchedulerResult,
};
use tokio::sync::RwLock;
use tracing::info;

/// 基于映射表的处理器注册表
#[derive(Clone, Default)]
pub struct DefaultHandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn JobHandler>>>>,
}

impl DefaultHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, identifier: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let identifier = identifier.into();
        info!("注册任务处理器: {}", identifier);
        self.handlers.write().await.insert(identifier, handler);
    }

    /// 注册异步闭包处理器
    pub async fn register_fn<F, Fut>(&self, identifier: impl Into<String>, f: F)
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
    {
        self.register(identifier, Arc::new(FnHandler::new(f))).await;
    }

    pub async fn register_batch(&self, handlers: Vec<(String, Arc<dyn JobHandler>)>) {
        let mut registry = self.handlers.write().await;
        for (identifier, handler) in handlers {
            registry.insert(identifier, handler);
        }
    }

    pub async fn unregister(&self, identifier: &str) -> bool {
        self.handlers.write().await.remove(identifier).is_some()
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        self.handlers.read().await.contains_key(identifier)
    }
}

#[async_trait]
impl HandlerRegistry for DefaultHandlerRegistry {
    async fn resolve(&self, identifier: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.read().await.get(identifier).cloned()
    }

    async fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<_> = self.handlers.read().await.keys().cloned().collect();
        identifiers.sort();
        identifiers
    }
}

/// 闭包处理器
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
{
    async fn execute(&self, context: &JobContext) -> SchedulerResult<()> {
        (self.f)(context.clone()).await
    }
}
