use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::media::{InMemoryMediaStore, MediaStore};
use crate::push::{self, LoggingPushSender, PushRequest, PushSender};
use crate::repository::{InMemoryStore, SocialStore, UnitOfWork};

/// Collaborators shared by every service, owned by the caller rather than
/// living in module-level globals
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn SocialStore>,
    pub media: Arc<dyn MediaStore>,
    pub push: Arc<dyn PushSender>,
    pub config: Arc<Config>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn SocialStore>,
        media: Arc<dyn MediaStore>,
        push: Arc<dyn PushSender>,
        config: Config,
    ) -> Self {
        Self {
            store,
            media,
            push,
            config: Arc::new(config),
        }
    }

    /// Self-contained engine: in-process store and media, pushes only logged
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryMediaStore::new()),
            Arc::new(LoggingPushSender),
            config,
        )
    }

    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone(), self.config.store_timeout())
    }

    pub fn media_prefix(&self) -> &str {
        &self.config.delivery.media_url_prefix
    }

    /// Run one logical mutation, re-running it from scratch after an
    /// optimistic-commit conflict or a store timeout
    pub async fn transact<T, F, Fut>(&self, operation: &'static str, f: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        resilience::with_retry_if(self.config.retry_config(), |e: &ServiceError| e.is_retryable(), f)
            .await
            .map_err(|e| {
                let e = e.into_inner();
                if e.is_retryable() {
                    warn!(operation, "Giving up after repeated conflicts: {}", e);
                }
                e
            })
    }

    /// Hand committed pushes to the sender without waiting for delivery
    pub fn dispatch(&self, requests: Vec<PushRequest>) {
        if requests.is_empty() {
            return;
        }
        push::dispatch(self.push.clone(), requests, self.config.push_timeout());
    }
}
