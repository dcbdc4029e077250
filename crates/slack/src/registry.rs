use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use switchboard_db::AuthorizationStore;

use crate::events::{HandlerError, Notification};
use crate::topics::TopicKey;

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        notification: Arc<Notification>,
        store: Arc<dyn AuthorizationStore>,
    ) -> Result<(), HandlerError>;
}

pub type SharedHandler = Arc<dyn EventHandler>;

/// Adapts an async closure into an [`EventHandler`].
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<Notification>, Arc<dyn AuthorizationStore>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        notification: Arc<Notification>,
        store: Arc<dyn AuthorizationStore>,
    ) -> Result<(), HandlerError> {
        (self.handler)(notification, store).await
    }
}

/// Topic key to ordered handler list. Built during startup and read-only
/// once handed to the dispatcher.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    listeners: HashMap<TopicKey, Vec<SharedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the topic's list. The same handler may be
    /// registered under several topics, or several times under one.
    pub fn register(&mut self, topic: impl Into<TopicKey>, handler: SharedHandler) -> &mut Self {
        self.listeners.entry(topic.into()).or_default().push(handler);
        self
    }

    /// Registers an async closure and returns the shared handle so it can be
    /// attached to further topics.
    pub fn on<F, Fut>(&mut self, topic: impl Into<TopicKey>, handler: F) -> SharedHandler
    where
        F: Fn(Arc<Notification>, Arc<dyn AuthorizationStore>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let shared: SharedHandler = Arc::new(FnHandler::new(handler));
        self.register(topic, shared.clone());
        shared
    }

    pub fn listeners_for(&self, topic: &str) -> &[SharedHandler] {
        self.listeners.get(topic).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn topic_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}
