//! One tier of the broker: a registry table plus its publish entry points.

use super::publish::PublishHandle;
use crate::executor::Executor;
use crate::message::{Message, PublishContext, PublishReceipt};
use crate::registry::{RegistrySettings, RegistryTable, TypeRegistry};
use crate::scope::ScopeId;
use crate::subscription::{FunctionHandler, MessageHandler, SubscribeOptions, SubscriptionHandle};
use crate::Result;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which tier a registry, handle or publish belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// The process-wide tier
    Global,

    /// The tier of one scope
    Scoped(ScopeId),
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Global => write!(f, "global"),
            TierKind::Scoped(id) => write!(f, "scope {}", id),
        }
    }
}

/// Subscribe and publish on one tier.
///
/// The global tier lives as long as the broker; a scoped tier is handed
/// out by [`Broker::scope`](super::Broker::scope) and dropped by
/// [`Broker::end_scope`](super::Broker::end_scope). Each message type gets
/// its own registry, created on first use.
pub struct Tier {
    kind: TierKind,
    default_executor: Arc<dyn Executor>,
    table: RegistryTable,
}

impl Tier {
    pub(crate) fn new(settings: RegistrySettings, capacity: usize) -> Self {
        Self {
            kind: settings.tier,
            default_executor: settings.default_executor.clone(),
            table: RegistryTable::new(settings, capacity),
        }
    }

    /// Which tier this is
    pub fn kind(&self) -> TierKind {
        self.kind
    }

    /// The registry for `M`, created on first use
    pub fn registry<M: Message>(&self) -> Result<Arc<TypeRegistry<M>>> {
        self.table.get_or_create::<M>()
    }

    /// Subscribe a closure
    pub fn subscribe<M, F, Fut>(&self, handler: F) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe_with(SubscribeOptions::new(), handler)
    }

    /// Subscribe a closure with a name or executor affinity
    pub fn subscribe_with<M, F, Fut>(
        &self,
        options: SubscribeOptions,
        handler: F,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe_handler_with(Arc::new(FunctionHandler::new(handler)), options)
    }

    /// Subscribe a closure that also receives the publish context
    pub fn subscribe_with_context<M, F, Fut>(
        &self,
        options: SubscribeOptions,
        handler: F,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M, PublishContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe_handler_with(Arc::new(FunctionHandler::with_context(handler)), options)
    }

    /// Subscribe a handler object.
    ///
    /// Subscribing the same `Arc` again returns the existing subscription.
    pub fn subscribe_handler<M, H>(&self, handler: Arc<H>) -> Result<SubscriptionHandle>
    where
        M: Message,
        H: MessageHandler<M>,
    {
        self.subscribe_handler_with(handler, SubscribeOptions::new())
    }

    /// Subscribe a handler object with a name or executor affinity
    pub fn subscribe_handler_with<M, H>(
        &self,
        handler: Arc<H>,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        H: MessageHandler<M>,
    {
        let handler: Arc<dyn MessageHandler<M>> = handler;
        Ok(self.registry::<M>()?.subscribe(handler, options))
    }

    /// Remove a subscription made on this tier.
    ///
    /// Handles from another tier, or already released ones, are ignored.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        handle.tier() == self.kind && handle.unsubscribe()
    }

    /// Remove the subscription of `handler` for `M`, whatever its executor
    pub fn unsubscribe_handler<M, H>(&self, handler: &Arc<H>) -> Result<bool>
    where
        M: Message,
        H: MessageHandler<M> + ?Sized,
    {
        Ok(self
            .table
            .get::<M>()?
            .map(|registry| registry.unsubscribe_handler(handler))
            .unwrap_or(false))
    }

    /// Publish and wait for every handler in the snapshot
    pub async fn publish<M: Message>(&self, message: M) -> Result<PublishReceipt> {
        self.publish_with_cancellation(message, CancellationToken::new())
            .await
    }

    /// Publish, stopping before the next handler once `token` is cancelled
    pub async fn publish_with_cancellation<M: Message>(
        &self,
        message: M,
        token: CancellationToken,
    ) -> Result<PublishReceipt> {
        let registry = self.registry::<M>()?;
        let ctx = PublishContext::new(M::message_type(), self.kind, token);
        registry.publish(message, ctx).await
    }

    /// Publish on the default executor without waiting.
    ///
    /// The returned handle can be awaited for the outcome, cancelled, or
    /// dropped; the publish runs to completion either way.
    pub fn publish_detached<M: Message>(&self, message: M) -> Result<PublishHandle> {
        let registry = self.registry::<M>()?;
        let token = CancellationToken::new();
        let ctx = PublishContext::new(M::message_type(), self.kind, token.clone());

        PublishHandle::spawn(
            &self.default_executor,
            async move { registry.publish(message, ctx).await },
            token,
        )
    }

    /// Number of subscriptions for `M`
    pub fn subscription_count<M: Message>(&self) -> usize {
        self.table.subscription_count::<M>()
    }

    /// Names of the message types with subscribers
    pub fn message_types(&self) -> Vec<&'static str> {
        self.table.message_types()
    }

    /// Number of subscriptions across all message types
    pub fn total_subscriptions(&self) -> usize {
        self.table.total_subscriptions()
    }

    /// Drop every subscription on this tier
    pub fn clear(&self) {
        self.table.clear();
    }
}

impl fmt::Debug for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("kind", &self.kind)
            .field("default_executor", &self.default_executor.name())
            .field("table", &self.table)
            .finish()
    }
}
