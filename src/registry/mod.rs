//! Per message type subscription registries.
//!
//! A [`TypeRegistry`] owns the subscriptions for one message type in one
//! tier. Publishing copies the subscription list under the registry's
//! mutex and then dispatches from that copy, so subscribe and unsubscribe
//! calls racing with a publish only become visible to the next one.

use crate::bus::{DispatchMode, TierKind};
use crate::executor::{executor_key, Executor, Task};
use crate::message::{Message, PublishContext, PublishReceipt};
use crate::subscription::{
    handler_address, MessageHandler, SubscribeOptions, Subscription, SubscriptionHandle,
    SubscriptionId, SubscriptionSlot,
};
use crate::{Error, Result};
use futures::future::join_all;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

mod table;
pub(crate) use table::RegistryTable;

/// Settings shared by every registry of one tier.
#[derive(Debug, Clone)]
pub(crate) struct RegistrySettings {
    pub(crate) default_executor: Arc<dyn Executor>,
    pub(crate) dispatch: DispatchMode,
    pub(crate) tier: TierKind,
}

/// The subscriptions for one message type in one tier.
pub struct TypeRegistry<M: Message> {
    subscriptions: Mutex<Vec<Subscription<M>>>,
    settings: RegistrySettings,
}

impl<M: Message> TypeRegistry<M> {
    pub(crate) fn new(settings: RegistrySettings) -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscription<M>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler.
    ///
    /// If the same handler allocation is already registered this is a
    /// no-op that returns a handle to the existing subscription; the
    /// options of the second call are ignored.
    pub fn subscribe(
        self: &Arc<Self>,
        handler: Arc<dyn MessageHandler<M>>,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        let address = handler_address(&handler);
        let mut subscriptions = self.lock();

        if let Some(existing) = subscriptions.iter().find(|s| s.wraps(address)) {
            trace!(
                subscription_id = %existing.id(),
                message_type = M::message_type(),
                "Handler already subscribed"
            );
            return self.handle_for(existing);
        }

        let subscription = Subscription::new(handler, options);
        let handle = self.handle_for(&subscription);

        debug!(
            subscription_id = %subscription.id(),
            handler = subscription.name(),
            message_type = M::message_type(),
            tier = %self.settings.tier,
            "Handler subscribed"
        );

        subscriptions.push(subscription);
        handle
    }

    fn handle_for(self: &Arc<Self>, subscription: &Subscription<M>) -> SubscriptionHandle {
        let slot: Arc<dyn SubscriptionSlot> = self.clone();
        SubscriptionHandle::new(
            subscription.id(),
            subscription.shared_name(),
            M::message_type(),
            self.settings.tier,
            Arc::downgrade(&slot),
        )
    }

    /// Remove a subscription by ID. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        match subscriptions.iter().position(|s| s.id() == id) {
            Some(index) => {
                subscriptions.remove(index);
                debug!(
                    subscription_id = %id,
                    message_type = M::message_type(),
                    tier = %self.settings.tier,
                    "Handler unsubscribed"
                );
                true
            }
            None => false,
        }
    }

    /// Remove the subscription wrapping `handler`, whatever its executor.
    pub fn unsubscribe_handler<H: ?Sized>(&self, handler: &Arc<H>) -> bool {
        let address = handler_address(handler);
        let id = self
            .lock()
            .iter()
            .find(|s| s.wraps(address))
            .map(|s| s.id());

        match id {
            Some(id) => self.unsubscribe(id),
            None => false,
        }
    }

    /// Whether a subscription with this ID is registered
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.lock().iter().any(|s| s.id() == id)
    }

    /// Number of subscriptions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current subscriptions, in subscription order
    pub fn snapshot(&self) -> Vec<Subscription<M>> {
        self.lock().clone()
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Deliver `message` to every handler registered when the call starts.
    ///
    /// In [`DispatchMode::Sequential`] handlers run one after the other in
    /// subscription order and the first fault stops the publish. In
    /// [`DispatchMode::PerExecutor`] handlers are grouped by executor; the
    /// groups run concurrently, each group in subscription order, and the
    /// first fault is returned once every group has finished.
    pub async fn publish(&self, message: M, ctx: PublishContext) -> Result<PublishReceipt> {
        let snapshot = self.snapshot();

        trace!(
            publish_id = %ctx.publish_id,
            message_type = ctx.message_type,
            tier = %ctx.tier,
            subscribers = snapshot.len(),
            "Publishing message"
        );

        if snapshot.is_empty() {
            return Ok(PublishReceipt::new(&ctx, 0));
        }

        let message = Arc::new(message);
        let delivered = match self.settings.dispatch {
            DispatchMode::Sequential => self.deliver_in_order(&snapshot, &message, &ctx).await?,
            DispatchMode::PerExecutor => {
                self.deliver_per_executor(snapshot, &message, &ctx).await?
            }
        };

        trace!(publish_id = %ctx.publish_id, delivered, "Message published");
        Ok(PublishReceipt::new(&ctx, delivered))
    }

    fn executor_for<'a>(&'a self, subscription: &'a Subscription<M>) -> &'a Arc<dyn Executor> {
        subscription
            .affinity()
            .unwrap_or(&self.settings.default_executor)
    }

    async fn deliver_in_order(
        &self,
        subscriptions: &[Subscription<M>],
        message: &Arc<M>,
        ctx: &PublishContext,
    ) -> Result<usize> {
        let mut delivered = 0;

        for subscription in subscriptions {
            if ctx.is_cancelled() {
                debug!(publish_id = %ctx.publish_id, delivered, "Publish cancelled");
                return Err(Error::Cancelled { delivered });
            }

            self.deliver(subscription, message, ctx).await?;
            delivered += 1;
        }

        Ok(delivered)
    }

    async fn deliver_per_executor(
        &self,
        snapshot: Vec<Subscription<M>>,
        message: &Arc<M>,
        ctx: &PublishContext,
    ) -> Result<usize> {
        let mut groups: Vec<(usize, Vec<Subscription<M>>)> = Vec::new();
        for subscription in snapshot {
            let key = executor_key(self.executor_for(&subscription));
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(subscription),
                None => groups.push((key, vec![subscription])),
            }
        }

        let results = join_all(
            groups
                .iter()
                .map(|(_, group)| self.deliver_in_order(group, message, ctx)),
        )
        .await;

        let mut delivered = 0;
        let mut cancelled = false;
        let mut fault = None;

        for result in results {
            match result {
                Ok(count) => delivered += count,
                Err(Error::Cancelled { delivered: count }) => {
                    delivered += count;
                    cancelled = true;
                }
                Err(e) => {
                    fault.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fault {
            return Err(e);
        }
        if cancelled {
            return Err(Error::Cancelled { delivered });
        }
        Ok(delivered)
    }

    async fn deliver(
        &self,
        subscription: &Subscription<M>,
        message: &Arc<M>,
        ctx: &PublishContext,
    ) -> Result<()> {
        let executor = self.executor_for(subscription).clone();
        let handler = subscription.handler().clone();
        let task_message = message.clone();
        let task_ctx = ctx.clone();
        let (tx, rx) = oneshot::channel();

        let task: Task = Box::pin(async move {
            let outcome = AssertUnwindSafe(handler.handle(&*task_message, &task_ctx))
                .catch_unwind()
                .await;
            let _ = tx.send(outcome);
        });

        trace!(
            subscription_id = %subscription.id(),
            handler = subscription.name(),
            executor = executor.name(),
            "Dispatching to handler"
        );

        let result = match executor.submit(task) {
            Err(e) => Err(e),
            Ok(()) => match rx.await {
                Ok(Ok(result)) => result,
                Ok(Err(_panic)) => Err(Error::HandlerPanicked {
                    handler: subscription.name().to_owned(),
                    message_type: ctx.message_type,
                }),
                Err(_) => Err(Error::TaskDropped {
                    executor: executor.name().to_owned(),
                }),
            },
        };

        if let Err(e) = &result {
            warn!(
                subscription_id = %subscription.id(),
                handler = subscription.name(),
                publish_id = %ctx.publish_id,
                error = %e,
                "Handler failed, remaining handlers skipped"
            );
        }

        result
    }
}

impl<M: Message> SubscriptionSlot for TypeRegistry<M> {
    fn remove(&self, id: SubscriptionId) -> bool {
        self.unsubscribe(id)
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        TypeRegistry::contains(self, id)
    }
}

impl<M: Message> fmt::Debug for TypeRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("message_type", &M::message_type())
            .field("tier", &self.settings.tier)
            .field("subscriptions", &self.len())
            .finish()
    }
}
