//! Subscription records and handler adapters.
//!
//! A [`Subscription`] binds one handler to an optional executor. Its
//! identity is the handler allocation: subscribing the same `Arc` twice
//! yields the same subscription, whatever executor the second call asks
//! for.

use crate::executor::Executor;
use crate::message::Message;
use std::fmt;
use std::sync::Arc;

pub mod handle;
pub mod handler;

pub use handle::{SubscribeOptions, SubscriptionHandle, SubscriptionId};
pub use handler::{FilteredHandler, FunctionHandler, IsolatedHandler, MessageHandler};

pub(crate) use handle::SubscriptionSlot;

/// Address identifying a handler allocation, independent of its vtable.
pub(crate) fn handler_address<T: ?Sized>(handler: &Arc<T>) -> *const () {
    Arc::as_ptr(handler) as *const ()
}

/// A registered handler and the executor it must run on.
pub struct Subscription<M: Message> {
    id: SubscriptionId,
    name: Arc<str>,
    handler: Arc<dyn MessageHandler<M>>,
    affinity: Option<Arc<dyn Executor>>,
}

impl<M: Message> Subscription<M> {
    pub(crate) fn new(handler: Arc<dyn MessageHandler<M>>, options: SubscribeOptions) -> Self {
        let name: Arc<str> = match options.name {
            Some(name) => Arc::from(name),
            None => Arc::from(handler.name()),
        };

        Self {
            id: SubscriptionId::new(),
            name,
            handler,
            affinity: options.affinity,
        }
    }

    /// Subscription ID
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Subscription name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    /// The handler
    pub fn handler(&self) -> &Arc<dyn MessageHandler<M>> {
        &self.handler
    }

    /// The executor the handler is pinned to, if any
    pub fn affinity(&self) -> Option<&Arc<dyn Executor>> {
        self.affinity.as_ref()
    }

    /// Whether this subscription wraps the handler at `address`
    pub(crate) fn wraps(&self, address: *const ()) -> bool {
        handler_address(&self.handler) == address
    }
}

impl<M: Message> Clone for Subscription<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            handler: self.handler.clone(),
            affinity: self.affinity.clone(),
        }
    }
}

impl<M: Message> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("message_type", &M::message_type())
            .field("affinity", &self.affinity.as_ref().map(|e| e.name().to_owned()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BackgroundExecutor;

    #[derive(Debug, Clone)]
    struct TestMessage;

    impl Message for TestMessage {}

    fn noop() -> Arc<dyn MessageHandler<TestMessage>> {
        Arc::new(FunctionHandler::new(|_: TestMessage| async { Ok(()) }).named("noop"))
    }

    #[test]
    fn test_identity_is_the_handler_allocation() {
        let handler = noop();
        let first = Subscription::new(handler.clone(), SubscribeOptions::new());
        let second = Subscription::new(
            handler.clone(),
            SubscribeOptions::new().on(Arc::new(BackgroundExecutor::new())),
        );

        assert!(first.wraps(handler_address(&handler)));
        assert!(second.wraps(handler_address(&handler)));
        assert!(!first.wraps(handler_address(&noop())));
    }

    #[test]
    fn test_name_defaults_to_handler_name() {
        let subscription = Subscription::new(noop(), SubscribeOptions::new());
        assert_eq!(subscription.name(), "noop");
        assert!(subscription.affinity().is_none());

        let subscription = Subscription::new(noop(), SubscribeOptions::new().name("custom"));
        assert_eq!(subscription.name(), "custom");
    }
}
