//! Message handler traits and implementations.

use crate::message::{Message, PublishContext, Routed, RoutingTag};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use tracing::warn;

/// Trait for handlers that process messages of type `M` asynchronously.
///
/// Returning an error faults the enclosing publish: handlers later in the
/// snapshot are not run and the publisher receives the error.
#[async_trait]
pub trait MessageHandler<M: Message>: Send + Sync + 'static {
    /// Process one message
    async fn handle(&self, message: &M, ctx: &PublishContext) -> Result<()>;

    /// Get the handler name for debugging
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

type BoxedFn<M> = Box<dyn Fn(M, PublishContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A closure-based message handler.
///
/// Each `FunctionHandler` is a distinct subscription identity, even when
/// built from the same closure twice.
pub struct FunctionHandler<M: Message> {
    function: BoxedFn<M>,
    name: String,
}

impl<M: Message> FunctionHandler<M> {
    /// Wrap a closure receiving the message
    pub fn new<F, Fut>(function: F) -> Self
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            function: Box::new(move |message: M, _ctx: PublishContext| -> BoxFuture<'static, Result<()>> {
                Box::pin(function(message))
            }),
            name: format!("FunctionHandler<{}>", M::message_type()),
        }
    }

    /// Wrap a closure receiving the message and its publish context
    pub fn with_context<F, Fut>(function: F) -> Self
    where
        F: Fn(M, PublishContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            function: Box::new(move |message: M, ctx: PublishContext| -> BoxFuture<'static, Result<()>> {
                Box::pin(function(message, ctx))
            }),
            name: format!("FunctionHandler<{}>", M::message_type()),
        }
    }

    /// Set a custom name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<M: Message> MessageHandler<M> for FunctionHandler<M> {
    async fn handle(&self, message: &M, ctx: &PublishContext) -> Result<()> {
        (self.function)(message.clone(), ctx.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<M: Message> fmt::Debug for FunctionHandler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandler")
            .field("name", &self.name)
            .finish()
    }
}

/// A handler that only passes matching messages to its inner handler.
///
/// Skipped messages count as successfully handled.
pub struct FilteredHandler<M: Message, H: MessageHandler<M>> {
    inner: H,
    filter: Box<dyn Fn(&M) -> bool + Send + Sync>,
    filter_name: String,
}

impl<M: Message, H: MessageHandler<M>> FilteredHandler<M, H> {
    /// Create a new filtered handler
    pub fn new<F>(inner: H, filter: F, filter_name: impl Into<String>) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            filter: Box::new(filter),
            filter_name: filter_name.into(),
        }
    }

    /// Description of the filter
    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }
}

impl<M: Routed, H: MessageHandler<M>> FilteredHandler<M, H> {
    /// Only handle messages addressed to `destination`
    pub fn for_destination(inner: H, destination: RoutingTag) -> Self {
        let filter_name = format!("destination {}", destination);
        Self::new(
            inner,
            move |message: &M| message.routing_tag() == &destination,
            filter_name,
        )
    }
}

#[async_trait]
impl<M: Message, H: MessageHandler<M>> MessageHandler<M> for FilteredHandler<M, H> {
    async fn handle(&self, message: &M, ctx: &PublishContext) -> Result<()> {
        if (self.filter)(message) {
            self.inner.handle(message, ctx).await
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<M: Message, H: MessageHandler<M>> fmt::Debug for FilteredHandler<M, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredHandler")
            .field("name", &self.inner.name())
            .field("filter", &self.filter_name)
            .finish()
    }
}

/// A handler whose faults never abort the publish.
///
/// Errors from the inner handler go to the callback and are then
/// reported as success, so the remaining handlers of the snapshot run.
pub struct IsolatedHandler<H> {
    inner: H,
    on_error: Box<dyn Fn(&Error) + Send + Sync>,
}

impl<H> IsolatedHandler<H> {
    /// Create a new isolated handler
    pub fn new<E>(inner: H, on_error: E) -> Self
    where
        E: Fn(&Error) + Send + Sync + 'static,
    {
        Self {
            inner,
            on_error: Box::new(on_error),
        }
    }
}

#[async_trait]
impl<M: Message, H: MessageHandler<M>> MessageHandler<M> for IsolatedHandler<H> {
    async fn handle(&self, message: &M, ctx: &PublishContext) -> Result<()> {
        if let Err(e) = self.inner.handle(message, ctx).await {
            warn!(
                handler = self.inner.name(),
                publish_id = %ctx.publish_id,
                error = %e,
                "Isolated handler fault"
            );
            (self.on_error)(&e);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<H: fmt::Debug> fmt::Debug for IsolatedHandler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedHandler")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TierKind;
    use crate::scope::Scope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone)]
    struct TestMessage {
        value: i32,
    }

    impl Message for TestMessage {}

    #[derive(Debug, Clone)]
    struct ViewReady {
        tag: RoutingTag,
    }

    impl Message for ViewReady {}

    impl Routed for ViewReady {
        fn routing_tag(&self) -> &RoutingTag {
            &self.tag
        }
    }

    fn context() -> PublishContext {
        PublishContext::new("TestMessage", TierKind::Global, CancellationToken::new())
    }

    fn counting(counter: Arc<AtomicUsize>) -> FunctionHandler<TestMessage> {
        FunctionHandler::new(move |_: TestMessage| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_function_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FunctionHandler::new(move |message: TestMessage| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(message.value);
                Ok(())
            }
        });

        handler.handle(&TestMessage { value: 42 }, &context()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        assert!(handler.name().starts_with("FunctionHandler<"));
    }

    #[tokio::test]
    async fn test_function_handler_with_context() {
        let handler = FunctionHandler::with_context(|_: TestMessage, ctx: PublishContext| async move {
            if ctx.is_cancelled() {
                Err(Error::handler("cancelled"))
            } else {
                Ok(())
            }
        })
        .named("cancellable");

        let ctx = context();
        assert!(handler.handle(&TestMessage { value: 1 }, &ctx).await.is_ok());

        ctx.cancellation().cancel();
        assert!(handler.handle(&TestMessage { value: 1 }, &ctx).await.is_err());
        assert_eq!(handler.name(), "cancellable");
    }

    #[tokio::test]
    async fn test_filtered_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let filtered = FilteredHandler::new(
            counting(counter.clone()),
            |message: &TestMessage| message.value > 10,
            "value > 10",
        );

        filtered.handle(&TestMessage { value: 20 }, &context()).await.unwrap();
        filtered.handle(&TestMessage { value: 5 }, &context()).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(filtered.filter_name(), "value > 10");
    }

    #[tokio::test]
    async fn test_filtered_handler_for_destination() {
        let scope = Scope::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        let inner = FunctionHandler::new(move |_: ViewReady| {
            let sink = sink.clone();
            async move {
                sink.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let handler =
            FilteredHandler::for_destination(inner, RoutingTag::new("logs", scope.clone()));

        let mine = ViewReady {
            tag: RoutingTag::new("logs", scope.clone()),
        };
        let other_region = ViewReady {
            tag: RoutingTag::new("secrets", scope),
        };
        let other_scope = ViewReady {
            tag: RoutingTag::new("logs", Scope::new()),
        };

        for message in [&mine, &other_region, &other_scope] {
            handler.handle(message, &context()).await.unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_isolated_handler_reports_and_succeeds() {
        let failing = FunctionHandler::new(|_: TestMessage| async { Err(Error::handler("boom")) });
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let isolated = IsolatedHandler::new(failing, move |e: &Error| {
            sink.lock().unwrap().push(e.to_string());
        });

        isolated.handle(&TestMessage { value: 0 }, &context()).await.unwrap();
        assert_eq!(*reported.lock().unwrap(), vec!["Handler error: boom".to_string()]);
    }

    #[test]
    fn test_adapters_debug_output() {
        let inner = FunctionHandler::new(|_: TestMessage| async { Ok(()) }).named("audit");
        let filtered = FilteredHandler::new(inner, |m: &TestMessage| m.value > 10, "value > 10");
        let debug = format!("{:?}", filtered);
        assert!(debug.starts_with("FilteredHandler"));
        assert!(debug.contains("\"audit\""));
        assert!(debug.contains("value > 10"));

        let inner = FunctionHandler::new(|_: TestMessage| async { Ok(()) }).named("audit");
        let isolated = IsolatedHandler::new(inner, |_: &Error| {});
        let debug = format!("{:?}", isolated);
        assert!(debug.starts_with("IsolatedHandler"));
        assert!(debug.contains("FunctionHandler"));
        assert!(debug.ends_with(".. }"));
    }
}
