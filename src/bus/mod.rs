//! The two-tier broker facade.
//!
//! The [`Broker`] owns one global [`Tier`] for its whole lifetime and one
//! scoped tier per live [`Scope`]. Scoped tiers are keyed by scope identity
//! and only hold a weak reference to the scope's context, so the broker
//! never keeps a scope alive.

use crate::executor::Executor;
use crate::message::{Message, PublishReceipt};
use crate::registry::RegistrySettings;
use crate::scope::{Scope, ScopeContext, ScopeId};
use crate::subscription::{MessageHandler, SubscribeOptions, SubscriptionHandle};
use crate::Result;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub mod builder;
pub mod config;
pub mod publish;
pub mod tier;

pub use builder::BrokerBuilder;
pub use config::{BrokerConfig, DispatchMode};
pub use publish::PublishHandle;
pub use tier::{Tier, TierKind};

struct ScopedEntry {
    owner: Weak<ScopeContext>,
    tier: Arc<Tier>,
}

/// Type-indexed publish/subscribe broker with a global and a scoped tier.
///
/// Cloning is cheap and every clone shares the same registries.
///
/// # Example
///
/// ```rust,ignore
/// use tokio_broker::{Broker, Message, Scope};
///
/// #[derive(Debug, Clone)]
/// struct NamespaceChanged { namespace: String }
///
/// impl Message for NamespaceChanged {}
///
/// #[tokio::main]
/// async fn main() -> tokio_broker::Result<()> {
///     let broker = Broker::builder().build();
///     let session = Scope::with_label("cluster-a");
///
///     broker.scoped_subscribe(&session, |event: NamespaceChanged| async move {
///         println!("namespace is now {}", event.namespace);
///         Ok(())
///     })?;
///
///     broker
///         .scoped_publish(&session, NamespaceChanged { namespace: "prod".into() })
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Broker {
    config: BrokerConfig,
    default_executor: Arc<dyn Executor>,
    global: Arc<Tier>,
    scopes: Arc<DashMap<ScopeId, ScopedEntry>>,
}

impl Broker {
    /// Create a new Broker builder
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }

    pub(crate) fn from_parts(config: BrokerConfig, default_executor: Arc<dyn Executor>) -> Self {
        let global = Tier::new(
            RegistrySettings {
                default_executor: default_executor.clone(),
                dispatch: config.dispatch,
                tier: TierKind::Global,
            },
            config.type_capacity,
        );

        Self {
            scopes: Arc::new(DashMap::with_capacity(config.scope_capacity)),
            global: Arc::new(global),
            default_executor,
            config,
        }
    }

    /// Process-wide broker, built with defaults on first use
    pub fn shared() -> &'static Broker {
        static SHARED: OnceLock<Broker> = OnceLock::new();
        SHARED.get_or_init(|| Broker::builder().build())
    }

    /// The configuration the broker was built with
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Executor used by subscriptions without affinity
    pub fn default_executor(&self) -> &Arc<dyn Executor> {
        &self.default_executor
    }

    /// The global tier
    pub fn global(&self) -> &Arc<Tier> {
        &self.global
    }

    /// The tier of `scope`, created on first use.
    ///
    /// Creating a tier first drops the tiers of scopes whose context no
    /// longer exists.
    pub fn scope(&self, scope: &Scope) -> Arc<Tier> {
        if let Some(entry) = self.scopes.get(&scope.id()) {
            return entry.tier.clone();
        }

        self.prune_ended_scopes();

        let entry = self.scopes.entry(scope.id()).or_insert_with(|| {
            debug!(scope_id = %scope.id(), label = scope.label(), "Creating scoped tier");
            ScopedEntry {
                owner: scope.downgrade(),
                tier: Arc::new(Tier::new(
                    RegistrySettings {
                        default_executor: self.default_executor.clone(),
                        dispatch: self.config.dispatch,
                        tier: TierKind::Scoped(scope.id()),
                    },
                    self.config.type_capacity,
                )),
            }
        });

        entry.tier.clone()
    }

    fn existing_scope(&self, scope: &Scope) -> Option<Arc<Tier>> {
        self.scopes.get(&scope.id()).map(|entry| entry.tier.clone())
    }

    fn prune_ended_scopes(&self) {
        self.scopes.retain(|id, entry| {
            let alive = entry.owner.strong_count() > 0;
            if !alive {
                debug!(scope_id = %id, "Dropping registries of ended scope");
            }
            alive
        });
    }

    /// Drop every registry of `scope`.
    ///
    /// Its subscriptions are released and their handles become inactive.
    /// Using the scope again afterwards starts from empty registries.
    /// Returns `false` if the scope had no registries.
    pub fn end_scope(&self, scope: &Scope) -> bool {
        match self.scopes.remove(&scope.id()) {
            Some((id, entry)) => {
                entry.tier.clear();
                debug!(scope_id = %id, "Scope ended");
                true
            }
            None => false,
        }
    }

    /// Number of scopes with registries, including ended ones not yet pruned
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    // Global tier

    /// Publish on the global tier and wait for every handler
    pub async fn global_publish<M: Message>(&self, message: M) -> Result<PublishReceipt> {
        self.global.publish(message).await
    }

    /// Publish on the global tier without waiting
    pub fn global_publish_detached<M: Message>(&self, message: M) -> Result<PublishHandle> {
        self.global.publish_detached(message)
    }

    /// Subscribe a closure on the global tier
    pub fn global_subscribe<M, F, Fut>(&self, handler: F) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.global.subscribe(handler)
    }

    /// Subscribe a closure on the global tier with options
    pub fn global_subscribe_with<M, F, Fut>(
        &self,
        options: SubscribeOptions,
        handler: F,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.global.subscribe_with(options, handler)
    }

    /// Subscribe a handler object on the global tier
    pub fn global_subscribe_handler<M, H>(
        &self,
        handler: Arc<H>,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        H: MessageHandler<M>,
    {
        self.global.subscribe_handler_with(handler, options)
    }

    /// Release a global subscription
    pub fn global_unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.global.unsubscribe(handle)
    }

    /// Release the global subscription of `handler` for `M`
    pub fn global_unsubscribe_handler<M, H>(&self, handler: &Arc<H>) -> Result<bool>
    where
        M: Message,
        H: MessageHandler<M> + ?Sized,
    {
        self.global.unsubscribe_handler::<M, H>(handler)
    }

    // Scoped tier

    /// Publish on the tier of `scope` and wait for every handler.
    ///
    /// A scope nothing ever subscribed on gets an empty receipt and no tier.
    pub async fn scoped_publish<M: Message>(
        &self,
        scope: &Scope,
        message: M,
    ) -> Result<PublishReceipt> {
        trace!(scope_id = %scope.id(), message_type = M::message_type(), "Scoped publish");
        match self.existing_scope(scope) {
            Some(tier) => tier.publish(message).await,
            None => Ok(PublishReceipt::empty(M::message_type())),
        }
    }

    /// Publish on the tier of `scope` without waiting
    pub fn scoped_publish_detached<M: Message>(
        &self,
        scope: &Scope,
        message: M,
    ) -> Result<PublishHandle> {
        match self.existing_scope(scope) {
            Some(tier) => tier.publish_detached(message),
            None => {
                let receipt = PublishReceipt::empty(M::message_type());
                PublishHandle::spawn(
                    &self.default_executor,
                    async move { Ok(receipt) },
                    CancellationToken::new(),
                )
            }
        }
    }

    /// Subscribe a closure on the tier of `scope`
    pub fn scoped_subscribe<M, F, Fut>(&self, scope: &Scope, handler: F) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.scope(scope).subscribe(handler)
    }

    /// Subscribe a closure on the tier of `scope` with options
    pub fn scoped_subscribe_with<M, F, Fut>(
        &self,
        scope: &Scope,
        options: SubscribeOptions,
        handler: F,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.scope(scope).subscribe_with(options, handler)
    }

    /// Subscribe a handler object on the tier of `scope`
    pub fn scoped_subscribe_handler<M, H>(
        &self,
        scope: &Scope,
        handler: Arc<H>,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle>
    where
        M: Message,
        H: MessageHandler<M>,
    {
        self.scope(scope).subscribe_handler_with(handler, options)
    }

    /// Release a subscription made on the tier of `scope`
    pub fn scoped_unsubscribe(&self, scope: &Scope, handle: SubscriptionHandle) -> bool {
        self.existing_scope(scope)
            .map(|tier| tier.unsubscribe(handle))
            .unwrap_or(false)
    }

    /// Release the subscription of `handler` for `M` on the tier of `scope`
    pub fn scoped_unsubscribe_handler<M, H>(&self, scope: &Scope, handler: &Arc<H>) -> Result<bool>
    where
        M: Message,
        H: MessageHandler<M> + ?Sized,
    {
        match self.existing_scope(scope) {
            Some(tier) => tier.unsubscribe_handler::<M, H>(handler),
            None => Ok(false),
        }
    }

    /// Get statistics about the broker
    pub fn stats(&self) -> BrokerStats {
        let mut live_scopes = 0;
        let mut scoped_subscriptions = 0;
        for entry in self.scopes.iter() {
            if entry.owner.strong_count() > 0 {
                live_scopes += 1;
                scoped_subscriptions += entry.tier.total_subscriptions();
            }
        }

        BrokerStats {
            global_message_types: self.global.message_types().len(),
            global_subscriptions: self.global.total_subscriptions(),
            live_scopes,
            scoped_subscriptions,
        }
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("default_executor", &self.default_executor.name())
            .field("global", &self.global)
            .field("scopes", &self.scopes.len())
            .finish()
    }
}

/// Statistics about the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerStats {
    /// Message types with global subscribers
    pub global_message_types: usize,

    /// Subscriptions on the global tier
    pub global_subscriptions: usize,

    /// Scopes that still exist and have registries
    pub live_scopes: usize,

    /// Subscriptions across the tiers of live scopes
    pub scoped_subscriptions: usize,
}

impl fmt::Display for BrokerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Broker Stats: {} global subscriptions over {} message types, {} scoped subscriptions in {} scopes",
            self.global_subscriptions,
            self.global_message_types,
            self.scoped_subscriptions,
            self.live_scopes
        )
    }
}
