//! TypeId-keyed table of registries for one tier.

use super::{RegistrySettings, TypeRegistry};
use crate::message::Message;
use crate::{Error, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::trace;

/// Operations on a registry that do not need its message type.
pub(crate) trait ErasedRegistry: Send + Sync {
    fn message_type(&self) -> &'static str;
    fn subscription_count(&self) -> usize;
    fn clear(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<M: Message> ErasedRegistry for TypeRegistry<M> {
    fn message_type(&self) -> &'static str {
        M::message_type()
    }

    fn subscription_count(&self) -> usize {
        self.len()
    }

    fn clear(&self) {
        TypeRegistry::clear(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// One registry per message type, created on first use.
pub(crate) struct RegistryTable {
    registries: DashMap<TypeId, Arc<dyn ErasedRegistry>>,
    settings: RegistrySettings,
}

impl RegistryTable {
    pub(crate) fn new(settings: RegistrySettings, capacity: usize) -> Self {
        Self {
            registries: DashMap::with_capacity(capacity),
            settings,
        }
    }

    /// The registry for `M`, created if this is the first use of `M`.
    pub(crate) fn get_or_create<M: Message>(&self) -> Result<Arc<TypeRegistry<M>>> {
        let erased = self
            .registries
            .entry(TypeId::of::<M>())
            .or_insert_with(|| {
                trace!(
                    message_type = M::message_type(),
                    tier = %self.settings.tier,
                    "Creating type registry"
                );
                Arc::new(TypeRegistry::<M>::new(self.settings.clone())) as Arc<dyn ErasedRegistry>
            })
            .value()
            .clone();

        Self::downcast(erased)
    }

    /// The registry for `M`, if `M` was ever used on this table.
    pub(crate) fn get<M: Message>(&self) -> Result<Option<Arc<TypeRegistry<M>>>> {
        let erased = self
            .registries
            .get(&TypeId::of::<M>())
            .map(|entry| entry.value().clone());

        erased.map(Self::downcast).transpose()
    }

    fn downcast<M: Message>(erased: Arc<dyn ErasedRegistry>) -> Result<Arc<TypeRegistry<M>>> {
        erased
            .into_any()
            .downcast::<TypeRegistry<M>>()
            .map_err(|_| {
                Error::internal(format!(
                    "registry stored for {} has a different message type",
                    M::message_type()
                ))
            })
    }

    pub(crate) fn subscription_count<M: Message>(&self) -> usize {
        self.registries
            .get(&TypeId::of::<M>())
            .map(|entry| entry.subscription_count())
            .unwrap_or(0)
    }

    /// Names of the message types with at least one subscription
    pub(crate) fn message_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self
            .registries
            .iter()
            .filter(|entry| entry.subscription_count() > 0)
            .map(|entry| entry.message_type())
            .collect();
        types.sort_unstable();
        types
    }

    pub(crate) fn total_subscriptions(&self) -> usize {
        self.registries
            .iter()
            .map(|entry| entry.subscription_count())
            .sum()
    }

    /// Drop every subscription and forget every registry.
    ///
    /// Handles issued earlier become inactive.
    pub(crate) fn clear(&self) {
        let registries: Vec<_> = self
            .registries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.registries.clear();

        for registry in registries {
            registry.clear();
        }
    }
}

impl std::fmt::Debug for RegistryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryTable")
            .field("tier", &self.settings.tier)
            .field("message_types", &self.registries.len())
            .field("subscriptions", &self.total_subscriptions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{DispatchMode, TierKind};
    use crate::executor::BackgroundExecutor;
    use crate::subscription::{FunctionHandler, MessageHandler, SubscribeOptions};

    #[derive(Debug, Clone)]
    struct Alpha;
    impl Message for Alpha {
        fn message_type() -> &'static str {
            "Alpha"
        }
    }

    #[derive(Debug, Clone)]
    struct Beta;
    impl Message for Beta {
        fn message_type() -> &'static str {
            "Beta"
        }
    }

    fn table() -> RegistryTable {
        RegistryTable::new(
            RegistrySettings {
                default_executor: Arc::new(BackgroundExecutor::new()),
                dispatch: DispatchMode::Sequential,
                tier: TierKind::Global,
            },
            4,
        )
    }

    fn noop<M: Message>() -> Arc<dyn MessageHandler<M>> {
        Arc::new(FunctionHandler::new(|_: M| async { Ok(()) }))
    }

    #[test]
    fn test_one_registry_per_type() {
        let table = table();
        let first = table.get_or_create::<Alpha>().unwrap();
        let second = table.get_or_create::<Alpha>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(table.get::<Beta>().unwrap().is_none());
        table.get_or_create::<Beta>().unwrap();
        assert!(table.get::<Beta>().unwrap().is_some());
    }

    #[test]
    fn test_counts_and_types() {
        let table = table();
        let alpha = table.get_or_create::<Alpha>().unwrap();
        alpha.subscribe(noop::<Alpha>(), SubscribeOptions::new());
        alpha.subscribe(noop::<Alpha>(), SubscribeOptions::new());
        table.get_or_create::<Beta>().unwrap();

        assert_eq!(table.subscription_count::<Alpha>(), 2);
        assert_eq!(table.subscription_count::<Beta>(), 0);
        assert_eq!(table.total_subscriptions(), 2);
        assert_eq!(table.message_types(), vec!["Alpha"]);
    }

    #[test]
    fn test_clear_deactivates_handles() {
        let table = table();
        let handle = table
            .get_or_create::<Alpha>()
            .unwrap()
            .subscribe(noop::<Alpha>(), SubscribeOptions::new());

        table.clear();
        assert!(!handle.is_active());
        assert_eq!(table.total_subscriptions(), 0);
    }
}
