//! Subscription handle for managing subscription lifecycle.

use crate::bus::TierKind;
use crate::executor::Executor;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Unique identifier of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The raw UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The part of a registry a handle needs, independent of the message type.
pub(crate) trait SubscriptionSlot: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

/// A handle to an active subscription.
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) (or the broker's `unsubscribe`) to
/// release the handler. The handle only holds a weak reference to its
/// registry, so it never keeps a scope's registries alive.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    name: Arc<str>,
    message_type: &'static str,
    tier: TierKind,
    slot: Weak<dyn SubscriptionSlot>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        name: Arc<str>,
        message_type: &'static str,
        tier: TierKind,
        slot: Weak<dyn SubscriptionSlot>,
    ) -> Self {
        Self {
            id,
            name,
            message_type,
            tier,
            slot,
        }
    }

    /// Get the subscription ID
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Get the subscription name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Message type this subscription listens to
    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// Tier the subscription lives in
    pub fn tier(&self) -> TierKind {
        self.tier
    }

    /// Remove the subscription.
    ///
    /// Returns `false` if it was already gone, which is not an error.
    pub fn unsubscribe(&self) -> bool {
        self.slot
            .upgrade()
            .map(|slot| slot.remove(self.id))
            .unwrap_or(false)
    }

    /// Check if this subscription is still registered
    pub fn is_active(&self) -> bool {
        self.slot
            .upgrade()
            .map(|slot| slot.contains(self.id))
            .unwrap_or(false)
    }
}

impl PartialEq for SubscriptionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriptionHandle {}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("message_type", &self.message_type)
            .field("tier", &self.tier)
            .finish()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription '{}' ({}) on {}", self.name, self.id, self.tier)
    }
}

/// Options applied when subscribing a handler
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub(crate) name: Option<String>,
    pub(crate) affinity: Option<Arc<dyn Executor>>,
}

impl SubscribeOptions {
    /// Default options: handler name, broker's default executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscription name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Run the handler on `executor` instead of the default one
    pub fn on(mut self, executor: Arc<dyn Executor>) -> Self {
        self.affinity = Some(executor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BackgroundExecutor;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSlot {
        ids: Mutex<HashSet<SubscriptionId>>,
    }

    impl SubscriptionSlot for FakeSlot {
        fn remove(&self, id: SubscriptionId) -> bool {
            self.ids.lock().unwrap().remove(&id)
        }

        fn contains(&self, id: SubscriptionId) -> bool {
            self.ids.lock().unwrap().contains(&id)
        }
    }

    fn handle_for(slot: &Arc<FakeSlot>) -> SubscriptionHandle {
        let id = SubscriptionId::new();
        slot.ids.lock().unwrap().insert(id);
        let slot: Arc<dyn SubscriptionSlot> = slot.clone();
        SubscriptionHandle::new(
            id,
            Arc::from("logs"),
            "CommandExecuting",
            TierKind::Global,
            Arc::downgrade(&slot),
        )
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let slot = Arc::new(FakeSlot::default());
        let handle = handle_for(&slot);

        assert!(handle.is_active());
        assert!(handle.unsubscribe());
        assert!(!handle.is_active());
        assert!(!handle.unsubscribe());
    }

    #[test]
    fn test_handle_outliving_registry() {
        let slot = Arc::new(FakeSlot::default());
        let handle = handle_for(&slot);
        drop(slot);

        assert!(!handle.is_active());
        assert!(!handle.unsubscribe());
    }

    #[test]
    fn test_display() {
        let slot = Arc::new(FakeSlot::default());
        let handle = handle_for(&slot);

        assert_eq!(
            handle.to_string(),
            format!("Subscription 'logs' ({}) on global", handle.id())
        );
        assert_eq!(handle.message_type(), "CommandExecuting");
    }

    #[test]
    fn test_subscribe_options() {
        let options = SubscribeOptions::new()
            .name("logs")
            .on(Arc::new(BackgroundExecutor::new().named("pool")));

        assert_eq!(options.name.as_deref(), Some("logs"));
        assert_eq!(options.affinity.unwrap().name(), "pool");
    }
}
