//! Resolution context backing a [`Scope`](super::Scope).

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Identifier of a scope, stable for the lifetime of its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The raw UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Services registered for one session.
///
/// Registration is explicit: whoever builds the session calls
/// [`provide`](Self::provide) for each collaborator, and scoped
/// components look them up by type with [`resolve`](Self::resolve).
pub struct ScopeContext {
    id: ScopeId,
    label: Option<String>,
    created_at: DateTime<Utc>,
    services: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ScopeContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            id: ScopeId::new(),
            label: None,
            created_at: Utc::now(),
            services: DashMap::new(),
        }
    }

    /// Create an empty context with a label used in logs
    pub fn with_label(label: impl Into<String>) -> Self {
        let mut context = Self::new();
        context.label = Some(label.into());
        context
    }

    /// Context identifier
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Optional label
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Register a service, returning the one it replaces
    pub fn provide<T: Send + Sync + 'static>(&self, service: T) -> Option<Arc<T>> {
        self.provide_shared(Arc::new(service))
    }

    /// Register an already shared service, returning the one it replaces
    pub fn provide_shared<T: Send + Sync + 'static>(&self, service: Arc<T>) -> Option<Arc<T>> {
        trace!(
            scope_id = %self.id,
            service = std::any::type_name::<T>(),
            "Providing scoped service"
        );

        self.services
            .insert(TypeId::of::<T>(), service)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Look up a service by type
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let service = self.services.get(&TypeId::of::<T>())?.value().clone();
        service.downcast::<T>().ok()
    }

    /// Look up a service that must have been provided
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>().ok_or(Error::ServiceNotRegistered {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Whether a service of type `T` was provided
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }
}

impl Default for ScopeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("services", &self.services.len())
            .finish()
    }
}
