//! Isolation boundary for session-scoped messaging.
//!
//! A [`Scope`] is a cheap handle to a [`ScopeContext`]. Two scopes are
//! equal only when they point at the same context; two contexts are never
//! equal, even when they hold the same services.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

mod context;
pub use context::{ScopeContext, ScopeId};

/// Handle to one session's resolution context.
///
/// Clones share the context and compare equal. The scope is owned by
/// whatever created the session; the broker only keeps a weak reference
/// to it, so dropping every clone ends the session.
#[derive(Clone)]
pub struct Scope {
    context: Arc<ScopeContext>,
}

impl Scope {
    /// Create a scope over a fresh, empty context
    pub fn new() -> Self {
        Self::from_context(Arc::new(ScopeContext::new()))
    }

    /// Create a scope over a fresh context with a label
    pub fn with_label(label: impl Into<String>) -> Self {
        Self::from_context(Arc::new(ScopeContext::with_label(label)))
    }

    /// Wrap an existing context
    pub fn from_context(context: Arc<ScopeContext>) -> Self {
        Self { context }
    }

    /// Identifier of the underlying context
    pub fn id(&self) -> ScopeId {
        self.context.id()
    }

    /// Label of the underlying context
    pub fn label(&self) -> Option<&str> {
        self.context.label()
    }

    /// The resolution context
    pub fn context(&self) -> &Arc<ScopeContext> {
        &self.context
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeContext> {
        Arc::downgrade(&self.context)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.context).hash(state);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("label", &self.label())
            .finish()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "Scope '{}' ({})", label, self.id()),
            None => write!(f, "Scope {}", self.id()),
        }
    }
}
