//! Core message traits and types.
//!
//! This module defines the `Message` trait that every payload routed
//! through the broker implements, plus the per-publish context handed
//! to handlers and the routing tags used for payload-level filtering.

use std::fmt::Debug;

pub mod context;
pub mod routing;

pub use context::{PublishContext, PublishReceipt};
pub use routing::{Routed, RoutingTag};

/// Core trait that all messages must implement.
///
/// The broker never looks inside a message; it only uses the concrete
/// type to find the registry that holds the subscribers for it. Messages
/// are shared between handlers, so they must be cloneable and thread-safe.
///
/// # Example
///
/// ```rust
/// use tokio_broker::Message;
///
/// #[derive(Debug, Clone)]
/// struct CommandExecuting {
///     command: String,
/// }
///
/// impl Message for CommandExecuting {}
/// ```
pub trait Message: Send + Sync + Clone + Debug + 'static {
    /// Returns a readable name for this message type.
    ///
    /// Only used in logs and errors. Defaults to the Rust type name.
    fn message_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct NamespaceChanged {
        _namespace: String,
    }

    impl Message for NamespaceChanged {}

    #[derive(Debug, Clone)]
    struct ContextChanged;

    impl Message for ContextChanged {
        fn message_type() -> &'static str {
            "ContextChanged"
        }
    }

    #[test]
    fn test_default_message_type_uses_type_name() {
        assert!(NamespaceChanged::message_type().ends_with("NamespaceChanged"));
    }

    #[test]
    fn test_message_type_override() {
        assert_eq!(ContextChanged::message_type(), "ContextChanged");
    }
}
