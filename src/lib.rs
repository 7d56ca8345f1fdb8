//! # tokio-broker
//!
//! A type-indexed publish/subscribe broker for Tokio applications whose
//! modules talk to each other through messages.
//!
//! ## Features
//!
//! - **Two tiers**: a process-wide global tier and one tier per [`Scope`]
//! - **Snapshot publish**: subscriptions changed during a publish only affect the next one
//! - **Executor affinity**: pin a handler to a thread such as a UI loop
//! - **Sequential dispatch**: handlers run in subscription order and a fault stops the rest
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tokio_broker::{Broker, Message};
//!
//! #[derive(Debug, Clone)]
//! struct CommandExecuting {
//!     command: String,
//! }
//!
//! impl Message for CommandExecuting {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::builder().build();
//!
//!     let handle = broker.global_subscribe(|event: CommandExecuting| async move {
//!         println!("> {}", event.command);
//!         Ok(())
//!     })?;
//!
//!     broker
//!         .global_publish(CommandExecuting {
//!             command: "kubectl get pods".to_string(),
//!         })
//!         .await?;
//!
//!     broker.global_unsubscribe(handle);
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Message trait, publish context and routing tags
pub mod message;

/// Error types and result aliases
pub mod error;

/// Scopes and their service contexts
pub mod scope;

/// Execution contexts handlers can be pinned to
pub mod executor;

/// Subscriptions, handles and handler adapters
pub mod subscription;

/// Per message type registries
pub mod registry;

/// The broker facade and its tiers
pub mod bus;

pub use bus::{
    Broker, BrokerBuilder, BrokerConfig, BrokerStats, DispatchMode, PublishHandle, Tier, TierKind,
};
pub use error::{Error, Result};
pub use executor::{BackgroundExecutor, Executor, SerialConfig, SerialExecutor, Task};
pub use message::{Message, PublishContext, PublishReceipt, Routed, RoutingTag};
pub use registry::TypeRegistry;
pub use scope::{Scope, ScopeContext, ScopeId};
pub use subscription::{
    FilteredHandler, FunctionHandler, IsolatedHandler, MessageHandler, SubscribeOptions,
    SubscriptionHandle, SubscriptionId,
};

/// Prelude module for convenient imports
///
/// # Example
/// ```rust
/// use tokio_broker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bus::{Broker, BrokerBuilder, DispatchMode};
    pub use crate::error::{Error, Result};
    pub use crate::executor::{BackgroundExecutor, Executor, SerialExecutor};
    pub use crate::message::{Message, PublishContext, Routed, RoutingTag};
    pub use crate::scope::Scope;
    pub use crate::subscription::{MessageHandler, SubscribeOptions, SubscriptionHandle};
}
