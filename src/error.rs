//! Error types for the tokio-broker library.

use thiserror::Error;

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tokio-broker
#[derive(Error, Debug)]
pub enum Error {
    /// A handler reported a failure while processing a message
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// A handler panicked while processing a message
    #[error("Handler '{handler}' panicked while handling {message_type}")]
    HandlerPanicked {
        /// Name of the subscription whose handler panicked
        handler: String,
        /// Readable name of the message being handled
        message_type: &'static str,
    },

    /// The publish was cancelled before every handler was dispatched
    #[error("Publish cancelled after {delivered} deliveries")]
    Cancelled {
        /// Handlers that completed before the cancellation was seen
        delivered: usize,
    },

    /// The executor refused the task
    #[error("Executor '{executor}' unavailable: {reason}")]
    ExecutorUnavailable {
        /// Name of the executor
        executor: String,
        /// Why the task was refused
        reason: String,
    },

    /// The executor dropped a task without running it to completion
    #[error("Executor '{executor}' dropped a handler task")]
    TaskDropped {
        /// Name of the executor
        executor: String,
    },

    /// A scoped service was resolved but never provided
    #[error("Service not registered in scope: {type_name}")]
    ServiceNotRegistered {
        /// Type name of the missing service
        type_name: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a new handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::HandlerError(msg.into())
    }

    /// Check if this error comes from a cancelled publish
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Check if this error is a fault raised by a handler
    pub fn is_handler_fault(&self) -> bool {
        matches!(
            self,
            Error::HandlerError(_) | Error::HandlerPanicked { .. }
        )
    }

    /// Check if this error comes from the dispatch machinery
    pub fn is_executor_error(&self) -> bool {
        matches!(
            self,
            Error::ExecutorUnavailable { .. } | Error::TaskDropped { .. }
        )
    }
}
