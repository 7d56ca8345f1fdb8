//! Default executor running handlers on the Tokio runtime.

use super::serial::on_serial_thread;
use super::{Executor, Task};
use crate::{Error, Result};
use std::sync::OnceLock;
use tokio::runtime::Handle;
use tracing::trace;

/// Runs each task as an independent Tokio task.
///
/// The executor binds to one runtime and keeps using it whoever submits:
/// the runtime it was created on, or else the runtime of the first submit.
/// The private runtime of a [`SerialExecutor`](super::SerialExecutor)
/// worker is never bound, so handlers published from a UI-bound handler
/// still leave the UI thread. Submitting before any runtime is bound fails
/// with [`Error::ExecutorUnavailable`].
#[derive(Debug, Clone)]
pub struct BackgroundExecutor {
    handle: OnceLock<Handle>,
    name: String,
}

impl BackgroundExecutor {
    /// Bind to the caller's runtime, or to the runtime of the first submit
    pub fn new() -> Self {
        let handle = OnceLock::new();
        if !on_serial_thread() {
            if let Ok(current) = Handle::try_current() {
                let _ = handle.set(current);
            }
        }

        Self {
            handle,
            name: "background".to_string(),
        }
    }

    /// Always spawn on the given runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: OnceLock::from(handle),
            name: "background".to_string(),
        }
    }

    /// Override the executor name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::ExecutorUnavailable {
            executor: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn runtime(&self) -> Result<Handle> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        if on_serial_thread() {
            return Err(self.unavailable(
                "no background runtime bound; create the executor inside a Tokio runtime",
            ));
        }

        let current = Handle::try_current().map_err(|e| self.unavailable(e.to_string()))?;
        Ok(self.handle.get_or_init(|| current).clone())
    }
}

impl Default for BackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for BackgroundExecutor {
    fn submit(&self, task: Task) -> Result<()> {
        let runtime = self.runtime()?;
        trace!(executor = %self.name, "Spawning handler task");
        runtime.spawn(task);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
