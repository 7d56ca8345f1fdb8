//! Execution contexts for message handlers.
//!
//! An [`Executor`] decides *where* a handler runs. The registry never
//! knows about UI threads or runtimes; it hands each handler invocation to
//! the executor bound to the subscription (or the broker's default) and
//! awaits the result.

use crate::Result;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::Arc;

mod background;
mod serial;

pub use background::BackgroundExecutor;
pub use serial::{SerialConfig, SerialExecutor};

/// A unit of work submitted to an executor.
///
/// Tasks never return a value; the registry collects handler results
/// through its own channel.
pub type Task = BoxFuture<'static, ()>;

/// Capability to run tasks on a specific execution context.
///
/// Implementations must eventually poll every accepted task to
/// completion, or drop it (which the publisher observes as
/// [`Error::TaskDropped`](crate::Error::TaskDropped)). Executors that
/// serialize work, such as a UI thread, run tasks one at a time in
/// submission order.
pub trait Executor: Send + Sync + Debug {
    /// Queue a task for execution
    fn submit(&self, task: Task) -> Result<()>;

    /// Name used in logs and errors
    fn name(&self) -> &str;
}

/// Identity of a shared executor, used to group subscriptions.
pub(crate) fn executor_key(executor: &Arc<dyn Executor>) -> usize {
    Arc::as_ptr(executor) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_key_follows_allocation() {
        let a: Arc<dyn Executor> = Arc::new(BackgroundExecutor::new());
        let b: Arc<dyn Executor> = Arc::new(BackgroundExecutor::new());

        assert_eq!(executor_key(&a), executor_key(&a.clone()));
        assert_ne!(executor_key(&a), executor_key(&b));
    }
}
