//! Handle to a publish running in the background.

use crate::executor::Executor;
use crate::message::PublishReceipt;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A publish started with `publish_detached`.
///
/// Await it to get the outcome, or drop it: the publish keeps running and
/// any handler fault is only logged.
pub struct PublishHandle {
    outcome: oneshot::Receiver<Result<PublishReceipt>>,
    finished: Arc<AtomicBool>,
    executor: String,
    cancellation: CancellationToken,
}

impl PublishHandle {
    /// Run `publish` on `executor`, the broker's default one.
    pub(crate) fn spawn<F>(
        executor: &Arc<dyn Executor>,
        publish: F,
        cancellation: CancellationToken,
    ) -> Result<Self>
    where
        F: Future<Output = Result<PublishReceipt>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();

        trace!(executor = executor.name(), "Spawning detached publish");
        executor.submit(Box::pin(async move {
            let outcome = publish.await;
            done.store(true, Ordering::Release);
            let _ = tx.send(outcome);
        }))?;

        Ok(Self {
            outcome: rx,
            finished,
            executor: executor.name().to_owned(),
            cancellation,
        })
    }

    /// Ask the publish to stop before its next handler
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the publish has completed
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// The token driving the publish
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl Future for PublishHandle {
    type Output = Result<PublishReceipt>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::TaskDropped {
                executor: self.executor.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for PublishHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishHandle")
            .field("executor", &self.executor)
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
