//! Single-thread executor for handlers that need thread affinity.

use super::{Executor, Task};
use crate::{Error, Result};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info};

thread_local! {
    static SERIAL_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is the worker thread of a [`SerialExecutor`].
pub(crate) fn on_serial_thread() -> bool {
    SERIAL_WORKER.with(Cell::get)
}

/// Configuration for a [`SerialExecutor`]
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Thread name, also used as the executor name
    pub name: String,

    /// Stack size of the worker thread
    pub stack_size: Option<usize>,
}

impl SerialConfig {
    /// Configuration with the given thread name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    /// Set the worker thread stack size
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("serial-executor")
    }
}

/// Runs tasks on one dedicated thread, starting them in submission order.
///
/// This models a UI dispatcher: every handler bound to the same executor
/// sees the same thread and never runs in parallel with another one. Tasks
/// interleave at their `.await` points, so a handler on this executor can
/// await a publish that dispatches back onto it.
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    thread_id: ThreadId,
    completed: Arc<AtomicU64>,
}

impl SerialExecutor {
    /// Start an executor on a new thread called `name`
    pub fn spawn(name: impl Into<String>) -> Result<Arc<Self>> {
        Self::with_config(SerialConfig::new(name))
    }

    /// Start an executor from a configuration
    pub fn with_config(config: SerialConfig) -> Result<Arc<Self>> {
        if config.name.trim().is_empty() {
            return Err(Error::ConfigError(
                "serial executor needs a thread name".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("failed to build serial runtime: {}", e)))?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        let completed = Arc::new(AtomicU64::new(0));
        let worker_completed = completed.clone();
        let worker_name = config.name.clone();

        let mut builder = std::thread::Builder::new().name(config.name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let worker = builder
            .spawn(move || {
                SERIAL_WORKER.with(|flag| flag.set(true));
                debug!(executor = %worker_name, "Serial executor started");

                let local = LocalSet::new();
                local.block_on(&runtime, async move {
                    while let Some(task) = receiver.recv().await {
                        let completed = worker_completed.clone();
                        tokio::task::spawn_local(async move {
                            task.await;
                            completed.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                });

                // Closed: finish whatever is still queued or suspended.
                runtime.block_on(local);

                debug!(executor = %worker_name, "Serial executor stopped");
            })
            .map_err(|e| Error::internal(format!("failed to spawn executor thread: {}", e)))?;

        info!(executor = %config.name, "Serial executor ready");

        Ok(Arc::new(Self {
            name: config.name,
            sender: Mutex::new(Some(sender)),
            thread_id: worker.thread().id(),
            completed,
        }))
    }

    /// The thread every task runs on
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Number of tasks run to completion
    pub fn tasks_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Stop accepting tasks.
    ///
    /// Tasks already queued still run; the thread exits once the queue is
    /// drained.
    pub fn close(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if sender.is_some() {
            debug!(executor = %self.name, "Closing serial executor");
        }
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Executor for SerialExecutor {
    fn submit(&self, task: Task) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);

        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| Error::ExecutorUnavailable {
                executor: self.name.clone(),
                reason: "worker thread stopped".to_string(),
            }),
            None => Err(Error::ExecutorUnavailable {
                executor: self.name.clone(),
                reason: "executor closed".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
