use crate::core::{Context, MqError, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Level, event};

/// Fixed-size task pool
///
/// At most `size` submitted tasks run at once; the rest wait for a slot. Stopping the
/// pool abandons waiting tasks and waits for the running ones.
pub struct WorkerPool {
    size: usize,
    /// Execution slots
    permits: Arc<Semaphore>,
    /// Every task submitted and not yet finished
    tasks: TaskTracker,
    /// Number of calls to `stop` that actually stopped the pool
    stops: AtomicUsize,
}

impl WorkerPool {
    /// Creates a pool running at most `size` tasks concurrently (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            tasks: TaskTracker::new(),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues a task.
    ///
    /// The handle resolves to `None` if the pool was stopped before the task got a slot.
    pub fn submit<F>(&self, task: F) -> Result<JoinHandle<Option<F::Output>>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.submit_with(&Context::background(), task)
    }

    /// Queues a task that gives up waiting for a slot once `ctx` is done.
    ///
    /// The handle resolves to `None` if the pool was stopped or `ctx` ended before the
    /// task got a slot. A task that already holds a slot is not interrupted.
    pub fn submit_with<F>(&self, ctx: &Context, task: F) -> Result<JoinHandle<Option<F::Output>>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.tasks.is_closed() {
            return Err(MqError::PoolStopped);
        }

        let permits = Arc::clone(&self.permits);
        let ctx = ctx.clone();
        Ok(self.tasks.spawn(async move {
            let _permit = tokio::select! {
                biased;
                permit = permits.acquire_owned() => permit.ok()?,
                _ = ctx.done() => return None,
            };
            Some(task.await)
        }))
    }

    /// Stops the pool and waits for running tasks to finish.
    ///
    /// Only the first call has an effect; later calls return immediately.
    pub async fn stop(&self) {
        if !self.tasks.close() {
            return;
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.permits.close();
        self.tasks.wait().await;
        event!(Level::DEBUG, size = self.size, "worker pool stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.tasks.is_closed()
    }

    /// How many times the pool has actually been stopped (0 or 1).
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let running = if self.permits.is_closed() {
            0
        } else {
            self.size.saturating_sub(self.permits.available_permits())
        };
        let tracked = self.tasks.len();

        PoolStats {
            size: self.size,
            running,
            pending: tracked.saturating_sub(running),
            stopped: self.is_stopped(),
            stops: self.stops(),
        }
    }
}

/// Worker pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub running: usize,
    pub pending: usize,
    pub stopped: bool,
    /// Effective `stop` calls, never more than one
    pub stops: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} running, {} pending{}",
            self.running,
            self.size,
            self.pending,
            if self.stopped { ", stopped" } else { "" }
        )
    }
}
