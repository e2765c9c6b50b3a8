//! Bounded worker pool
//!
//! A global semaphore caps how many tasks run at once. Submitting never
//! blocks the caller: each task waits for its own permit, racing the run's
//! cancellation token.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a task produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task cancelled before it started")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),
}

/// Runs at most `size` futures concurrently
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

/// Handle to one submitted task
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Option<T>>,
}

impl WorkerPool {
    /// Creates a pool with a fixed number of workers
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum number of concurrently running tasks (at least 1)
    /// * `cancel` - Tasks still waiting for a permit give up when this fires
    pub fn new(size: usize, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size.max(1))),
            cancel,
        }
    }

    /// Schedules a future on the pool
    ///
    /// The future only starts once a permit is free and holds the permit
    /// until it completes.
    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();

        let inner = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                permit = semaphore.acquire_owned() => permit.ok()?,
            };
            Some(task.await)
        });

        TaskHandle { inner }
    }
}

impl<T> TaskHandle<T> {
    /// Waits for the task and returns its value
    ///
    /// A panic inside the task is reported here and does not affect other
    /// tasks of the pool.
    pub async fn join(self) -> Result<T, TaskError> {
        match self.inner.await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(TaskError::Cancelled),
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(TaskError::Panicked(message))
            }
            Err(_) => Err(TaskError::Cancelled),
        }
    }
}
