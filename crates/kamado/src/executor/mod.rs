//! # Serialized Executor
//!
//! Runs blocking units of work one at a time, in submission order, on tokio's
//! blocking pool.
//!
//! The executor is the only gate in front of the accelerator: because no two
//! jobs ever overlap, the model behind them needs no lock of its own.
//!
//! ## Worker lifecycle
//!
//! No background task exists while the queue is empty. Submitting to an idle
//! executor spawns a worker, which drains the queue until it observes it
//! empty, yields once to pick up back-to-back submissions, and then exits.
//! Observing the empty queue and clearing the active flag happen under the
//! same lock, so a submission can never be left behind without a worker.

mod job;

pub use job::{FnWork, JobHandle, Work};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use job::{Job, Runnable};

/// Queue and worker flag shared by every clone of an executor.
#[derive(Default)]
struct ExecutorState {
    /// Jobs waiting to run, oldest first
    queue: VecDeque<Box<dyn Runnable>>,

    /// True while a worker is draining `queue`
    active: bool,
}

/// Serializes blocking work onto a single logical worker.
///
/// Cloning is cheap and every clone feeds the same queue, which is how several
/// coordinators share one accelerator.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Default)]
pub struct SerializedExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl SerializedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `work` and returns a handle resolving to its outcome.
    ///
    /// The job is enqueued before this function returns, so FIFO order is the
    /// order of `submit` calls rather than the order the handles are awaited.
    ///
    /// # Errors
    ///
    /// The handle yields [`Error::Job`](crate::Error::Job) or
    /// [`Error::Panicked`](crate::Error::Panicked) when the work fails. Other
    /// queued jobs are unaffected.
    pub fn submit<W: Work>(&self, work: W) -> JobHandle<W::Output> {
        let (tx, rx) = oneshot::channel();
        let start_worker = {
            let mut state = lock(&self.state);
            state.queue.push_back(Box::new(Job::new(work, tx)));
            trace!(pending = state.queue.len(), "job queued");
            !std::mem::replace(&mut state.active, true)
        };

        if start_worker {
            tokio::spawn(drain(self.state.clone()));
        }
        JobHandle::new(rx)
    }

    /// Convenience for submitting a closure.
    pub fn submit_fn<F, T>(&self, f: F) -> JobHandle<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(FnWork(f))
    }

    /// Whether a worker is currently draining the queue.
    pub fn is_running(&self) -> bool {
        lock(&self.state).active
    }

    /// Number of jobs queued but not yet started.
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

fn lock(state: &Mutex<ExecutorState>) -> MutexGuard<'_, ExecutorState> {
    // jobs never run under this lock, so a poisoned guard still holds consistent state
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Worker body: runs queued jobs one at a time until the queue is empty.
async fn drain(state: Arc<Mutex<ExecutorState>>) {
    debug!("executor worker started");
    loop {
        let next = lock(&state).queue.pop_front();
        let job = match next {
            Some(job) => job,
            None => {
                tokio::task::yield_now().await;
                let mut guard = lock(&state);
                match guard.queue.pop_front() {
                    Some(job) => job,
                    None => {
                        guard.active = false;
                        break;
                    }
                }
            }
        };

        if let Err(e) = tokio::task::spawn_blocking(move || job.run()).await {
            // only reachable when the runtime cancels the blocking task on shutdown
            warn!(error = %e, "job did not run to completion");
        }
    }
    debug!("executor worker stopped");
}
