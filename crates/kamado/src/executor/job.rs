use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{Error, Result};

/// A synchronous, blocking unit of work.
///
/// Implementations run on the executor's blocking worker, one at a time, so
/// they may freely touch resources that must never be used concurrently
/// (an accelerator, a loaded model).
pub trait Work: Send + 'static {
    /// The value produced on success
    type Output: Send + 'static;

    /// Runs the work to completion.
    fn run(self) -> anyhow::Result<Self::Output>;
}

/// Adapts a plain closure into [`Work`].
pub struct FnWork<F>(pub F);

impl<F, T> Work for FnWork<F>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn run(self) -> anyhow::Result<T> {
        (self.0)()
    }
}

/// # Job
///
/// A unit of [`Work`] paired with the single-assignment destination for its
/// outcome. Owned by the executor from submission until it has run.
pub(crate) struct Job<W: Work> {
    /// The work to perform
    work: W,

    /// Where the outcome is delivered; consumed when the job runs
    slot: oneshot::Sender<Result<W::Output>>,
}

impl<W: Work> Job<W> {
    pub(crate) fn new(work: W, slot: oneshot::Sender<Result<W::Output>>) -> Self {
        Self { work, slot }
    }
}

/// Type-erased view of a [`Job`] so jobs of different work types share one queue.
pub(crate) trait Runnable: Send {
    fn run(self: Box<Self>);
}

impl<W: Work> Runnable for Job<W> {
    fn run(self: Box<Self>) {
        let Job { work, slot } = *self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work.run())) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(error = %e, "job failed");
                Err(Error::from(e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "job panicked");
                Err(Error::Panicked(message))
            }
        };
        // the submitter may have gone away; its outcome is simply discarded
        let _ = slot.send(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// # JobHandle
///
/// A future resolving to the outcome of one submitted job.
///
/// The job is already queued when the handle is created; dropping the handle
/// does not withdraw it.
pub struct JobHandle<T> {
    /// The underlying channel receiver
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { receiver }
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
