use std::sync::Arc;

use crate::executor::Work;

/// Runs one sealed batch.
///
/// Called with every item of an epoch, in the order the contributors joined,
/// and expected to return exactly one outcome per item in that same order:
/// outcome `i` is delivered to contributor `i`. Returning an error fails the
/// whole batch; every contributor receives that error.
///
/// The call is synchronous and runs on the executor's blocking worker, never
/// concurrently with another batch sharing the same executor.
///
/// Any `Fn(Vec<I>) -> anyhow::Result<Vec<O>>` closure is a handler.
///
/// ```rust
/// use kamado::BatchHandler;
///
/// let double = |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
///     Ok(items.into_iter().map(|i| i * 2).collect())
/// };
/// assert_eq!(double.run_batch(vec![1, 2, 3]).unwrap(), vec![2, 4, 6]);
/// ```
pub trait BatchHandler<I, O>: Send + Sync + 'static {
    fn run_batch(&self, items: Vec<I>) -> anyhow::Result<Vec<O>>;
}

impl<I, O, F> BatchHandler<I, O> for F
where
    F: Fn(Vec<I>) -> anyhow::Result<Vec<O>> + Send + Sync + 'static,
{
    fn run_batch(&self, items: Vec<I>) -> anyhow::Result<Vec<O>> {
        self(items)
    }
}

/// A sealed epoch's items packaged as one executor job.
pub(crate) struct BatchJob<I, O> {
    pub(crate) items: Vec<I>,
    pub(crate) handler: Arc<dyn BatchHandler<I, O>>,
}

impl<I, O> Work for BatchJob<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = Vec<O>;

    fn run(self) -> anyhow::Result<Vec<O>> {
        self.handler.run_batch(self.items)
    }
}
