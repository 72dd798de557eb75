use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use super::epoch::{Epoch, SealedEpoch};
use super::handler::{BatchHandler, BatchJob};
use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::executor::SerializedExecutor;

/// What sealed an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Size,
    Deadline,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Size => "size",
            Trigger::Deadline => "deadline",
        }
    }
}

/// How a contributor took part in its epoch.
enum Role {
    /// Filled the epoch and sealed it
    Flusher,
    /// Opened the epoch; owns its deadline
    First(u64),
    /// Joined an epoch that already had a deadline
    Joiner,
}

/// # BatchCoordinator
///
/// Groups concurrently arriving items into batches and runs each batch as a
/// single job on a [`SerializedExecutor`].
///
/// Items join the currently open epoch. The epoch is sealed, and a fresh one
/// opened in its place, either when it reaches `max_batch_size` items or when
/// `max_wait` has elapsed since its first item arrived. The sealed items are
/// passed to the [`BatchHandler`] in join order and each contributor receives
/// the outcome at its own index. A failed batch fails every contributor with
/// the same error.
///
/// Joining an epoch cannot be undone: a caller that stops waiting still
/// occupies its slot and its outcome is discarded.
///
/// # Example
///
/// ```rust
/// # use std::time::Duration;
/// use kamado::{BatchConfig, BatchCoordinator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> kamado::Result<()> {
/// let config = BatchConfig::new(8, Duration::from_millis(20))?;
/// let coordinator = BatchCoordinator::new(config, |prompts: Vec<String>| -> anyhow::Result<Vec<usize>> {
///     Ok(prompts.into_iter().map(|p| p.len()).collect())
/// });
///
/// let (a, b) = tokio::join!(
///     coordinator.enqueue("a cat".to_string()),
///     coordinator.enqueue("a dog on a bike".to_string()),
/// );
/// assert_eq!(a?, 5);
/// assert_eq!(b?, 15);
/// # Ok(())
/// # }
/// ```
pub struct BatchCoordinator<I, O> {
    inner: Arc<Inner<I, O>>,
}

impl<I, O> Clone for BatchCoordinator<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<I, O> {
    config: BatchConfig,
    handler: Arc<dyn BatchHandler<I, O>>,
    executor: SerializedExecutor,

    /// The single open epoch. Only ever locked for synchronous bookkeeping.
    open: Mutex<Epoch<I, O>>,
}

impl<I, O> BatchCoordinator<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Creates a coordinator with its own executor.
    pub fn new<H>(config: BatchConfig, handler: H) -> Self
    where
        H: BatchHandler<I, O>,
    {
        Self::with_executor(config, handler, SerializedExecutor::new())
    }

    /// Creates a coordinator that submits its batches to `executor`.
    ///
    /// Coordinators sharing an executor never run their batches concurrently.
    pub fn with_executor<H>(config: BatchConfig, handler: H, executor: SerializedExecutor) -> Self
    where
        H: BatchHandler<I, O>,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                handler: Arc::new(handler),
                executor,
                open: Mutex::new(Epoch::open(0)),
            }),
        }
    }

    /// Adds `item` to the open epoch and waits for its share of the batch outcome.
    ///
    /// # Errors
    ///
    /// Whatever error the batch containing `item` failed with, or
    /// [`Error::OutcomeMismatch`] if the handler broke the one-outcome-per-item
    /// contract.
    pub async fn enqueue(&self, item: I) -> Result<O> {
        let (index, reader, role) = {
            let mut open = self.inner.lock_open();
            let index = open.push(item);
            let reader = open.reader();
            let role = if open.len() >= self.inner.config.max_batch_size() {
                self.inner.seal(&mut open, Trigger::Size);
                Role::Flusher
            } else if index == 0 {
                Role::First(open.id())
            } else {
                Role::Joiner
            };
            (index, reader, role)
        };

        match role {
            Role::First(epoch) => self.inner.clone().schedule_deadline(epoch),
            Role::Flusher => trace!(index, "contributor sealed its epoch"),
            Role::Joiner => {}
        }

        let outcomes = reader.wait().await??;
        outcomes.get(index).cloned().ok_or(Error::OutcomeMismatch {
            expected: index + 1,
            actual: outcomes.len(),
        })
    }

    /// Flushes epoch `epoch` if it is still the open epoch and holds items.
    ///
    /// This is what a deferred flush runs when its timer fires. Returns `false`
    /// without doing anything when the epoch was already sealed by the size
    /// trigger (a stale deadline) or is empty.
    pub fn fire_deadline(&self, epoch: u64) -> bool {
        self.inner.fire_deadline(epoch)
    }

    /// Identifier of the currently open epoch.
    pub fn current_epoch(&self) -> u64 {
        self.inner.lock_open().id()
    }

    /// Number of items waiting in the open epoch.
    pub fn open_len(&self) -> usize {
        self.inner.lock_open().len()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }
}

impl<I, O> Inner<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn lock_open(&self) -> MutexGuard<'_, Epoch<I, O>> {
        // nothing that can panic runs under this lock, so the epoch is intact either way
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_deadline(self: Arc<Self>, epoch: u64) {
        let wait = self.config.max_wait();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            self.fire_deadline(epoch);
        });
    }

    fn fire_deadline(&self, epoch: u64) -> bool {
        let mut open = self.lock_open();
        if open.id() != epoch || open.is_empty() {
            trace!(epoch, current = open.id(), "stale deadline ignored");
            return false;
        }
        self.seal(&mut open, Trigger::Deadline);
        true
    }

    /// Replaces the open epoch with its successor and submits the sealed one.
    ///
    /// Runs with the epoch lock held, so epochs reach the executor in the
    /// order they were sealed.
    fn seal(&self, open: &mut Epoch<I, O>, trigger: Trigger) {
        let successor = Epoch::open(open.id() + 1);
        let sealed = std::mem::replace(open, successor).seal();
        debug!(
            epoch = sealed.id,
            size = sealed.items.len(),
            trigger = trigger.as_str(),
            "epoch sealed"
        );
        self.flush(sealed);
    }

    fn flush(&self, sealed: SealedEpoch<I, O>) {
        let SealedEpoch { id, items, writer } = sealed;
        let expected = items.len();
        let handle = self.executor.submit(BatchJob {
            items,
            handler: self.handler.clone(),
        });

        // resolved from its own task so a contributor going away cannot strand the epoch
        tokio::spawn(async move {
            let outcome = match handle.await {
                Ok(outcomes) if outcomes.len() == expected => Ok(Arc::new(outcomes)),
                Ok(outcomes) => Err(Error::OutcomeMismatch {
                    expected,
                    actual: outcomes.len(),
                }),
                Err(e) => Err(e),
            };
            match &outcome {
                Ok(_) => debug!(epoch = id, size = expected, "epoch resolved"),
                Err(e) => warn!(epoch = id, error = %e, "batch failed"),
            }
            writer.resolve(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn config(size: usize, wait_ms: u64) -> BatchConfig {
        BatchConfig::new(size, Duration::from_millis(wait_ms)).unwrap()
    }

    /// Handler echoing `item * 10` and recording every batch it sees.
    fn recording(batches: Arc<std::sync::Mutex<Vec<Vec<u32>>>>) -> impl BatchHandler<u32, u32> {
        move |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            batches.lock().unwrap().push(items.clone());
            Ok(items.into_iter().map(|i| i * 10).collect())
        }
    }

    #[tokio::test]
    async fn test_size_triggered_flush() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(2, 5000), recording(batches.clone()));
        let start = Instant::now();

        let (a, b) = tokio::join!(coordinator.enqueue(1), coordinator.enqueue(2));

        assert_eq!(a.unwrap(), 10);
        assert_eq!(b.unwrap(), 20);
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2]]);
        assert_eq!(coordinator.current_epoch(), 1);
    }

    #[tokio::test]
    async fn test_timer_triggered_flush() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(4, 100), recording(batches.clone()));
        let start = Instant::now();

        let result = coordinator.enqueue(7).await;

        assert_eq!(result.unwrap(), 70);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(*batches.lock().unwrap(), vec![vec![7]]);
        assert_eq!(coordinator.current_epoch(), 1);
        assert_eq!(coordinator.open_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_correctness() {
        let coordinator = BatchCoordinator::new(config(3, 1000), |items: Vec<&'static str>| -> anyhow::Result<Vec<String>> {
            Ok(items.into_iter().map(|i| format!("o{i}")).collect())
        });

        // spawned so that resumption order is up to the scheduler
        let handles = ["a", "b", "c"].map(|item| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.enqueue(item).await })
        });
        let mut results = Vec::new();
        for handle in handles.into_iter().rev() {
            results.push(handle.await.unwrap().unwrap());
        }
        results.reverse();

        assert_eq!(results, vec!["oa", "ob", "oc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_one_flushes_per_request() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(1, 60_000), recording(batches.clone()));
        let start = Instant::now();

        assert_eq!(coordinator.enqueue(1).await.unwrap(), 10);
        assert_eq!(coordinator.enqueue(2).await.unwrap(), 20);

        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(*batches.lock().unwrap(), vec![vec![1], vec![2]]);
        assert_eq!(coordinator.current_epoch(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wait_flushes_on_next_turn() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(8, 0), recording(batches.clone()));

        assert_eq!(coordinator.enqueue(3).await.unwrap(), 30);
        assert_eq!(*batches.lock().unwrap(), vec![vec![3]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_and_deadline_race_flushes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let coordinator = BatchCoordinator::new(config(2, 100), move |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(items)
        });

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.enqueue(1).await })
        };
        // let the first item join and arm the deadline
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(coordinator.open_len(), 1);

        // the second item fills the epoch while its deadline is still armed
        let second = coordinator.enqueue(2).await;

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.unwrap(), 2);

        // let the now stale deadline fire
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.current_epoch(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_at_deadline_instant_flushes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let coordinator = BatchCoordinator::new(config(2, 100), move |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(items)
        });

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.enqueue(1).await })
        };
        // the first item joins, then its deadline task starts sleeping
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(coordinator.open_len(), 1);

        // the clock reaches the deadline and the filler joins in the same poll,
        // before the deadline task gets to run
        let ((), second) = futures::join!(
            tokio::time::advance(Duration::from_millis(100)),
            coordinator.enqueue(2),
        );

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.unwrap(), 2);
        assert!(!coordinator.fire_deadline(0));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.current_epoch(), 1);
        assert_eq!(coordinator.open_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_deadline_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let coordinator = BatchCoordinator::new(config(2, 100), move |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(items)
        });

        let (a, b) = tokio::join!(coordinator.enqueue(1), coordinator.enqueue(2));
        a.unwrap();
        b.unwrap();

        // epoch 0 was sealed by size; its deadline must not touch epoch 1
        assert!(!coordinator.fire_deadline(0));
        // epoch 1 is open but empty
        assert!(!coordinator.fire_deadline(1));
        // an epoch that never existed
        assert!(!coordinator.fire_deadline(42));
        assert_eq!(coordinator.current_epoch(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_deadline_seals_open_epoch() {
        let coordinator = BatchCoordinator::new(config(10, 60_000), |items: Vec<u32>| -> anyhow::Result<Vec<u32>> { Ok(items) });

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.enqueue(5).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(coordinator.fire_deadline(0));
        assert_eq!(coordinator.current_epoch(), 1);
        assert_eq!(pending.await.unwrap().unwrap(), 5);
        // the real timer for epoch 0 is now stale
        assert!(!coordinator.fire_deadline(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_failure_is_broadcast() {
        let coordinator = BatchCoordinator::new(config(2, 100), |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            if items.contains(&13) {
                anyhow::bail!("unlucky batch");
            }
            Ok(items)
        });

        let (a, b) = tokio::join!(coordinator.enqueue(13), coordinator.enqueue(1));
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        match (&a, &b) {
            (Error::Job(x), Error::Job(y)) => assert!(Arc::ptr_eq(x, y)),
            other => panic!("expected shared job error, got {other:?}"),
        }
        assert_eq!(a.to_string(), "job failed: unlucky batch");

        // the next epoch is unaffected
        let (c, d) = tokio::join!(coordinator.enqueue(2), coordinator.enqueue(3));
        assert_eq!(c.unwrap(), 2);
        assert_eq!(d.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_handler_fails_batch_only() {
        let coordinator = BatchCoordinator::new(config(1, 100), |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
            if items[0] == 0 {
                panic!("division by zero");
            }
            Ok(items.into_iter().map(|i| 100 / i).collect())
        });

        assert!(matches!(coordinator.enqueue(0).await, Err(Error::Panicked(_))));
        assert_eq!(coordinator.enqueue(4).await.unwrap(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_mismatch_fails_whole_batch() {
        let coordinator =
            BatchCoordinator::new(config(2, 100), |_items: Vec<u32>| -> anyhow::Result<Vec<u32>> { Ok(vec![1]) });

        let (a, b) = tokio::join!(coordinator.enqueue(1), coordinator.enqueue(2));
        for result in [a, b] {
            assert!(matches!(
                result,
                Err(Error::OutcomeMismatch {
                    expected: 2,
                    actual: 1
                })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_contributor_keeps_its_slot() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(3, 100), recording(batches.clone()));

        // a caller that disconnects right after joining
        let gone = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.enqueue(1).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        gone.abort();

        let (b, c) = tokio::join!(coordinator.enqueue(2), coordinator.enqueue(3));
        assert_eq!(b.unwrap(), 20);
        assert_eq!(c.unwrap(), 30);
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_contributors() {
        let batches = Arc::new(std::sync::Mutex::new(Vec::new()));
        let coordinator = BatchCoordinator::new(config(4, 20), recording(batches.clone()));

        let handles = (0..50_u32)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { (i, coordinator.enqueue(i).await) })
            })
            .collect::<Vec<_>>();

        for handle in futures::future::join_all(handles).await {
            let (i, result) = handle.unwrap();
            assert_eq!(result.unwrap(), i * 10);
        }

        let batches = batches.lock().unwrap();
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 4));
        let mut seen = batches.iter().flatten().copied().collect::<Vec<_>>();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_executor_serializes_coordinators() {
        let executor = SerializedExecutor::new();
        let running = Arc::new(AtomicUsize::new(0));

        let make = |running: Arc<AtomicUsize>| {
            move |items: Vec<u32>| -> anyhow::Result<Vec<u32>> {
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0, "batches overlapped");
                std::thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(items)
            }
        };
        let left = BatchCoordinator::with_executor(config(1, 10), make(running.clone()), executor.clone());
        let right = BatchCoordinator::with_executor(config(1, 10), make(running.clone()), executor);

        let (a, b) = tokio::join!(left.enqueue(1), right.enqueue(2));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
    }
}
