//! Single-assignment result slots.
//!
//! A slot is written exactly once through its [`SlotWriter`] and may be read by
//! any number of [`SlotReader`] clones, each of which observes the same value.
//! The writer is consumed by [`SlotWriter::resolve`], so a second assignment is
//! unrepresentable.

use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Creates a connected writer/reader pair.
pub fn channel<T: Clone>() -> (SlotWriter<T>, SlotReader<T>) {
    let (tx, rx) = oneshot::channel();
    (
        SlotWriter { sender: tx },
        SlotReader { receiver: rx.shared() },
    )
}

/// The write half of a slot.
pub struct SlotWriter<T> {
    sender: oneshot::Sender<T>,
}

impl<T> SlotWriter<T> {
    /// Resolves the slot, waking every reader.
    ///
    /// Returns `false` when every reader is already gone; the value is dropped.
    pub fn resolve(self, value: T) -> bool {
        self.sender.send(value).is_ok()
    }
}

/// The read half of a slot. Cloning it yields another view of the same slot.
pub struct SlotReader<T: Clone> {
    receiver: Shared<oneshot::Receiver<T>>,
}

impl<T: Clone> Clone for SlotReader<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

impl<T: Clone> SlotReader<T> {
    /// Waits for the slot to be resolved.
    ///
    /// Fails with [`Error::Abandoned`] if the writer is dropped unresolved.
    pub async fn wait(&self) -> Result<T> {
        self.receiver.clone().await.map_err(|_| Error::Abandoned)
    }
}
