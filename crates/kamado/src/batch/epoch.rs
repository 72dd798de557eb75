use std::sync::Arc;

use crate::error::Result;
use crate::slot::{self, SlotReader, SlotWriter};

/// What every contributor of an epoch eventually observes.
pub(crate) type BatchOutcome<O> = Result<Arc<Vec<O>>>;

/// # Epoch
///
/// One generation of the open batch. Items are appended while the epoch is
/// open; the index of an item is its append position. All contributors share
/// one result slot, resolved once when the batch completes.
pub(crate) struct Epoch<I, O> {
    /// Monotonic per coordinator, starting at 0
    id: u64,

    /// Contributed items in join order
    items: Vec<I>,

    /// Write half of the shared slot, handed to the flush on seal
    writer: SlotWriter<BatchOutcome<O>>,

    /// Read half of the shared slot, cloned for each contributor
    reader: SlotReader<BatchOutcome<O>>,
}

/// An epoch that no longer accepts items.
pub(crate) struct SealedEpoch<I, O> {
    pub(crate) id: u64,
    pub(crate) items: Vec<I>,
    pub(crate) writer: SlotWriter<BatchOutcome<O>>,
}

impl<I, O> Epoch<I, O> {
    pub(crate) fn open(id: u64) -> Self {
        let (writer, reader) = slot::channel();
        Self {
            id,
            items: Vec::new(),
            writer,
            reader,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `item` and returns its index within this epoch.
    pub(crate) fn push(&mut self, item: I) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub(crate) fn reader(&self) -> SlotReader<BatchOutcome<O>> {
        self.reader.clone()
    }

    pub(crate) fn seal(self) -> SealedEpoch<I, O> {
        SealedEpoch {
            id: self.id,
            items: self.items,
            writer: self.writer,
        }
    }
}
