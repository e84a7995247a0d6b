//! Multi-producer message queue shared between producer threads and a
//! single consumer thread.
//!
//! `push` never blocks and never fails. Capacity is the caller's concern:
//! callers that enforce a backlog limit use [`MessageQueue::try_push_within`],
//! which admits an item only while the queue holds fewer than `limit`
//! entries. Admission is tracked with an atomic counter so racing producers
//! can never overshoot the limit. Control items pushed with
//! [`MessageQueue::push_uncounted`] keep their FIFO position but are not
//! counted, so they never take a slot from real messages.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

struct Entry<T> {
    item: T,
    counted: bool,
}

/// Thread-safe FIFO handed out by clone; all clones share one queue.
pub struct MessageQueue<T> {
    tx: Sender<Entry<T>>,
    rx: Receiver<Entry<T>>,
    len: Arc<AtomicUsize>,
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            len: Arc::clone(&self.len),
        }
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            len: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append `item` unconditionally.
    pub fn push(&self, item: T) {
        self.len.fetch_add(1, Ordering::AcqRel);
        // The queue owns a receiver, so the channel can never be disconnected.
        if self.tx.send(Entry { item, counted: true }).is_err() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Append `item` without counting it towards the size or any limit.
    pub fn push_uncounted(&self, item: T) {
        let _ = self.tx.send(Entry {
            item,
            counted: false,
        });
    }

    /// Append `item` only if fewer than `limit` items are queued.
    ///
    /// Returns the item back to the caller when the queue is full.
    pub fn try_push_within(&self, item: T, limit: usize) -> Result<(), T> {
        let admitted = self
            .len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if !admitted {
            return Err(item);
        }
        self.tx
            .send(Entry {
                item,
                counted: true,
            })
            .map_err(|err| {
                self.len.fetch_sub(1, Ordering::AcqRel);
                err.into_inner().item
            })
    }

    /// Wait up to `timeout` for the next item.
    pub fn pop_with_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(entry) => Some(self.take(entry)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until an item is available.
    pub fn pop(&self) -> T {
        loop {
            if let Ok(entry) = self.rx.recv() {
                return self.take(entry);
            }
        }
    }

    fn take(&self, entry: Entry<T>) -> T {
        if entry.counted {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        entry.item
    }

    /// Best-effort number of queued counted items.
    pub fn approximate_size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.approximate_size() == 0
    }
}
