//! Bounded blocking queues connecting the pipeline stages.
//!
//! Thin wrapper over `crossbeam_channel::bounded` that exposes `put`/`get`
//! and tracks the deepest backlog seen. Senders and receivers are separate
//! cloneable halves: once every receiver is dropped, `put` fails with
//! [`QueueClosed`] instead of blocking forever, and vice versa.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

/// The other side of a queue is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} queue closed")]
pub struct QueueClosed(pub &'static str);

/// Create a queue holding at most `capacity` items (minimum 1).
pub fn bounded<T>(name: &'static str, capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        QueueSender {
            name,
            capacity,
            tx,
            peak: Arc::new(AtomicUsize::new(0)),
        },
        QueueReceiver { name, rx },
    )
}

pub struct QueueSender<T> {
    name: &'static str,
    capacity: usize,
    tx: Sender<T>,
    peak: Arc<AtomicUsize>,
}

impl<T> QueueSender<T> {
    /// Enqueue, blocking while the queue is full.
    pub fn put(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(item).map_err(|_| QueueClosed(self.name))?;
        self.record_depth();
        Ok(())
    }

    fn record_depth(&self) {
        self.peak.fetch_max(self.tx.len(), Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Deepest backlog observed right after a put.
    pub fn peak_depth(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            capacity: self.capacity,
            tx: self.tx.clone(),
            peak: Arc::clone(&self.peak),
        }
    }
}

pub struct QueueReceiver<T> {
    name: &'static str,
    rx: Receiver<T>,
}

impl<T> QueueReceiver<T> {
    /// Dequeue, blocking while the queue is empty.
    pub fn get(&self) -> Result<T, QueueClosed> {
        self.rx.recv().map_err(|_| QueueClosed(self.name))
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            rx: self.rx.clone(),
        }
    }
}
