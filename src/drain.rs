//! Background consumer standing in for a slow sink.
//!
//! [`spawn_drain`] returns a [`QueueSink`] to hand to a
//! [`Carousel`](crate::Carousel) and a [`DrainWorker`] owning a thread that
//! records one entry every `pace`. The queue is bounded: when it is full,
//! entries are rejected instead of blocking the producer.
//!
//! Shutdown: drop every `QueueSink`, then call [`DrainWorker::join`]. The
//! worker records whatever is still queued and returns its report.

use crate::carousel::Sink;
use crate::error::{CarouselError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Producer side of the drain queue.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: SyncSender<(String, String)>,
    rejected: Arc<AtomicU64>,
}

impl QueueSink {
    /// Queue an entry without blocking. Returns `false` when the queue is
    /// full or the worker is gone.
    pub fn enqueue(&self, key: &str, entry: &str) -> bool {
        match self.tx.try_send((key.to_owned(), entry.to_owned())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl Sink for QueueSink {
    fn forward(&mut self, key: &str, entry: &str) {
        self.enqueue(key, entry);
    }
}

/// What the worker recorded before shutting down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Distinct keys recorded
    pub recorded_keys: HashSet<String>,
    /// Entries taken off the queue
    pub drained: u64,
    /// Entries refused because the queue was full
    pub rejected: u64,
}

#[derive(Debug)]
pub struct DrainWorker {
    handle: JoinHandle<(HashSet<String>, u64)>,
    rejected: Arc<AtomicU64>,
    recorded: Arc<AtomicUsize>,
}

impl DrainWorker {
    /// Distinct keys recorded so far, readable while the worker runs.
    pub fn recorded_keys(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Entries refused so far because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Wait for the worker to drain the queue and stop. Only returns once
    /// every `QueueSink` clone has been dropped.
    pub fn join(self) -> Result<DrainReport> {
        let (recorded_keys, drained) = self
            .handle
            .join()
            .map_err(|_| CarouselError::WorkerPanicked)?;

        Ok(DrainReport {
            recorded_keys,
            drained,
            rejected: self.rejected.load(Ordering::Relaxed),
        })
    }
}

/// Start a worker draining a queue of `capacity` entries, one every `pace`.
pub fn spawn_drain(
    capacity: usize,
    pace: Duration,
) -> Result<(QueueSink, DrainWorker)> {
    if capacity == 0 {
        return Err(CarouselError::InvalidConfig(
            "Drain queue capacity must be > 0".into(),
        ));
    }

    let (tx, rx) = sync_channel(capacity);
    let rejected = Arc::new(AtomicU64::new(0));
    let recorded = Arc::new(AtomicUsize::new(0));

    let handle = {
        let recorded = Arc::clone(&recorded);
        thread::Builder::new()
            .name("carousel-drain".into())
            .spawn(move || drain_loop(rx, pace, &recorded))?
    };

    debug!(capacity, ?pace, "drain worker started");

    Ok((
        QueueSink {
            tx,
            rejected: Arc::clone(&rejected),
        },
        DrainWorker {
            handle,
            rejected,
            recorded,
        },
    ))
}

fn drain_loop(
    rx: Receiver<(String, String)>,
    pace: Duration,
    recorded_count: &AtomicUsize,
) -> (HashSet<String>, u64) {
    let mut recorded = HashSet::new();
    let mut drained = 0u64;

    // recv fails once all senders are gone and the queue is empty
    while let Ok((key, _entry)) = rx.recv() {
        if recorded.insert(key) {
            recorded_count.store(recorded.len(), Ordering::Relaxed);
        }
        drained += 1;
        if !pace.is_zero() {
            thread::sleep(pace);
        }
    }

    debug!(drained, distinct = recorded.len(), "drain worker stopped");
    (recorded, drained)
}
