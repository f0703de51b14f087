//! Streaming producer: pulls source records lazily, splits them into work items, and pushes
//! them onto the bounded input channel, followed by one `EndOfInput` per worker.

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::types::{Input, WorkItem};

use super::sink::Producer;

/// Counters updated by the producer thread. Shared so callers (and tests) can watch backpressure live.
#[derive(Debug, Default)]
pub struct ProducerStats {
    records: AtomicUsize,
    items: AtomicUsize,
    excluded: AtomicUsize,
    source_errors: AtomicUsize,
    sentinels: AtomicUsize,
    blocked_puts: AtomicUsize,
    blocked_nanos: AtomicU64,
}

/// Point-in-time copy of [`ProducerStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProducerSnapshot {
    /// Source records pulled (including unreadable ones).
    pub records: usize,
    /// Work items enqueued.
    pub items: usize,
    /// Sub-records dropped by the exclusion predicate.
    pub excluded: usize,
    /// Source records skipped because they could not be read or split.
    pub source_errors: usize,
    /// `EndOfInput` sentinels enqueued.
    pub sentinels: usize,
    /// Puts that found the channel full and had to wait.
    pub blocked_puts: usize,
    pub blocked_time: Duration,
}

impl ProducerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked_puts(&self) -> usize {
        self.blocked_puts.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProducerSnapshot {
        ProducerSnapshot {
            records: self.records.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            sentinels: self.sentinels.load(Ordering::Relaxed),
            blocked_puts: self.blocked_puts.load(Ordering::Relaxed),
            blocked_time: Duration::from_nanos(self.blocked_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Put with backpressure accounting. Returns false when every receiver is gone.
fn put<S>(tx: &Sender<Input<S>>, msg: Input<S>, stats: &ProducerStats) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            stats.blocked_puts.fetch_add(1, Ordering::Relaxed);
            let start = Instant::now();
            let sent = tx.send(msg).is_ok();
            stats
                .blocked_nanos
                .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
            sent
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Emits one `EndOfInput` per worker when dropped, so the count holds on every exit path,
/// including a panic inside the source or the producer.
struct SentinelGuard<'a, S> {
    tx: &'a Sender<Input<S>>,
    worker_count: usize,
    stats: &'a ProducerStats,
}

impl<S> Drop for SentinelGuard<'_, S> {
    fn drop(&mut self) {
        for _ in 0..self.worker_count {
            if !put(self.tx, Input::EndOfInput, self.stats) {
                // No worker left to receive it.
                break;
            }
            self.stats.sentinels.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Run the producer loop: for each source record in order, split it, drop excluded sub-records,
/// and enqueue one [`WorkItem`] (empty items included). Unreadable records are logged and skipped.
/// Stops pulling from the source when `cancel` is raised. Returns the number of items enqueued.
pub fn run_stream_loop<I, P>(
    input_tx: Sender<Input<P::Sub>>,
    mut source: I,
    producer: &P,
    worker_count: usize,
    stats: &ProducerStats,
    cancel: Option<&AtomicBool>,
) -> usize
where
    I: Iterator<Item = anyhow::Result<P::Record>>,
    P: Producer,
{
    let _sentinels = SentinelGuard {
        tx: &input_tx,
        worker_count,
        stats,
    };
    let mut sent = 0_usize;
    loop {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            info!("Cancelled; producer stops reading the source");
            break;
        }
        let Some(record) = source.next() else {
            break;
        };
        stats.records.fetch_add(1, Ordering::Relaxed);
        let (source_id, subs) = match record.and_then(|r| producer.split(r)) {
            Ok(split) => split,
            Err(err) => {
                warn!("Skipping unreadable source record: {:#}", err);
                stats.source_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        let before = subs.len();
        let subs: Vec<P::Sub> = subs.into_iter().filter(|s| !producer.exclude(s)).collect();
        stats
            .excluded
            .fetch_add(before - subs.len(), Ordering::Relaxed);
        if !put(&input_tx, Input::Item(WorkItem::new(source_id, subs)), stats) {
            warn!("Input channel closed; producer stopping early");
            break;
        }
        stats.items.fetch_add(1, Ordering::Relaxed);
        sent += 1;
    }
    debug!("producer: {} items enqueued", sent);
    sent
}

/// Spawn the producer on its own thread. The thread owns `input_tx`; once it returns, the
/// sentinels are in the channel and the sender is dropped.
pub fn spawn_producer_thread<I, P>(
    input_tx: Sender<Input<P::Sub>>,
    source: I,
    producer: P,
    worker_count: usize,
    stats: Arc<ProducerStats>,
    cancel: Option<Arc<AtomicBool>>,
) -> JoinHandle<usize>
where
    I: Iterator<Item = anyhow::Result<P::Record>> + Send + 'static,
    P: Producer + Send + 'static,
    P::Sub: Send + 'static,
{
    thread::spawn(move || {
        run_stream_loop(
            input_tx,
            source,
            &producer,
            worker_count,
            &stats,
            cancel.as_deref(),
        )
    })
}
