//! Worker pool: each worker takes items off the input channel, derives records, writes them in
//! one transaction per item, and reports the row count on the result channel.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::types::{Input, Report, WorkItem};

use super::error_handler::{SinkError, report_item_failure, report_transform_failure};
use super::sink::{Sink, SinkTransaction, Transform};

/// Sends `WorkerDone` when dropped: exactly once per worker, on every exit path.
struct DoneGuard<'a> {
    tx: &'a Sender<Report>,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        let _ = self.tx.send(Report::WorkerDone);
    }
}

/// Begin, write, commit. Any failure rolls the whole batch back.
fn write_batch<K: Sink>(sink: &mut K, batch: &[K::Record]) -> Result<usize, SinkError> {
    let mut tx = sink.begin()?;
    match tx.bulk_write(batch) {
        Ok(n) => {
            tx.commit()?;
            Ok(n)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback() {
                warn!("rollback failed: {}", rb);
            }
            Err(err)
        }
    }
}

/// Derive the batch for one item and write it. Never fails: sink errors become `Report::Failed`.
fn process_item<T, K>(worker_id: usize, item: WorkItem<T::Sub>, transform: &T, sink: &mut K) -> Report
where
    T: Transform,
    K: Sink<Record = T::Output>,
{
    if item.is_empty() {
        return Report::Count(0);
    }
    let mut batch = Vec::with_capacity(item.subs.len());
    for sub in &item.subs {
        match transform.apply(item.source_id, sub) {
            Ok(records) => batch.extend(records),
            Err(err) => report_transform_failure(worker_id, item.source_id, &err),
        }
    }
    if batch.is_empty() {
        return Report::Count(0);
    }
    match write_batch(sink, &batch) {
        Ok(n) => Report::Count(n),
        Err(err) => {
            report_item_failure(worker_id, item.source_id, &err);
            Report::Failed(item.source_id)
        }
    }
}

/// Single worker: loop until this worker's `EndOfInput`. Once `cancel` is raised, items still
/// queued are discarded unwritten; the transaction in flight always finishes first.
/// Returns the number of items written or attempted.
pub fn worker_loop<T, K>(
    worker_id: usize,
    input_rx: Receiver<Input<T::Sub>>,
    report_tx: Sender<Report>,
    transform: &T,
    sink: &mut K,
    cancel: Option<&AtomicBool>,
) -> usize
where
    T: Transform,
    K: Sink<Record = T::Output>,
{
    let _done = DoneGuard { tx: &report_tx };
    let mut handled = 0_usize;
    let mut discarded = 0_usize;
    while let Ok(input) = input_rx.recv() {
        let item = match input {
            Input::EndOfInput => break,
            Input::Item(item) => item,
        };
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            discarded += 1;
            continue;
        }
        let report = process_item(worker_id, item, transform, sink);
        handled += 1;
        if report_tx.send(report).is_err() {
            break;
        }
    }
    debug!(
        "worker {}: done ({} items handled, {} discarded)",
        worker_id, handled, discarded
    );
    handled
}

/// Spawn one thread per sink. Each worker owns its sink; the transform is shared read-only.
pub fn spawn_workers<T, K>(
    input_rx: Receiver<Input<T::Sub>>,
    report_tx: &Sender<Report>,
    transform: Arc<T>,
    sinks: Vec<K>,
    cancel: Option<Arc<AtomicBool>>,
) -> Vec<JoinHandle<usize>>
where
    T: Transform + Send + Sync + 'static,
    T::Sub: Send + 'static,
    K: Sink<Record = T::Output> + Send + 'static,
{
    sinks
        .into_iter()
        .enumerate()
        .map(|(worker_id, mut sink)| {
            let input_rx = input_rx.clone();
            let report_tx = report_tx.clone();
            let transform = Arc::clone(&transform);
            let cancel = cancel.clone();
            thread::spawn(move || {
                worker_loop(
                    worker_id,
                    input_rx,
                    report_tx,
                    transform.as_ref(),
                    &mut sink,
                    cancel.as_deref(),
                )
            })
        })
        .collect()
}
