use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::RunSummary;
use crate::pipeline::{
    PipelineTuning, Producer, ProducerStats, Sink, Transform, aggregate,
    create_pipeline_channels, spawn_producer_thread, spawn_workers,
};

/// Join every worker. A panicked worker has already reported done through its guard, so this
/// only logs; the item it held is lost.
fn join_workers(worker_handles: Vec<JoinHandle<usize>>) -> usize {
    let mut handled = 0_usize;
    for (id, h) in worker_handles.into_iter().enumerate() {
        match h.join() {
            Ok(n) => handled += n,
            Err(_) => log::error!("worker {} panicked; its in-flight item was lost", id),
        }
    }
    handled
}

/// Main orchestrator: source → producer thread → bounded channel → workers (sink writes) →
/// result channel → aggregator (this thread). Returns once every worker has reported done
/// and the producer has been joined.
///
/// `make_sink` is called once per worker before any thread starts, so a sink that cannot be
/// opened fails the run up front instead of leaving a worker without one.
pub fn run_pipeline<I, P, T, K, F>(
    source: I,
    producer: P,
    transform: T,
    mut make_sink: F,
    tuning: &PipelineTuning,
    cancel: Option<Arc<AtomicBool>>,
    on_item: Option<&dyn Fn(usize)>,
) -> Result<RunSummary>
where
    I: Iterator<Item = Result<P::Record>> + Send + 'static,
    P: Producer + Send + 'static,
    P::Sub: Send + 'static,
    T: Transform<Sub = P::Sub> + Send + Sync + 'static,
    K: Sink<Record = T::Output> + Send + 'static,
    F: FnMut(usize) -> Result<K>,
{
    tuning.validate()?;
    let num_workers = tuning.num_workers;
    let sinks = (0..num_workers)
        .map(|id| make_sink(id).with_context(|| format!("open sink for worker {}", id)))
        .collect::<Result<Vec<K>>>()?;
    debug!(
        "pipeline: {} workers, channel capacity {}",
        num_workers, tuning.channel_cap
    );

    let channels = create_pipeline_channels::<P::Sub>(tuning);
    let stats = Arc::new(ProducerStats::new());

    let producer_handle = spawn_producer_thread(
        channels.input_tx,
        source,
        producer,
        num_workers,
        Arc::clone(&stats),
        cancel.clone(),
    );

    let worker_handles = spawn_workers(
        channels.input_rx,
        &channels.report_tx,
        Arc::new(transform),
        sinks,
        cancel.clone(),
    );

    // Only workers may hold report senders, so a disconnect means every worker is gone.
    drop(channels.report_tx);

    let totals = aggregate(&channels.report_rx, num_workers, on_item);

    // A panicked producer has already sent its sentinels through its guard; the items it
    // enqueued before the panic are counted as usual.
    let sent = match producer_handle.join() {
        Ok(n) => Some(n),
        Err(_) => {
            log::error!("producer thread panicked; source read stopped early");
            None
        }
    };
    let handled = join_workers(worker_handles);
    let totals = totals?;
    debug!(
        "pipeline: producer sent {:?} items, workers handled {}",
        sent, handled
    );

    let cancelled = cancel.is_some_and(|c| c.load(Ordering::Relaxed));
    if let Some(expected) = tuning.expected_items
        && !cancelled
        && expected != totals.items
    {
        warn!(
            "Expected {} items but workers reported {} (skipped or unreadable records)",
            expected, totals.items
        );
    }

    Ok(RunSummary {
        total: totals.total,
        items: totals.items,
        failed: totals.failed,
        workers_done: totals.workers_done,
        cancelled,
        producer: stats.snapshot(),
    })
}
