//! Engine tests against an in-memory sink: sentinel accounting, failure isolation, empty items,
//! backpressure, cancellation, panics, and the order-independent total.

use crossbeam_channel::{Receiver, Sender, bounded};
use fanload::pipeline::{
    PipelineTuning, Producer, ProducerStats, Sink, SinkError, SinkTransaction, Transform,
    TransformError, aggregate, create_pipeline_channels, run_pipeline, run_stream_loop,
    spawn_producer_thread, spawn_workers,
};
use fanload::{Input, RunSummary, SourceId};
use proptest::prelude::*;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// --- fixtures ---

#[derive(Clone, Debug, PartialEq, Eq)]
struct Row {
    source_id: SourceId,
    text: String,
}

/// Shared "table" that committed rows land in.
#[derive(Clone, Default)]
struct MemoryTable {
    rows: Arc<Mutex<Vec<Row>>>,
}

impl MemoryTable {
    fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    fn rows_by_source(&self) -> HashMap<SourceId, usize> {
        let mut by_source = HashMap::new();
        for row in self.rows() {
            *by_source.entry(row.source_id).or_default() += 1;
        }
        by_source
    }
}

/// Blocks the first write until released; signals on `entered` when it gets there.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

fn gate() -> (Gate, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(0);
    (
        Gate {
            entered: entered_tx,
            release: release_rx,
        },
        entered_rx,
        release_tx,
    )
}

#[derive(Default)]
struct MemorySink {
    table: MemoryTable,
    /// Any batch containing this text fails.
    fail_on: Option<String>,
    delay: Duration,
    gate: Option<Gate>,
}

impl MemorySink {
    fn new(table: &MemoryTable) -> Self {
        Self {
            table: table.clone(),
            ..Default::default()
        }
    }

    fn failing_on(table: &MemoryTable, text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Self::new(table)
        }
    }
}

struct MemoryTx<'a> {
    sink: &'a mut MemorySink,
    staged: Vec<Row>,
}

impl Sink for MemorySink {
    type Record = Row;
    type Tx<'a>
        = MemoryTx<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<MemoryTx<'_>, SinkError> {
        Ok(MemoryTx {
            sink: self,
            staged: Vec::new(),
        })
    }
}

impl SinkTransaction for MemoryTx<'_> {
    type Record = Row;

    fn bulk_write(&mut self, records: &[Row]) -> Result<usize, SinkError> {
        if let Some(gate) = self.sink.gate.take() {
            let _ = gate.entered.send(());
            // Returns once the test sends or drops the release side.
            let _ = gate.release.recv();
        }
        if !self.sink.delay.is_zero() {
            thread::sleep(self.sink.delay);
        }
        if let Some(ref bad) = self.sink.fail_on
            && records.iter().any(|r| &r.text == bad)
        {
            return Err(SinkError::Constraint(format!("rejected {:?}", bad)));
        }
        self.staged.extend(records.iter().cloned());
        Ok(records.len())
    }

    fn commit(self) -> Result<(), SinkError> {
        self.sink.table.rows.lock().unwrap().extend(self.staged);
        Ok(())
    }

    fn rollback(self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Records are `(id, subs)`; subs starting with `bot:` are excluded.
struct ListProducer;

impl Producer for ListProducer {
    type Record = (SourceId, Vec<String>);
    type Sub = String;

    fn split(&self, record: Self::Record) -> anyhow::Result<(SourceId, Vec<String>)> {
        Ok(record)
    }

    fn exclude(&self, sub: &String) -> bool {
        sub.starts_with("bot:")
    }
}

/// One row per sub-record; `bad` is a transform error, empty text yields nothing.
struct Echo;

impl Transform for Echo {
    type Sub = String;
    type Output = Row;

    fn apply(&self, source_id: SourceId, sub: &String) -> Result<Vec<Row>, TransformError> {
        match sub.as_str() {
            "bad" => Err(TransformError::Invalid("bad sub-record".to_string())),
            "" => Ok(Vec::new()),
            text => Ok(vec![Row {
                source_id,
                text: text.to_string(),
            }]),
        }
    }
}

/// Like [`Echo`], but panics on the sub-record equal to its text.
struct PanicOn(&'static str);

impl Transform for PanicOn {
    type Sub = String;
    type Output = Row;

    fn apply(&self, source_id: SourceId, sub: &String) -> Result<Vec<Row>, TransformError> {
        if sub == self.0 {
            panic!("transform blew up on {:?}", sub);
        }
        Echo.apply(source_id, sub)
    }
}

fn records(items: Vec<(SourceId, Vec<&str>)>) -> Vec<anyhow::Result<(SourceId, Vec<String>)>> {
    items.into_iter()
        .map(|(id, subs)| Ok((id, subs.into_iter().map(String::from).collect())))
        .collect()
}

fn run_with(
    source: Vec<anyhow::Result<(SourceId, Vec<String>)>>,
    tuning: PipelineTuning,
    make_sink: impl FnMut(usize) -> anyhow::Result<MemorySink>,
) -> RunSummary {
    run_pipeline(
        source.into_iter(),
        ListProducer,
        Echo,
        make_sink,
        &tuning,
        None,
        None,
    )
    .unwrap()
}

/// Yields `items`, then panics on the next pull.
fn panicking_source(
    items: Vec<(SourceId, Vec<&'static str>)>,
) -> impl Iterator<Item = anyhow::Result<(SourceId, Vec<String>)>> + Send + 'static {
    records(items)
        .into_iter()
        .chain(std::iter::from_fn(
            || -> Option<anyhow::Result<(SourceId, Vec<String>)>> { panic!("source read failed") },
        ))
}

/// Poll `cond` until it holds; panics after a generous deadline so a hang fails loudly.
fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

// --- sentinel accounting ---

#[test]
fn test_producer_emits_one_end_of_input_per_worker() {
    for workers in 1..=6 {
        let (tx, rx) = bounded::<Input<String>>(64);
        let stats = ProducerStats::new();
        let sent = run_stream_loop(
            tx,
            records(vec![(1, vec!["a"]), (2, vec![])]).into_iter(),
            &ListProducer,
            workers,
            &stats,
            None,
        );
        assert_eq!(sent, 2);
        let ends = rx
            .try_iter()
            .filter(|i| matches!(i, Input::EndOfInput))
            .count();
        assert_eq!(ends, workers);
        assert_eq!(stats.snapshot().sentinels, workers);
    }
}

#[test]
fn test_sentinels_follow_every_item() {
    let (tx, rx) = bounded::<Input<String>>(64);
    run_stream_loop(
        tx,
        records(vec![(1, vec!["a"]), (2, vec!["b"]), (3, vec!["c"])]).into_iter(),
        &ListProducer,
        2,
        &ProducerStats::new(),
        None,
    );
    let kinds: Vec<bool> = rx
        .try_iter()
        .map(|i| matches!(i, Input::EndOfInput))
        .collect();
    assert_eq!(kinds, vec![false, false, false, true, true]);
}

#[test]
fn test_aggregator_sees_one_worker_done_per_worker() {
    for workers in [1, 2, 3, 8] {
        let table = MemoryTable::default();
        let summary = run_with(
            records(vec![(1, vec!["a", "b"]), (2, vec!["c"])]),
            PipelineTuning::new(workers, 4),
            |_| Ok(MemorySink::new(&table)),
        );
        assert_eq!(summary.workers_done, workers);
        assert_eq!(summary.producer.sentinels, workers);
        assert_eq!(summary.total, 3);
    }
}

#[test]
fn test_more_workers_than_items() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![(1, vec!["only"])]),
        PipelineTuning::new(16, 2),
        |_| Ok(MemorySink::new(&table)),
    );
    assert_eq!(summary.total, 1);
    assert_eq!(summary.items, 1);
    assert_eq!(summary.workers_done, 16);
}

#[test]
fn test_empty_source() {
    let table = MemoryTable::default();
    let summary = run_with(Vec::new(), PipelineTuning::new(3, 1), |_| {
        Ok(MemorySink::new(&table))
    });
    assert_eq!(summary.total, 0);
    assert_eq!(summary.items, 0);
    assert_eq!(summary.workers_done, 3);
}

// --- end-to-end scenarios ---

#[test]
fn test_scenario_three_records_two_subs_two_workers() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![(1, vec!["a", "b"]), (2, vec!["c", "d"]), (3, vec!["e", "f"])]),
        PipelineTuning::new(2, 4),
        |_| Ok(MemorySink::new(&table)),
    );
    assert_eq!(summary.total, 6);
    assert_eq!(summary.items, 3);
    assert!(summary.failed.is_empty());
    assert_eq!(table.rows().len(), 6);
}

#[test]
fn test_scenario_failing_sub_record_rolls_back_whole_item() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![(1, vec!["x", "y", "z"])]),
        PipelineTuning::new(1, 1),
        |_| Ok(MemorySink::failing_on(&table, "y")),
    );
    assert_eq!(summary.total, 0);
    assert_eq!(summary.failed, vec![1]);
    assert!(table.rows().is_empty());
}

// --- failure isolation ---

#[test]
fn test_one_failing_item_does_not_affect_others() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![
            (1, vec!["a", "b"]),
            (2, vec!["a", "b"]),
            (3, vec!["a", "boom"]),
            (4, vec!["a", "b"]),
            (5, vec!["a", "b"]),
        ]),
        PipelineTuning::new(3, 2),
        |_| Ok(MemorySink::failing_on(&table, "boom")),
    );
    assert_eq!(summary.total, 8);
    assert_eq!(summary.items, 5);
    assert_eq!(summary.failed, vec![3]);
    let by_source = table.rows_by_source();
    assert_eq!(by_source.get(&3), None);
    for id in [1, 2, 4, 5] {
        assert_eq!(by_source.get(&id), Some(&2), "source {}", id);
    }
}

#[test]
fn test_transform_error_drops_only_that_sub_record() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![(1, vec!["a", "bad", "c"])]),
        PipelineTuning::new(1, 1),
        |_| Ok(MemorySink::new(&table)),
    );
    assert_eq!(summary.total, 2);
    assert!(summary.failed.is_empty());
    let texts: Vec<String> = table.rows().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["a", "c"]);
}

#[test]
fn test_unreadable_source_record_is_skipped() {
    let mut source = records(vec![(1, vec!["a"]), (3, vec!["c"])]);
    source.insert(1, Err(anyhow::anyhow!("corrupt record")));
    let table = MemoryTable::default();
    let summary = run_with(source, PipelineTuning::new(2, 2), |_| {
        Ok(MemorySink::new(&table))
    });
    assert_eq!(summary.total, 2);
    assert_eq!(summary.items, 2);
    assert_eq!(summary.producer.records, 3);
    assert_eq!(summary.producer.source_errors, 1);
}

#[test]
fn test_sink_factory_failure_fails_run_before_start() {
    let tuning = PipelineTuning::new(2, 2);
    let result = run_pipeline(
        records(vec![(1, vec!["a"])]).into_iter(),
        ListProducer,
        Echo,
        |id| -> anyhow::Result<MemorySink> {
            if id == 1 {
                anyhow::bail!("cannot open");
            }
            Ok(MemorySink::default())
        },
        &tuning,
        None,
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_invalid_tuning_rejected() {
    let result = run_pipeline(
        records(vec![(1, vec!["a"])]).into_iter(),
        ListProducer,
        Echo,
        |_| Ok(MemorySink::default()),
        &PipelineTuning::new(0, 4),
        None,
        None,
    );
    assert!(result.is_err());
}

// --- empty items ---

#[test]
fn test_empty_items_count_zero() {
    let table = MemoryTable::default();
    let summary = run_with(
        records(vec![(1, vec![]), (2, vec!["bot:ci", "bot:lint"]), (3, vec![""]), (4, vec!["a"])]),
        PipelineTuning::new(2, 2),
        |_| Ok(MemorySink::new(&table)),
    );
    assert_eq!(summary.total, 1);
    assert_eq!(summary.items, 4);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.producer.excluded, 2);
}

// --- backpressure ---

#[test]
fn test_full_channel_blocks_producer_until_worker_drains() {
    let tuning = PipelineTuning::new(1, 1);
    let channels = create_pipeline_channels::<String>(&tuning);
    let stats = Arc::new(ProducerStats::new());
    let table = MemoryTable::default();
    let (gate, entered, release) = gate();
    let sink = MemorySink {
        gate: Some(gate),
        ..MemorySink::new(&table)
    };

    let producer = spawn_producer_thread(
        channels.input_tx,
        records(vec![(1, vec!["a"]), (2, vec!["b"]), (3, vec!["c"]), (4, vec!["d"])]).into_iter(),
        ListProducer,
        1,
        Arc::clone(&stats),
        None,
    );
    let workers = spawn_workers(
        channels.input_rx,
        &channels.report_tx,
        Arc::new(Echo),
        vec![sink],
        None,
    );
    drop(channels.report_tx);

    // Worker is parked inside its first write; the one-slot channel fills and the next put waits.
    entered.recv().unwrap();
    wait_until(|| stats.blocked_puts() >= 1);
    assert!(!producer.is_finished());
    assert!(stats.records() <= 3);

    drop(release);
    let totals = aggregate(&channels.report_rx, 1, None).unwrap();
    producer.join().unwrap();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(totals.total, 4);
    let snap = stats.snapshot();
    assert!(snap.blocked_puts >= 1);
    assert!(snap.blocked_time > Duration::ZERO);
}

#[test]
fn test_roomy_channel_never_blocks() {
    let (tx, _rx) = bounded::<Input<String>>(16);
    let stats = ProducerStats::new();
    run_stream_loop(
        tx,
        records(vec![(1, vec!["a"]), (2, vec!["b"])]).into_iter(),
        &ListProducer,
        2,
        &stats,
        None,
    );
    assert_eq!(stats.blocked_puts(), 0);
}

// --- cancellation ---

#[test]
fn test_cancel_before_start_reads_nothing() {
    let table = MemoryTable::default();
    let cancel = Arc::new(AtomicBool::new(true));
    let summary = run_pipeline(
        records(vec![(1, vec!["a"]), (2, vec!["b"])]).into_iter(),
        ListProducer,
        Echo,
        |_| Ok(MemorySink::new(&table)),
        &PipelineTuning::new(2, 2),
        Some(cancel),
        None,
    )
    .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.producer.records, 0);
    assert_eq!(summary.workers_done, 2);
}

#[test]
fn test_cancel_lets_in_flight_item_commit_and_discards_the_rest() {
    let table = MemoryTable::default();
    let cancel = Arc::new(AtomicBool::new(false));
    let (gate, entered, release) = gate();
    let mut gate = Some(gate);
    let run = {
        let table = table.clone();
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            run_pipeline(
                records(vec![(1, vec!["a", "b"]), (2, vec!["c"]), (3, vec!["d"]), (4, vec!["e"])]).into_iter(),
                ListProducer,
                Echo,
                move |_| {
                    Ok(MemorySink {
                        gate: gate.take(),
                        ..MemorySink::new(&table)
                    })
                },
                &PipelineTuning::new(1, 8),
                Some(cancel),
                None,
            )
        })
    };

    entered.recv().unwrap();
    cancel.store(true, Ordering::Relaxed);
    drop(release);

    let summary = run.join().unwrap().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.items, 1);
    assert_eq!(summary.workers_done, 1);
    assert_eq!(table.rows().len(), 2);
}

// --- panics ---

#[test]
fn test_worker_panic_still_reports_done() {
    let table = MemoryTable::default();
    let summary = run_pipeline(
        records(vec![
            (1, vec!["a"]),
            (2, vec!["panic"]),
            (3, vec!["c"]),
            (4, vec!["d"]),
            (5, vec!["e"]),
            (6, vec!["f"]),
        ])
        .into_iter(),
        ListProducer,
        PanicOn("panic"),
        |_| Ok(MemorySink::new(&table)),
        &PipelineTuning::new(2, 1),
        None,
        None,
    )
    .unwrap();
    assert_eq!(summary.workers_done, 2);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.items, 5);
    assert!(summary.failed.is_empty());
    assert_eq!(table.rows_by_source().get(&2), None);
}

#[test]
fn test_source_panic_still_sends_every_end_of_input() {
    let (tx, rx) = bounded::<Input<String>>(16);
    let stats = ProducerStats::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_stream_loop(
            tx,
            panicking_source(vec![(1, vec!["a"]), (2, vec!["b"])]),
            &ListProducer,
            3,
            &stats,
            None,
        )
    }));
    assert!(result.is_err());
    let inputs: Vec<Input<String>> = rx.try_iter().collect();
    let items = inputs
        .iter()
        .filter(|i| matches!(i, Input::Item(_)))
        .count();
    let ends = inputs
        .iter()
        .filter(|i| matches!(i, Input::EndOfInput))
        .count();
    assert_eq!(items, 2);
    assert_eq!(ends, 3);
    assert_eq!(stats.snapshot().sentinels, 3);
}

#[test]
fn test_source_panic_returns_summary_of_items_already_sent() {
    let table = MemoryTable::default();
    let summary = run_pipeline(
        panicking_source(vec![(1, vec!["a", "b"]), (2, vec!["c"])]),
        ListProducer,
        Echo,
        |_| Ok(MemorySink::new(&table)),
        &PipelineTuning::new(3, 4),
        None,
        None,
    )
    .unwrap();
    assert_eq!(summary.workers_done, 3);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.items, 2);
    assert_eq!(summary.producer.sentinels, 3);
    assert_eq!(table.rows().len(), 3);
}

// --- progress callback ---

#[test]
fn test_on_item_called_once_per_item() {
    let table = MemoryTable::default();
    let calls = Mutex::new(Vec::new());
    let on_item = |n: usize| calls.lock().unwrap().push(n);
    let summary = run_pipeline(
        records(vec![(1, vec!["a", "b"]), (2, vec![]), (3, vec!["c"])]).into_iter(),
        ListProducer,
        Echo,
        |_| Ok(MemorySink::new(&table)),
        &PipelineTuning::new(2, 2).with_expected_items(3),
        None,
        Some(&on_item),
    )
    .unwrap();
    let mut calls = calls.into_inner().unwrap();
    calls.sort_unstable();
    assert_eq!(calls, vec![0, 1, 2]);
    assert_eq!(summary.total, 3);
}

// --- order-independent total ---

fn item_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "bot:x", "fail"]), 0..4)
            .prop_map(|v| v.into_iter().map(String::from).collect()),
        0..24,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: whatever the worker count, capacity and per-worker delays, the total equals
    /// the rows of every item that did not fail, and no row is lost or duplicated.
    #[test]
    fn total_is_independent_of_scheduling(
        items in item_strategy(),
        workers in 1_usize..5,
        cap in 1_usize..4,
        delays in prop::collection::vec(0_u64..300, 5),
    ) {
        let expected_by_source: HashMap<SourceId, usize> = items
            .iter()
            .enumerate()
            .filter(|(_, subs)| !subs.iter().any(|s| s == "fail"))
            .map(|(i, subs)| (i as SourceId, subs.iter().filter(|s| !s.starts_with("bot:")).count()))
            .filter(|(_, n)| *n > 0)
            .collect();
        let expected_total: usize = expected_by_source.values().sum();

        let source: Vec<anyhow::Result<(SourceId, Vec<String>)>> = items
            .iter()
            .enumerate()
            .map(|(i, subs)| Ok((i as SourceId, subs.clone())))
            .collect();
        let table = MemoryTable::default();
        let summary = run_with(source, PipelineTuning::new(workers, cap), |id| {
            Ok(MemorySink {
                delay: Duration::from_micros(delays[id]),
                ..MemorySink::failing_on(&table, "fail")
            })
        });

        prop_assert_eq!(summary.total, expected_total);
        prop_assert_eq!(summary.items, items.len());
        prop_assert_eq!(summary.workers_done, workers);
        prop_assert_eq!(table.rows_by_source(), expected_by_source);
    }
}
