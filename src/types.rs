//! Public and internal types for the fanload API and pipeline.

use std::path::PathBuf;

use crate::pipeline::ProducerSnapshot;

/// Identifier of a source record (a review id).
pub type SourceId = i64;

/// One unit of worker input: the source record id plus every sub-record derived from it
/// that survived the exclusion predicate. May be empty; workers treat that as a zero-count no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem<S> {
    pub source_id: SourceId,
    pub subs: Vec<S>,
}

impl<S> WorkItem<S> {
    pub fn new(source_id: SourceId, subs: Vec<S>) -> Self {
        Self { source_id, subs }
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

/// Value carried on the bounded input channel.
#[derive(Debug)]
pub enum Input<S> {
    Item(WorkItem<S>),
    /// No more work will arrive for the worker that receives this. Enqueued once per worker.
    EndOfInput,
}

/// Value carried on the result channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Report {
    /// Rows written for one work item.
    Count(usize),
    /// The item's transaction was rolled back. Contributes 0 to the total.
    Failed(SourceId),
    /// Sent exactly once by each worker when it exits.
    WorkerDone,
}

/// Final result of one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Derived rows persisted (or, for a dry run, rows that would have been persisted).
    pub total: usize,
    /// Work items reported by workers (written, empty, or failed).
    pub items: usize,
    /// Source ids whose item was rolled back.
    pub failed: Vec<SourceId>,
    /// `WorkerDone` sentinels observed; equals the worker count on every completed run.
    pub workers_done: usize,
    /// True when the run stopped early because of Ctrl+C.
    pub cancelled: bool,
    pub producer: ProducerSnapshot,
}

/// Which reviews a load covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Population {
    #[default]
    All,
    /// Reviews that missed a vulnerability.
    Missed,
    /// Reviews that did not.
    Neutral,
}

/// Which loaders to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Stage {
    Messages,
    Tokens,
    #[default]
    All,
}

/// Lib-only options for [`load_messages`](crate::load_messages) and [`load_tokens`](crate::load_tokens).
#[derive(Clone, Debug, Default)]
pub struct LoadOpts {
    /// Worker thread count. When None, uses the host's core count.
    pub num_workers: Option<usize>,
    /// Bounded channel capacity. When None, uses [`QueueConsts::DEFAULT`](crate::utils::config::QueueConsts::DEFAULT).
    pub queue_size: Option<usize>,
    /// Sender patterns (glob syntax, e.g. `*-bot@chromium.org`) whose messages are skipped.
    pub bots: Vec<String>,
    /// Which reviews to load.
    pub population: Population,
    /// Write inside transactions and roll every one back.
    pub dry_run: bool,
}

impl From<&Opts> for LoadOpts {
    fn from(o: &Opts) -> Self {
        LoadOpts {
            num_workers: o.num_workers,
            queue_size: o.queue_size,
            bots: o.bots.clone(),
            population: o.population,
            dry_run: o.dry_run,
        }
    }
}

/// Full options (CLI). Use [`LoadOpts`] for lib.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Corpus database path. When None, uses the package default filename in the current directory.
    pub db_path: Option<PathBuf>,
    /// Worker thread count. When None, uses the host's core count.
    pub num_workers: Option<usize>,
    /// Bounded channel capacity.
    pub queue_size: Option<usize>,
    /// Bot sender patterns (glob syntax).
    pub bots: Vec<String>,
    pub population: Population,
    pub stage: Stage,
    /// Show progress bar and debug logging.
    pub verbose: bool,
    /// Roll back every transaction instead of committing.
    pub dry_run: bool,
}
