//! Loaders: the message and token stages, each one run of the pipeline engine with its own
//! source, producer, transform and sink.

pub mod messages;
pub mod tokens;

use anyhow::Result;
use log::warn;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::LoadOpts;
use crate::engine::db_ops::{SqlRow, SqliteSink, open_worker_db};
use crate::pipeline::PipelineTuning;
use crate::utils::config::{QueueConsts, WorkerConsts};

pub use messages::{MessageProducer, MessageTransform, NewMessage, RawMessage, run_message_load};
pub use tokens::{NewToken, TokenProducer, TokenTransform, run_token_load};

/// Caller-side hooks for one run: Ctrl+C flag and per-item progress callback.
#[derive(Default)]
pub struct RunHooks<'a> {
    pub cancel: Option<Arc<AtomicBool>>,
    pub on_item: Option<&'a dyn Fn(usize)>,
}

/// Tuning from opts; `expected_items` is the number of review ids the run covers.
/// Worker count and queue size are capped at [`WorkerConsts::MAX_WORKERS`] and [`QueueConsts::MAX`].
pub fn tuning_for(opts: &LoadOpts, expected_items: usize) -> PipelineTuning {
    let num_workers = capped(
        "worker count",
        opts.num_workers
            .unwrap_or_else(WorkerConsts::default_workers),
        WorkerConsts::MAX_WORKERS,
    );
    let queue_size = capped(
        "queue size",
        opts.queue_size.unwrap_or(QueueConsts::DEFAULT),
        QueueConsts::MAX,
    );
    PipelineTuning::new(num_workers, queue_size).with_expected_items(expected_items)
}

fn capped(what: &str, value: usize, max: usize) -> usize {
    if value > max {
        warn!("{} {} exceeds the maximum; using {}", what, value, max);
        return max;
    }
    value
}

/// Open one worker's sink on its own connection.
pub(crate) fn sink_for<R: SqlRow>(db_path: &Path, dry_run: bool) -> Result<SqliteSink<R>> {
    let conn = open_worker_db(db_path)?;
    Ok(if dry_run {
        SqliteSink::dry_run(conn)
    } else {
        SqliteSink::new(conn)
    })
}
