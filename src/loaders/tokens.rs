//! Token stage: stored messages → summarizer → `token` rows.

use anyhow::Result;
use log::info;
use rusqlite::Statement;
use std::path::Path;

use crate::engine::db_ops::{INSERT_TOKEN_SQL, MessageRow, MessageSource, SqlRow, open_worker_db};
use crate::nlp::summarize;
use crate::pipeline::{Producer, Transform, TransformError, run_pipeline};
use crate::{LoadOpts, RunSummary, SourceId};

use super::{RunHooks, sink_for, tuning_for};

/// Row for the `token` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewToken {
    pub message_id: i64,
    pub token: String,
    pub base: String,
    pub frequency: usize,
    pub pos: &'static str,
}

impl SqlRow for NewToken {
    const INSERT_SQL: &'static str = INSERT_TOKEN_SQL;

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute((
            self.message_id,
            self.token.as_str(),
            self.base.as_str(),
            self.frequency as i64,
            self.pos,
        ))
    }
}

/// Groups a review's stored messages into one work item; blank messages are excluded.
pub struct TokenProducer;

impl Producer for TokenProducer {
    type Record = (SourceId, Vec<MessageRow>);
    type Sub = MessageRow;

    fn split(&self, record: (SourceId, Vec<MessageRow>)) -> Result<(SourceId, Vec<MessageRow>)> {
        Ok(record)
    }

    fn exclude(&self, message: &MessageRow) -> bool {
        message.text.trim().is_empty()
    }
}

/// One message → one row per distinct token.
pub struct TokenTransform;

impl Transform for TokenTransform {
    type Sub = MessageRow;
    type Output = NewToken;

    fn apply(&self, _review_id: SourceId, message: &MessageRow) -> Result<Vec<NewToken>, TransformError> {
        Ok(summarize(&message.text)
            .into_iter()
            .map(|s| NewToken {
                message_id: message.id,
                token: s.token,
                base: s.base,
                frequency: s.frequency,
                pos: s.pos,
            })
            .collect())
    }
}

/// Load tokens for the messages of `ids` from `db_path` into the `token` table.
pub fn run_token_load(
    db_path: &Path,
    ids: Vec<SourceId>,
    opts: &LoadOpts,
    hooks: &RunHooks<'_>,
) -> Result<RunSummary> {
    let tuning = tuning_for(opts, ids.len());
    info!(
        "Loading tokens of {} reviews with {} workers",
        ids.len(),
        tuning.num_workers
    );
    let source = MessageSource::new(open_worker_db(db_path)?, ids);
    run_pipeline(
        source,
        TokenProducer,
        TokenTransform,
        |_| sink_for::<NewToken>(db_path, opts.dry_run),
        &tuning,
        hooks.cancel.clone(),
        hooks.on_item,
    )
}
