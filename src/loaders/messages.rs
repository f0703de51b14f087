//! Message stage: review documents → cleaned `message` rows, bot senders skipped.

use anyhow::{Context, Result};
use log::info;
use rusqlite::Statement;
use serde::Deserialize;
use std::path::Path;

use crate::engine::db_ops::{INSERT_MESSAGE_SQL, ReviewRow, ReviewSource, SqlRow, open_worker_db};
use crate::engine::tools::{check_bot_patterns, clean_text, is_bot_sender};
use crate::pipeline::{Producer, Transform, TransformError, run_pipeline};
use crate::{LoadOpts, RunSummary, SourceId};

use super::{RunHooks, sink_for, tuning_for};

/// `review.document` shape; only the message list is read.
#[derive(Debug, Default, Deserialize)]
struct ReviewDocument {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

/// One message as it appears in a review document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Row for the `message` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub review_id: SourceId,
    pub posted: String,
    pub sender: String,
    pub text: String,
}

impl SqlRow for NewMessage {
    const INSERT_SQL: &'static str = INSERT_MESSAGE_SQL;

    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute((
            self.review_id,
            self.posted.as_str(),
            self.sender.as_str(),
            self.text.as_str(),
        ))
    }
}

/// Parses review documents; drops messages whose sender matches a bot pattern.
pub struct MessageProducer {
    bots: Vec<String>,
}

impl MessageProducer {
    pub fn new(bots: Vec<String>) -> Self {
        Self { bots }
    }
}

impl Producer for MessageProducer {
    type Record = ReviewRow;
    type Sub = RawMessage;

    fn split(&self, review: ReviewRow) -> Result<(SourceId, Vec<RawMessage>)> {
        let doc: ReviewDocument = serde_json::from_str(&review.document)
            .with_context(|| format!("parse document of review {}", review.id))?;
        Ok((review.id, doc.messages))
    }

    fn exclude(&self, message: &RawMessage) -> bool {
        message
            .sender
            .as_deref()
            .is_some_and(|s| is_bot_sender(s, &self.bots))
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, TransformError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(TransformError::MissingField(name))
}

/// One raw message → one `message` row with cleaned text. Date and sender are required.
pub struct MessageTransform;

impl Transform for MessageTransform {
    type Sub = RawMessage;
    type Output = NewMessage;

    fn apply(&self, review_id: SourceId, raw: &RawMessage) -> Result<Vec<NewMessage>, TransformError> {
        let posted = required(&raw.date, "date")?;
        let sender = required(&raw.sender, "sender")?;
        Ok(vec![NewMessage {
            review_id,
            posted: posted.to_string(),
            sender: sender.to_string(),
            text: clean_text(raw.text.as_deref().unwrap_or_default()),
        }])
    }
}

/// Load messages for `ids` from `db_path` into the `message` table.
pub fn run_message_load(
    db_path: &Path,
    ids: Vec<SourceId>,
    opts: &LoadOpts,
    hooks: &RunHooks<'_>,
) -> Result<RunSummary> {
    check_bot_patterns(&opts.bots)?;
    let tuning = tuning_for(opts, ids.len());
    info!(
        "Loading messages of {} reviews with {} workers",
        ids.len(),
        tuning.num_workers
    );
    let source = ReviewSource::new(open_worker_db(db_path)?, ids);
    run_pipeline(
        source,
        MessageProducer::new(opts.bots.clone()),
        MessageTransform,
        |_| sink_for::<NewMessage>(db_path, opts.dry_run),
        &tuning,
        hooks.cancel.clone(),
        hooks.on_item,
    )
}
