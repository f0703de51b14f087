//! Lazy sources: each owns a dedicated connection and fetches one review per `next()`,
//! so the full corpus is never materialized.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::SourceId;

/// One review as stored: id plus its raw JSON document.
#[derive(Clone, Debug)]
pub struct ReviewRow {
    pub id: SourceId,
    pub document: String,
}

/// One stored message of a review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
}

/// Reviews fetched by id, in the order given.
pub struct ReviewSource {
    conn: Connection,
    ids: std::vec::IntoIter<SourceId>,
}

impl ReviewSource {
    pub fn new(conn: Connection, ids: Vec<SourceId>) -> Self {
        Self {
            conn,
            ids: ids.into_iter(),
        }
    }
}

fn fetch_review(conn: &Connection, id: SourceId) -> Result<ReviewRow> {
    let document: Option<String> = conn
        .prepare_cached("SELECT document FROM review WHERE id = ?1")?
        .query_row([id], |row| row.get(0))
        .optional()
        .with_context(|| format!("read review {}", id))?;
    let document = document.with_context(|| format!("review {} not found", id))?;
    Ok(ReviewRow { id, document })
}

impl Iterator for ReviewSource {
    type Item = Result<ReviewRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(fetch_review(&self.conn, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

/// Messages of each review, fetched by review id, in the order given.
pub struct MessageSource {
    conn: Connection,
    ids: std::vec::IntoIter<SourceId>,
}

impl MessageSource {
    pub fn new(conn: Connection, ids: Vec<SourceId>) -> Self {
        Self {
            conn,
            ids: ids.into_iter(),
        }
    }
}

fn fetch_messages(conn: &Connection, review_id: SourceId) -> Result<Vec<MessageRow>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, text FROM message WHERE review_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map([review_id], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            text: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read messages of review {}", review_id))
}

impl Iterator for MessageSource {
    type Item = Result<(SourceId, Vec<MessageRow>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(fetch_messages(&self.conn, id).map(|messages| (id, messages)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}
