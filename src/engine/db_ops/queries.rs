//! Review id lookups, memoized for the lifetime of one run.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::{Population, SourceId};

fn population_sql(population: Population) -> &'static str {
    match population {
        Population::All => "SELECT id FROM review ORDER BY id",
        Population::Missed => "SELECT id FROM review WHERE missed_vulnerability = 1 ORDER BY id",
        Population::Neutral => "SELECT id FROM review WHERE missed_vulnerability = 0 ORDER BY id",
    }
}

/// Per-run cache of review ids by population. Build one per run and drop it when the run ends;
/// it never sees writes made after a lookup.
#[derive(Debug, Default)]
pub struct QueryCache {
    review_ids: HashMap<Population, Vec<SourceId>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every review in `population`, ascending. Queried on first use only.
    pub fn review_ids(&mut self, conn: &Connection, population: Population) -> Result<&[SourceId]> {
        let ids = match self.review_ids.entry(population) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let mut stmt = conn.prepare(population_sql(population))?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, SourceId>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .with_context(|| format!("query {:?} review ids", population))?;
                debug!("{} review ids for population {:?}", ids.len(), population);
                e.insert(ids)
            }
        };
        Ok(ids.as_slice())
    }

    pub fn is_cached(&self, population: Population) -> bool {
        self.review_ids.contains_key(&population)
    }
}
