//! fanload: parallel corpus loader built on a single-producer, N-worker, sentinel-terminated pipeline.

pub mod engine;
pub mod loaders;
pub mod nlp;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::path::Path;

use crate::engine::db_ops::{QueryCache, open_db};
use crate::loaders::{RunHooks, run_message_load, run_token_load};

/// Result alias used by public fanload API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

fn log_config(opts: &LoadOpts) {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
}

/// Load `message` rows for every review of `opts.population` in the database at `db_path`.
///
/// Creates the schema when missing. Returns the run summary; `summary.total` is the number of
/// message rows persisted. Failed reviews are rolled back individually and listed in `summary.failed`.
pub fn load_messages(db_path: &Path, opts: &LoadOpts) -> Result<RunSummary> {
    log_config(opts);
    let conn = open_db(db_path)?;
    let ids = QueryCache::new()
        .review_ids(&conn, opts.population)?
        .to_vec();
    run_message_load(db_path, ids, opts, &RunHooks::default())
}

/// Load `token` rows for the stored messages of every review of `opts.population`.
///
/// Run [`load_messages`] first; reviews without messages contribute nothing.
pub fn load_tokens(db_path: &Path, opts: &LoadOpts) -> Result<RunSummary> {
    log_config(opts);
    let conn = open_db(db_path)?;
    let ids = QueryCache::new()
        .review_ids(&conn, opts.population)?
        .to_vec();
    run_token_load(db_path, ids, opts, &RunHooks::default())
}
