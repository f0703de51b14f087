//! Open corpus database connections.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::path::Path;

use crate::utils::config::DB_BUSY_TIMEOUT;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Per-connection settings: FK enforcement and waiting on other writers instead of failing.
fn apply_connection_settings(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    conn.busy_timeout(DB_BUSY_TIMEOUT)
        .context("set busy timeout")?;
    Ok(())
}

/// Open or create the corpus DB and ensure schema + WAL with optimizations.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open database {}", path.display()))?;
    apply_connection_settings(&conn)?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an extra connection for a worker or the producer. Schema must already exist (see [`open_db`]).
pub fn open_worker_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open worker connection to {}", path.display()))?;
    apply_connection_settings(&conn)?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (single connection only; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    apply_connection_settings(&conn)?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

/// Row count of one of the corpus tables.
pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let sql = match table {
        "review" => "SELECT COUNT(*) FROM review",
        "message" => "SELECT COUNT(*) FROM message",
        "token" => "SELECT COUNT(*) FROM token",
        other => bail!("unknown table {:?}", other),
    };
    let n: i64 = conn
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("count rows in {}", table))?;
    Ok(n.max(0) as usize)
}
