//! SQLite sink: one connection per worker, one IMMEDIATE transaction per work item.

use rusqlite::{Connection, Statement, Transaction, TransactionBehavior};
use std::marker::PhantomData;

use crate::pipeline::{Sink, SinkError, SinkTransaction};

/// A derived record that knows how to insert itself.
pub trait SqlRow {
    const INSERT_SQL: &'static str;

    /// Execute `stmt` (prepared from [`Self::INSERT_SQL`]) for this row; returns rows changed.
    fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize>;
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => SinkError::Constraint(err.to_string()),
            _ => SinkError::Write(err.to_string()),
        }
    }
}

/// Writes rows of type `R` through its own connection. In dry-run mode every commit is a rollback.
pub struct SqliteSink<R> {
    conn: Connection,
    dry_run: bool,
    _rows: PhantomData<fn(&R)>,
}

impl<R> SqliteSink<R> {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            dry_run: false,
            _rows: PhantomData,
        }
    }

    /// Sink whose transactions are always rolled back; counts what would have been written.
    pub fn dry_run(conn: Connection) -> Self {
        Self {
            conn,
            dry_run: true,
            _rows: PhantomData,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub struct SqliteTx<'a, R> {
    tx: Transaction<'a>,
    dry_run: bool,
    _rows: PhantomData<fn(&R)>,
}

impl<R: SqlRow> Sink for SqliteSink<R> {
    type Record = R;
    type Tx<'a>
        = SqliteTx<'a, R>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<SqliteTx<'_, R>, SinkError> {
        // IMMEDIATE takes the write lock up front, so concurrent workers wait on the busy
        // timeout instead of failing a deferred lock upgrade.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| SinkError::Transaction(e.to_string()))?;
        Ok(SqliteTx {
            tx,
            dry_run: self.dry_run,
            _rows: PhantomData,
        })
    }
}

impl<R: SqlRow> SinkTransaction for SqliteTx<'_, R> {
    type Record = R;

    fn bulk_write(&mut self, records: &[R]) -> Result<usize, SinkError> {
        let mut stmt = self.tx.prepare_cached(R::INSERT_SQL)?;
        let mut written = 0_usize;
        for record in records {
            written += record.insert(&mut stmt)?;
        }
        Ok(written)
    }

    fn commit(self) -> Result<(), SinkError> {
        let res = if self.dry_run {
            self.tx.rollback()
        } else {
            self.tx.commit()
        };
        res.map_err(|e| SinkError::Transaction(e.to_string()))
    }

    fn rollback(self) -> Result<(), SinkError> {
        self.tx
            .rollback()
            .map_err(|e| SinkError::Transaction(e.to_string()))
    }
}
