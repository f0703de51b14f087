//! Seams for the pluggable collaborators: how records are derived and where they are written.

use crate::SourceId;

use super::error_handler::{SinkError, TransformError};

/// Source-side collaborator: turns one source record into sub-records.
pub trait Producer {
    type Record;
    type Sub;

    /// Derive the id and every sub-record of one source record, in order.
    fn split(&self, record: Self::Record) -> anyhow::Result<(SourceId, Vec<Self::Sub>)>;

    /// Sub-records for which this returns true are dropped before enqueueing.
    fn exclude(&self, _sub: &Self::Sub) -> bool {
        false
    }
}

/// Pure transform from one sub-record to zero or more derived records.
/// An empty vec drops the sub-record; an error drops it and is logged.
pub trait Transform {
    type Sub;
    type Output;

    fn apply(&self, source_id: SourceId, sub: &Self::Sub)
    -> Result<Vec<Self::Output>, TransformError>;
}

/// Persistence target. One instance per worker; implementations must tolerate other
/// workers writing concurrently through their own instances.
pub trait Sink {
    type Record;
    type Tx<'a>: SinkTransaction<Record = Self::Record>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Tx<'_>, SinkError>;
}

/// A scoped transaction. Dropping it without commit must leave no rows behind.
pub trait SinkTransaction {
    type Record;

    /// Write every record; returns the number of rows written.
    fn bulk_write(&mut self, records: &[Self::Record]) -> Result<usize, SinkError>;
    fn commit(self) -> Result<(), SinkError>;
    fn rollback(self) -> Result<(), SinkError>;
}
