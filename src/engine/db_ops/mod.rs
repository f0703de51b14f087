//! Database operations: schema, connections, per-worker sink, lazy sources, id lookups.

mod connection;
mod queries;
mod sink;
mod source;

pub use connection::{count_rows, open_db, open_db_in_memory, open_worker_db};
pub use queries::QueryCache;
pub use sink::{SqlRow, SqliteSink, SqliteTx};
pub use source::{MessageRow, MessageSource, ReviewRow, ReviewSource};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Insert statement for the message table.
pub(crate) const INSERT_MESSAGE_SQL: &str =
    "INSERT INTO message (review_id, posted, sender, text) VALUES (?1, ?2, ?3, ?4)";

/// Insert statement for the token table.
pub(crate) const INSERT_TOKEN_SQL: &str =
    "INSERT INTO token (message_id, token, base, frequency, pos) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Schema for review, message and token tables.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS review (
    id INTEGER PRIMARY KEY,
    created TEXT NOT NULL DEFAULT '',
    is_open INTEGER NOT NULL DEFAULT 0,
    was_committed INTEGER NOT NULL DEFAULT 0,
    missed_vulnerability INTEGER NOT NULL DEFAULT 0,
    num_messages INTEGER NOT NULL DEFAULT 0,
    document TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_review_created ON review(created);

CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    review_id INTEGER NOT NULL REFERENCES review(id),
    posted TEXT NOT NULL,
    sender TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_message_review ON message(review_id);

CREATE TABLE IF NOT EXISTS token (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL REFERENCES message(id),
    token TEXT NOT NULL CHECK (token <> ''),
    base TEXT NOT NULL DEFAULT '',
    frequency INTEGER NOT NULL CHECK (frequency > 0),
    pos TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_token_message ON token(message_id);
CREATE INDEX IF NOT EXISTS idx_token_token ON token(token);
CREATE INDEX IF NOT EXISTS idx_token_base ON token(base);
"#;
