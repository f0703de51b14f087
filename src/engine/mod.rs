//! Engine module: CLI, storage, progress, and text helpers around the pipeline

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use db_ops::{QueryCache, count_rows, open_db, open_db_in_memory, open_worker_db};
pub use tools::{check_bot_patterns, clean_text, glob_match, is_bot_sender};
