use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::{QueueConsts, WorkerConsts};
use crate::{Population, Stage};

/// Parallel corpus loader: derives message and token rows from stored reviews.
#[derive(Clone, Debug, Parser)]
#[command(name = "fanload")]
#[command(about = "Load messages and tokens from stored reviews; use --dry-run to count without writing.")]
pub struct Cli {
    /// Which stage to run. `all` runs messages, then tokens.
    #[arg(value_enum, value_name = "STAGE", default_value_t = Stage::All)]
    pub stage: Stage,

    /// Path to the corpus database. Default: `fanload.db` in the current directory.
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Worker thread count. Default: number of cores.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(u32).range(1..=WorkerConsts::MAX_WORKERS as i64))]
    pub workers: Option<u32>,

    /// Work items buffered between producer and workers.
    #[arg(long, short = 'q', value_parser = clap::value_parser!(u32).range(1..=QueueConsts::MAX as i64))]
    pub queue_size: Option<u32>,

    /// Reviews to load.
    #[arg(long = "pop", value_enum)]
    pub population: Option<Population>,

    /// Bot sender patterns (glob syntax) whose messages are skipped. Can specify multiple: -b p1 p2
    #[arg(long = "bot", short = 'b', num_args = 1..)]
    pub bots: Vec<String>,

    /// Write inside transactions and roll them all back; reports what would be loaded.
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output (progress bar, debug logging).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
