//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    db_filename: String,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                db_filename: format!("{pkg}.db"),
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    /// Default corpus database filename (in the current directory).
    pub fn db_filename(&self) -> &str {
        &self.db_filename
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable name for `key`, e.g. `FANLOAD_WORKERS`.
    pub fn env_var(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key)
    }
}

// ---- Worker threads ----

/// Worker count bounds.
pub struct WorkerConsts;

impl WorkerConsts {
    /// Upper bound on the worker count; each worker holds its own SQLite connection.
    pub const MAX_WORKERS: usize = 64;

    /// Default worker count: host core count (from rayon), capped at [`Self::MAX_WORKERS`].
    pub fn default_workers() -> usize {
        rayon::current_num_threads().clamp(1, Self::MAX_WORKERS)
    }
}

// ---- Queue ----

/// Input channel capacity.
pub struct QueueConsts;

impl QueueConsts {
    /// Default number of work items buffered between producer and workers.
    pub const DEFAULT: usize = 1_000;

    /// Upper bound on the capacity; the bounded channel allocates every slot up front.
    pub const MAX: usize = 100_000;
}

// ---- Progress ----

/// Progress bar refresh granularity (items per bar update).
pub const PROGRESS_UPDATE_BATCH_SIZE: usize = 10;

// ---- Database ----

/// How long a worker connection waits for the write lock before a write fails.
pub const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

// ---- Diagnostics ----

/// Max characters of an error message logged per failed item.
pub const DIAGNOSTIC_MAX_CHARS: usize = 120;
