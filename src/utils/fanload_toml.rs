//! Load `.fanload.toml` and environment overrides (CLI only). Lib does not use this; the
//! consuming program injects config via LoadOpts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;
use crate::{Opts, Population};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FanloadToml {
    #[serde(default)]
    settings: LoadSection,
}

#[derive(Debug, Default, Deserialize)]
struct LoadSection {
    db_path: Option<String>,
    workers: Option<usize>,
    queue_size: Option<usize>,
    bots: Option<Vec<String>>,
    population: Option<Population>,
    verbose: Option<bool>,
}

impl FanloadToml {
    /// `verbose` from the file, needed before logging is set up.
    pub(crate) fn verbose(&self) -> Option<bool> {
        self.settings.verbose
    }
}

/// Load `.fanload.toml` from `dir` if present. A file that exists but cannot be read or parsed is an error.
pub(crate) fn load_fanload_toml(dir: &Path) -> Result<Option<FanloadToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    if !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let file = parse_fanload_toml(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(file))
}

pub(crate) fn parse_fanload_toml(s: &str) -> Result<FanloadToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only set fields present in the file). Call before env and CLI.
pub(crate) fn apply_file_to_opts(file: &FanloadToml, opts: &mut Opts) {
    let idx = &file.settings;
    if let Some(ref p) = idx.db_path {
        opts.db_path = Some(PathBuf::from(p));
    }
    if idx.workers.is_some() {
        opts.num_workers = idx.workers;
    }
    if idx.queue_size.is_some() {
        opts.queue_size = idx.queue_size;
    }
    if let Some(ref v) = idx.bots {
        opts.bots = v.clone();
    }
    apply_file_opt!(idx, opts, population => population);
    apply_file_opt!(idx, opts, verbose => verbose);
}

/// Read `FANLOAD_*` variables, loading `.env` from `dir` first when present (existing
/// environment variables win over `.env`).
pub(crate) fn apply_env_to_opts(dir: &Path, opts: &mut Opts) {
    let env_path = dir.join(".env");
    if env_path.is_file()
        && let Err(e) = dotenvy::from_path(&env_path)
    {
        log::warn!("{}: {}", env_path.display(), e);
    }
    let paths = PackagePaths::get();
    if let Ok(p) = std::env::var(paths.env_var("DB")) {
        let p = p.trim();
        if !p.is_empty() {
            opts.db_path = Some(PathBuf::from(p));
        }
    }
    if let Some(n) = env_usize(&paths.env_var("WORKERS")) {
        opts.num_workers = Some(n);
    }
    if let Some(n) = env_usize(&paths.env_var("QUEUE_SIZE")) {
        opts.queue_size = Some(n);
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    raw.trim()
        .parse()
        .map_err(|e| log::warn!("{}={:?}: {}", key, raw, e))
        .ok()
}
