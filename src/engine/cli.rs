//! CLI command handler: run the message and/or token stage; --dry-run rolls every write back.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::arg_parser::Cli;
use crate::engine::db_ops::{QueryCache, open_db};
use crate::engine::progress::{ItemProgress, bar_for};
use crate::loaders::{RunHooks, run_message_load, run_token_load};
use crate::pipeline::log_failed_items;
use crate::utils::config::PackagePaths;
use crate::utils::fanload_toml::{apply_env_to_opts, apply_file_to_opts, load_fanload_toml};
use crate::utils::{Colors, setup_logging};
use crate::{LoadOpts, Opts, RunSummary, Stage};

/// Defaults → `.fanload.toml` → environment / `.env` → CLI flags.
fn setup_opts(cli: &Cli) -> Result<Opts> {
    let dir = Path::new(".");
    let file = load_fanload_toml(dir)?;
    let verbose = cli
        .verbose
        .or_else(|| file.as_ref().and_then(|f| f.verbose()))
        .unwrap_or(false);
    setup_logging(verbose);

    let mut opts = Opts::default();
    if let Some(ref file) = file {
        apply_file_to_opts(file, &mut opts);
    }
    apply_env_to_opts(dir, &mut opts);

    if cli.db.is_some() {
        opts.db_path = cli.db.clone();
    }
    if let Some(n) = cli.workers {
        opts.num_workers = Some(n as usize);
    }
    if let Some(n) = cli.queue_size {
        opts.queue_size = Some(n as usize);
    }
    if let Some(p) = cli.population {
        opts.population = p;
    }
    if !cli.bots.is_empty() {
        opts.bots = cli.bots.clone();
    }
    opts.stage = cli.stage;
    opts.dry_run = cli.dry_run;
    opts.verbose = verbose;
    Ok(opts)
}

fn stages(stage: Stage) -> &'static [Stage] {
    match stage {
        Stage::Messages => &[Stage::Messages],
        Stage::Tokens => &[Stage::Tokens],
        Stage::All => &[Stage::Messages, Stage::Tokens],
    }
}

fn stage_noun(stage: Stage) -> &'static str {
    match stage {
        Stage::Messages => "messages",
        Stage::Tokens => "tokens",
        Stage::All => "rows",
    }
}

/// Run one stage with an optional progress bar over its review ids.
fn run_stage(
    stage: Stage,
    db_path: &Path,
    ids: Vec<i64>,
    opts: &Opts,
    cancel: &Arc<AtomicBool>,
) -> Result<RunSummary> {
    let load_opts = LoadOpts::from(opts);
    let progress = opts.verbose.then(|| {
        let desc = match stage {
            Stage::Tokens => "Tokens",
            _ => "Messages",
        };
        ItemProgress::new(bar_for(Some(ids.len()), desc))
    });
    let on_item = |n: usize| {
        if let Some(ref p) = progress {
            p.on_item(n);
        }
    };
    let hooks = RunHooks {
        cancel: Some(Arc::clone(cancel)),
        on_item: Some(&on_item),
    };
    let summary = match stage {
        Stage::Tokens => run_token_load(db_path, ids, &load_opts, &hooks),
        _ => run_message_load(db_path, ids, &load_opts, &hooks),
    };
    if let Some(ref p) = progress {
        p.finish();
    }
    summary
}

fn print_summary(stage: Stage, summary: &RunSummary, dry_run: bool) {
    let verb = if dry_run { "would be loaded" } else { "loaded" };
    println!(
        "{} {} from {} reviews",
        Colors::colorize(
            Colors::WRITTEN,
            &format!("{} {}", summary.total, stage_noun(stage))
        ),
        verb,
        summary.items
    );
    if summary.producer.excluded > 0 {
        println!(
            "  {}",
            Colors::colorize(
                Colors::EXCLUDED,
                &format!("{} skipped by filter", summary.producer.excluded)
            )
        );
    }
    if !summary.failed.is_empty() {
        println!(
            "  {}",
            Colors::colorize(
                Colors::FAILED,
                &format!("{} reviews rolled back", summary.failed.len())
            )
        );
    }
}

/// Run the requested stages against the corpus database.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    debug!("{:#?}", opts);
    if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NOTHING WILL BE WRITTEN TO THE DATABASE.");
    }
    let db_path = opts
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().db_filename()));
    let conn = open_db(&db_path)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    // Lives for this run only.
    let mut cache = QueryCache::new();
    for &stage in stages(opts.stage) {
        let ids = cache.review_ids(&conn, opts.population)?.to_vec();
        info!("{} stage: {} reviews", stage_noun(stage), ids.len());
        let summary = run_stage(stage, &db_path, ids, &opts, &cancel)?;
        print_summary(stage, &summary, opts.dry_run);
        log_failed_items(&summary, opts.verbose);
        if summary.cancelled {
            return Err(anyhow::anyhow!(
                "Load cancelled by user; items committed before the interrupt were kept"
            ));
        }
    }
    Ok(())
}
