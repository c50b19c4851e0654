// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `salvor restore run` command implementation.
//!
//! Resolves the artifact to restore (`--artifact`, `--latest`, or an
//! interactive pick over local and offsite candidates), dispatches to the
//! orchestrator, and renders the persisted job record. A restore that ran
//! to a failed verdict still produced a job record; the command prints the
//! categorized failure and exits non-zero.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use salvor_config::SalvorConfig;
use salvor_core::types::{ArtifactId, BackupKind, RestoreJob, RestoreMode, RestoreTarget};
use salvor_core::SalvorError;
use salvor_restore::RestoreSource;
use tokio_util::sync::CancellationToken;

use crate::backup::{format_size, KindArg};
use crate::engine::Engine;

#[derive(Debug, Subcommand)]
pub enum RestoreCommand {
    /// Execute a restore job end to end.
    Run(RunArgs),
}

/// Restore mode selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Restore into the production target; requires confirmation settings.
    Production,
    /// Restore into a disposable drill target.
    Drill,
}

impl ModeArg {
    fn to_mode(self) -> RestoreMode {
        match self {
            ModeArg::Production => RestoreMode::Production,
            ModeArg::Drill => RestoreMode::Drill,
        }
    }
}

#[derive(Debug, Args)]
#[command(group = ArgGroup::new("selection").required(true).args(["artifact", "latest", "interactive"]))]
pub struct RunArgs {
    /// Artifact id to restore.
    #[arg(long, value_name = "ID")]
    pub artifact: Option<String>,

    /// Restore the newest restorable artifact of `--kind`.
    #[arg(long)]
    pub latest: bool,

    /// Pick the artifact from a numbered list of local and offsite candidates.
    #[arg(long)]
    pub interactive: bool,

    /// Destination: a database descriptor, or a directory for contract snapshots.
    #[arg(long, value_name = "DESCRIPTOR")]
    pub target: String,

    /// Whether the destination is production or a disposable drill target.
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    /// Artifact kind for `--latest` and `--interactive` selection.
    #[arg(long, value_enum, default_value_t = KindArg::Database)]
    pub kind: KindArg,

    /// Fetch the payload from the offsite provider instead of the local store.
    #[arg(long)]
    pub remote: bool,
}

pub async fn run(
    command: RestoreCommand,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    match command {
        RestoreCommand::Run(args) => run_restore(args, config, cancel).await,
    }
}

async fn run_restore(
    args: RunArgs,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    let engine = Engine::build(config.clone())?;
    let (source, kind) = select_source(&args, &engine).await?;
    let mode = args.mode.to_mode();

    let job = match kind {
        BackupKind::Database => {
            let target = RestoreTarget::new(args.target.clone());
            engine
                .orchestrator
                .restore_database(source, target, mode, cancel)
                .await?
        }
        BackupKind::ContractSnapshot => {
            engine
                .orchestrator
                .restore_contract_snapshot(source, Path::new(&args.target), mode, cancel)
                .await?
        }
        BackupKind::FileStore => {
            return Err(SalvorError::Config(
                "filestore artifacts have no restore pipeline".to_string(),
            ));
        }
    };

    let record = config.reports_dir().join(format!("{}.json", job.id));
    print_outcome(&job, &record);

    if !job.succeeded() {
        let category = job.failure_category.as_deref().unwrap_or("internal");
        let reason = job.failure_reason.as_deref().unwrap_or("unknown failure");
        eprintln!("error[{category}]: restore {} failed: {reason}", job.id);
        eprintln!("job record: {}", record.display());
        std::process::exit(1);
    }
    Ok(())
}

/// Resolves the selection flags to a restore source and artifact kind.
///
/// With `--artifact` the kind comes from the id prefix; the other two
/// selection modes use `--kind` (default `database`).
async fn select_source(
    args: &RunArgs,
    engine: &Engine,
) -> Result<(RestoreSource, BackupKind), SalvorError> {
    if let Some(raw) = &args.artifact {
        let id = ArtifactId(raw.clone());
        let kind = id.kind().ok_or_else(|| {
            SalvorError::Config(format!("artifact id `{raw}` does not name a backup kind"))
        })?;
        let source = if args.remote {
            RestoreSource::Remote(id)
        } else {
            RestoreSource::Local(id)
        };
        return Ok((source, kind));
    }

    let kind = args.kind.to_kind();
    if args.interactive {
        return pick_interactively(engine, kind).await;
    }

    // --latest
    if args.remote {
        let entries = engine.replicator()?.list_remote(kind).await?;
        let newest = entries
            .into_iter()
            .max_by(|a, b| a.id.cmp(&b.id))
            .ok_or_else(|| {
                SalvorError::Config(format!("no offsite {kind} artifact to restore"))
            })?;
        Ok((RestoreSource::Remote(newest.id), kind))
    } else {
        let artifact = engine.store.latest(kind).await?.ok_or_else(|| {
            SalvorError::Config(format!("no restorable local {kind} artifact"))
        })?;
        Ok((RestoreSource::Local(artifact.id), kind))
    }
}

/// Lists local and offsite candidates and prompts for a number on stdin.
async fn pick_interactively(
    engine: &Engine,
    kind: BackupKind,
) -> Result<(RestoreSource, BackupKind), SalvorError> {
    let mut candidates: Vec<(RestoreSource, String)> = Vec::new();

    for artifact in engine.store.list(kind).await? {
        if artifact.is_restore_candidate() {
            let line = format!(
                "{:<44} {:>9}  local",
                artifact.id.as_str(),
                format_size(artifact.size_bytes)
            );
            candidates.push((RestoreSource::Local(artifact.id), line));
        }
    }
    if let Some(replicator) = &engine.replicator {
        for entry in replicator.list_remote(kind).await? {
            let line = format!(
                "{:<44} {:>9}  offsite",
                entry.id.as_str(),
                format_size(entry.size_bytes)
            );
            candidates.push((RestoreSource::Remote(entry.id), line));
        }
    }

    if candidates.is_empty() {
        return Err(SalvorError::Config(format!(
            "no {kind} restore candidate, locally or offsite"
        )));
    }

    println!("restore candidates:");
    for (index, (_, line)) in candidates.iter().enumerate() {
        println!("  {:>2}. {line}", index + 1);
    }

    let picked = prompt_index(candidates.len())?;
    let (source, _) = candidates.remove(picked);
    Ok((source, kind))
}

fn prompt_index(total: usize) -> Result<usize, SalvorError> {
    use std::io::Write;

    print!("select artifact [1-{total}]: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();

    let picked: usize = trimmed.parse().map_err(|_| {
        SalvorError::Config(format!("`{trimmed}` is not a number between 1 and {total}"))
    })?;
    if picked == 0 || picked > total {
        return Err(SalvorError::Config(format!(
            "selection {picked} is out of range 1-{total}"
        )));
    }
    Ok(picked - 1)
}

fn print_outcome(job: &RestoreJob, record: &Path) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    println!("  restore {}", job.id);
    println!("  {}", "-".repeat(50));
    println!("    artifact: {}", job.source_artifact_id);
    println!("    target:   {}", job.target);
    println!("    mode:     {}", job.mode);

    if use_color {
        use colored::Colorize;
        if job.succeeded() {
            println!("    status:   {} {}", "✓".green(), "succeeded".green());
        } else {
            println!("    status:   {} {}", "✗".red(), "failed".red());
        }
    } else if job.succeeded() {
        println!("    status:   [OK] succeeded");
    } else {
        println!("    status:   [FAIL] failed");
    }

    if let Some(reason) = &job.failure_reason {
        println!("    reason:   {reason}");
    }
    println!("    record:   {}", record.display());
    println!();
}
