// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `salvor backup` command implementations.
//!
//! Covers the four artifact-lifecycle surfaces: `create` runs the dump or
//! snapshot pipeline, `replicate` ships restorable artifacts offsite,
//! `list` shows the local or remote inventory, and `prune` applies the
//! retention windows.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Subcommand, ValueEnum};
use salvor_config::SalvorConfig;
use salvor_core::types::{BackupArtifact, BackupKind, ReplicationStatus};
use salvor_core::SalvorError;
use salvor_replicate::RemoteEntry;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

/// Artifact kinds addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Relational database dump.
    Database,
    /// Contract deployment-metadata snapshot.
    Contracts,
}

impl KindArg {
    pub fn to_kind(self) -> BackupKind {
        match self {
            KindArg::Database => BackupKind::Database,
            KindArg::Contracts => BackupKind::ContractSnapshot,
        }
    }
}

/// Offsite providers selectable with `--provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    S3,
    Gcs,
    Azure,
    Fs,
}

impl ProviderArg {
    fn as_str(self) -> &'static str {
        match self {
            ProviderArg::S3 => "s3",
            ProviderArg::Gcs => "gcs",
            ProviderArg::Azure => "azure",
            ProviderArg::Fs => "fs",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Create a new backup artifact.
    Create(CreateArgs),
    /// Upload restorable local artifacts to the offsite provider.
    Replicate(ReplicateArgs),
    /// List local or offsite artifacts.
    List(ListArgs),
    /// Delete artifacts that are past their retention windows.
    Prune(PruneArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// What to back up.
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Encrypt the artifact with the configured key.
    #[arg(long)]
    pub encrypt: bool,
}

#[derive(Debug, Args)]
pub struct ReplicateArgs {
    /// Override the configured provider for this run.
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Only ship artifacts created within this window, e.g. `36h` or `7d`.
    #[arg(long, value_parser = parse_since, value_name = "DURATION")]
    pub since: Option<chrono::Duration>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Restrict the listing to one artifact kind.
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// List the offsite inventory instead of the local store.
    #[arg(long)]
    pub remote: bool,

    /// Emit the listing as JSON for scripting.
    #[arg(long)]
    pub json: bool,

    /// Disable colored output.
    #[arg(long)]
    pub plain: bool,
}

#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Prune the offsite inventory instead of local payloads.
    #[arg(long)]
    pub remote: bool,
}

pub async fn run(
    command: BackupCommand,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    match command {
        BackupCommand::Create(args) => run_create(args, config, cancel).await,
        BackupCommand::Replicate(args) => run_replicate(args, config, cancel).await,
        BackupCommand::List(args) => run_list(args, config).await,
        BackupCommand::Prune(args) => run_prune(args, config).await,
    }
}

async fn run_create(
    args: CreateArgs,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    let engine = Engine::build(config)?;

    let artifact = match args.kind {
        KindArg::Database => {
            engine
                .creator
                .create_database_backup(args.encrypt, cancel)
                .await?
        }
        KindArg::Contracts => {
            engine
                .creator
                .create_contract_snapshot(args.encrypt, cancel)
                .await?
        }
    };

    let form = if artifact.encrypted {
        "encrypted"
    } else {
        "plaintext"
    };
    println!(
        "created {} ({}, {form})",
        artifact.id,
        format_size(artifact.size_bytes)
    );
    if let Some(path) = &artifact.local_path {
        println!("  payload: {}", path.display());
    }
    println!("  sha256:  {}", artifact.checksum_sha256);

    Ok(())
}

async fn run_replicate(
    args: ReplicateArgs,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    let config = match args.provider {
        Some(provider) => {
            let mut overridden = (*config).clone();
            overridden.replication.provider = Some(provider.as_str().to_string());
            Arc::new(overridden)
        }
        None => config,
    };
    let provider_name = config.replication.provider.clone().unwrap_or_default();

    let engine = Engine::build(config)?;
    let replicator = engine.replicator()?.clone();

    let mut artifacts = Vec::new();
    for kind in [BackupKind::Database, BackupKind::ContractSnapshot] {
        artifacts.extend(engine.store.list(kind).await?);
    }
    let cutoff = args.since.map(|window| Utc::now() - window);
    artifacts.retain(|artifact| {
        artifact.is_restore_candidate()
            && cutoff.is_none_or(|cutoff| artifact.created_at >= cutoff)
    });

    if artifacts.is_empty() {
        println!("nothing to replicate");
        return Ok(());
    }

    let total = artifacts.len();
    println!("replicating {total} artifact(s) to {provider_name}");

    let outcomes = replicator.replicate_many(artifacts, cancel).await;

    let mut clean = 0usize;
    for (id, outcome) in &outcomes {
        match outcome {
            Ok(record) => {
                if record.status == ReplicationStatus::Valid {
                    clean += 1;
                }
                println!("  {id}: {} -> {}", record.status, record.remote_uri);
            }
            Err(error) => println!("  {id}: {error}"),
        }
    }

    if cancel.is_cancelled() {
        return Err(SalvorError::Cancelled);
    }
    if clean < total {
        return Err(SalvorError::Provider {
            provider: provider_name,
            message: format!("{} of {total} artifact(s) did not replicate cleanly", total - clean),
            source: None,
        });
    }
    println!("all {total} artifact(s) replicated and size-verified");
    Ok(())
}

async fn run_list(args: ListArgs, config: Arc<SalvorConfig>) -> Result<(), SalvorError> {
    let engine = Engine::build(config)?;
    let kinds = match args.kind {
        Some(kind) => vec![kind.to_kind()],
        None => vec![BackupKind::Database, BackupKind::ContractSnapshot],
    };
    let use_color = !args.plain && std::io::stdout().is_terminal();

    if args.remote {
        let replicator = engine.replicator()?;
        let mut entries = Vec::new();
        for kind in &kinds {
            entries.extend(replicator.list_remote(*kind).await?);
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
            );
        } else {
            print_remote_listing(&entries);
        }
    } else {
        let mut artifacts = Vec::new();
        for kind in &kinds {
            artifacts.extend(engine.store.list(*kind).await?);
        }
        artifacts.sort_by(|a, b| a.id.cmp(&b.id));

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&artifacts).unwrap_or_else(|_| "[]".to_string())
            );
        } else {
            print_local_listing(&artifacts, use_color);
        }
    }

    Ok(())
}

fn print_local_listing(artifacts: &[BackupArtifact], use_color: bool) {
    println!();
    println!("  local artifacts");
    println!("  {}", "-".repeat(50));

    if artifacts.is_empty() {
        println!("    (none)");
        println!();
        return;
    }

    for artifact in artifacts {
        let form = if artifact.encrypted {
            "encrypted"
        } else {
            "plaintext"
        };
        let state = if artifact.quarantined {
            "quarantined"
        } else if artifact.local_path.is_none() {
            "pruned"
        } else {
            "ok"
        };
        if use_color {
            use colored::Colorize;
            let state = match state {
                "ok" => state.green().to_string(),
                "pruned" => state.yellow().to_string(),
                _ => state.red().to_string(),
            };
            println!(
                "    {:<44} {:>9}  {form:<9} {state}",
                artifact.id.as_str(),
                format_size(artifact.size_bytes)
            );
        } else {
            println!(
                "    {:<44} {:>9}  {form:<9} {state}",
                artifact.id.as_str(),
                format_size(artifact.size_bytes)
            );
        }
    }
    println!();
}

fn print_remote_listing(entries: &[RemoteEntry]) {
    println!();
    println!("  offsite artifacts");
    println!("  {}", "-".repeat(50));

    if entries.is_empty() {
        println!("    (none)");
        println!();
        return;
    }

    for entry in entries {
        let modified = entry
            .last_modified
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {:<44} {:>9}  {modified}",
            entry.id.as_str(),
            format_size(entry.size_bytes)
        );
    }
    println!();
}

async fn run_prune(args: PruneArgs, config: Arc<SalvorConfig>) -> Result<(), SalvorError> {
    let engine = Engine::build(config)?;

    if args.remote {
        let report = engine.replicator()?.prune_remote(Utc::now()).await?;
        println!(
            "pruned {} offsite artifact(s), {} still within retention",
            report.pruned.len(),
            report.retained
        );
        for id in &report.pruned {
            println!("  {id}");
        }
    } else {
        let report = engine.store.prune(Utc::now()).await?;
        println!(
            "pruned {} local payload(s), {} within retention, {} quarantined kept",
            report.pruned.len(),
            report.retained,
            report.quarantined_kept
        );
        for id in &report.pruned {
            println!("  {id}");
        }
    }

    Ok(())
}

/// Parses a replication window like `30s`, `90m`, `36h`, or `7d`.
fn parse_since(raw: &str) -> Result<chrono::Duration, String> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let unit = chars
        .next_back()
        .ok_or_else(|| "empty duration".to_string())?;
    let value: i64 = chars
        .as_str()
        .parse()
        .map_err(|_| format!("invalid duration `{raw}`; expected forms like 36h or 7d"))?;
    if value <= 0 {
        return Err(format!("duration `{raw}` must be positive"));
    }
    match unit {
        's' => Ok(chrono::Duration::seconds(value)),
        'm' => Ok(chrono::Duration::minutes(value)),
        'h' => Ok(chrono::Duration::hours(value)),
        'd' => Ok(chrono::Duration::days(value)),
        _ => Err(format!(
            "invalid duration `{raw}`; expected a number with an s, m, h, or d suffix"
        )),
    }
}

/// Formats a byte count with a binary-unit suffix.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= GIB {
        format!("{:.1} GiB", bytes_f / GIB)
    } else if bytes_f >= MIB {
        format!("{:.1} MiB", bytes_f / MIB)
    } else if bytes_f >= KIB {
        format!("{:.1} KiB", bytes_f / KIB)
    } else {
        format!("{bytes} B")
    }
}
