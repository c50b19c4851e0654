// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Salvor -- backup, integrity, replication, and restore engine.
//!
//! Binary entry point. Subcommands cover the operator surfaces: `backup`
//! for the artifact lifecycle, `restore` for bringing an artifact back
//! into a database or directory, and `drill` for the scheduled disaster
//! recovery exercise.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use salvor_config::{ConfigError, SalvorConfig};

mod backup;
mod drill;
mod engine;
mod restore;
mod shutdown;

/// Salvor -- backup, integrity, replication, and restore engine.
#[derive(Parser, Debug)]
#[command(name = "salvor", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, replicate, list, and prune backup artifacts.
    #[command(subcommand)]
    Backup(backup::BackupCommand),
    /// Restore an artifact into a database or directory.
    #[command(subcommand)]
    Restore(restore::RestoreCommand),
    /// Run the disaster recovery drill.
    #[command(subcommand)]
    Drill(drill::DrillCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(errors) => {
            salvor_config::render_errors(&errors);
            std::process::exit(2);
        }
    };

    init_tracing(&config.engine.log_level);

    let cancel = shutdown::install_signal_handler();

    let result = match cli.command {
        Commands::Backup(command) => backup::run(command, config, &cancel).await,
        Commands::Restore(command) => restore::run(command, config, &cancel).await,
        Commands::Drill(command) => drill::run(command, config, &cancel).await,
    };

    if let Err(err) = result {
        eprintln!("error[{}]: {err}", err.category());
        std::process::exit(err.exit_code());
    }
}

fn load_config(path: Option<&Path>) -> Result<SalvorConfig, Vec<ConfigError>> {
    match path {
        Some(path) => salvor_config::load_and_validate_path(path),
        None => salvor_config::load_and_validate(),
    }
}

/// Installs the fmt subscriber; `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("salvor={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
