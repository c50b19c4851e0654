// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `salvor drill run` command implementation.
//!
//! Runs every drill phase through the harness and renders the persisted
//! report. The command exits zero even when phases failed: the report and
//! the alert sink carry the verdict, and a paging pipeline hanging off the
//! exit code would fire twice for the same failure.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use salvor_config::SalvorConfig;
use salvor_core::types::{DrillReport, DrillStatus};
use salvor_core::SalvorError;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

#[derive(Debug, Subcommand)]
pub enum DrillCommand {
    /// Execute every drill phase and write the timestamped report.
    Run,
}

pub async fn run(
    command: DrillCommand,
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    match command {
        DrillCommand::Run => run_drill(config, cancel).await,
    }
}

async fn run_drill(
    config: Arc<SalvorConfig>,
    cancel: &CancellationToken,
) -> Result<(), SalvorError> {
    let engine = Engine::build(config.clone())?;
    let report = engine.harness.run(cancel).await?;
    print_report(&report, &config.reports_dir());
    Ok(())
}

fn print_report(report: &DrillReport, reports_dir: &Path) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    println!("  drill {}", report.drill_id);
    println!("  {}", "-".repeat(50));

    for (phase, seconds) in &report.rto_seconds_by_phase {
        let failed = report.issues.iter().any(|issue| issue.phase == *phase);
        let millis = (seconds * 1000.0).round() as u64;
        if use_color {
            use colored::Colorize;
            let symbol = if failed {
                "✗".red().to_string()
            } else {
                "✓".green().to_string()
            };
            println!("    {symbol} {phase:<20} ({millis}ms)");
        } else if failed {
            println!("    [FAIL] {phase:<20} ({millis}ms)");
        } else {
            println!("    [OK]   {phase:<20} ({millis}ms)");
        }
    }

    for issue in &report.issues {
        if use_color {
            use colored::Colorize;
            println!(
                "    {} {}: {}",
                "!".yellow(),
                issue.phase,
                issue.message.yellow()
            );
        } else {
            println!("    [WARN] {}: {}", issue.phase, issue.message);
        }
    }

    println!();
    let status = status_line(report.overall_status, use_color);
    println!(
        "    {} of {} checks passed, status {status}",
        report.tests_passed, report.tests_total
    );
    println!(
        "    rpo estimate: {}h worst case",
        report.rpo_seconds_estimate / 3600
    );
    println!(
        "    report: {}",
        reports_dir.join(format!("{}.json", report.drill_id)).display()
    );
    println!();
}

fn status_line(status: DrillStatus, use_color: bool) -> String {
    if use_color {
        use colored::Colorize;
        match status {
            DrillStatus::Success => status.to_string().green().to_string(),
            DrillStatus::PartialFailure => status.to_string().yellow().to_string(),
            DrillStatus::Failure => status.to_string().red().to_string(),
        }
    } else {
        status.to_string()
    }
}
