// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The quarterly disaster recovery drill.
//!
//! A drill proves the whole recovery path with real tooling: it takes
//! fresh baseline backups, checks that they are listed and intact, restores
//! them into disposable targets, and captures how each restored copy
//! validated. Every check lands in a [`DrillReport`] with per-phase
//! timings; a failed check becomes a [`DrillIssue`] and the remaining
//! phases keep running. The report is written to the report directory no
//! matter how the drill went, and anything short of a clean pass raises
//! an alert.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use salvor_backup::BackupCreator;
use salvor_config::SalvorConfig;
use salvor_core::traits::{Alert, AlertSink};
use salvor_core::types::{
    BackupArtifact, BackupKind, DrillIssue, DrillReport, DrillStatus, RestoreJob, RestoreMode,
    RestoreTarget,
};
use salvor_core::SalvorError;
use salvor_crypto::KeyMaterial;
use salvor_db::{run_tool, ToolInvocation};
use salvor_restore::{RestoreOrchestrator, RestoreSource};
use salvor_store::LocalStore;

const PHASE_PREFLIGHT: &str = "preflight";
const PHASE_BASELINE: &str = "baseline_backups";
const PHASE_RECOVERY: &str = "recovery_checks";
const PHASE_RESTORES: &str = "drill_restores";
const PHASE_VALIDATION: &str = "validation";

/// Runs the drill phases and assembles the report.
pub struct DrillHarness {
    config: Arc<SalvorConfig>,
    store: Arc<LocalStore>,
    creator: Arc<BackupCreator>,
    orchestrator: Arc<RestoreOrchestrator>,
    alerts: Arc<dyn AlertSink>,
}

/// Accumulates check outcomes and phase timings while a drill runs.
struct DrillRun {
    id: String,
    started: DateTime<Utc>,
    tests_total: u32,
    tests_passed: u32,
    issues: Vec<DrillIssue>,
    rto_seconds_by_phase: BTreeMap<String, f64>,
    critical_failed: bool,
}

impl DrillRun {
    fn begin() -> Self {
        let started = Utc::now();
        Self {
            id: format!("drill_{}", started.format("%Y%m%dT%H%M%S%.3fZ")),
            started,
            tests_total: 0,
            tests_passed: 0,
            issues: Vec::new(),
            rto_seconds_by_phase: BTreeMap::new(),
            critical_failed: false,
        }
    }

    fn pass(&mut self) {
        self.tests_total += 1;
        self.tests_passed += 1;
    }

    /// Records a failed check. Critical failures (backup creation, checksum
    /// verification) force the overall status to `Failure`.
    fn fail(&mut self, phase: &str, critical: bool, message: impl Into<String>) {
        self.tests_total += 1;
        if critical {
            self.critical_failed = true;
        }
        let message = message.into();
        tracing::warn!(drill = %self.id, phase, %message, "drill check failed");
        self.issues.push(DrillIssue {
            phase: phase.to_string(),
            message,
        });
    }

    fn record<T>(
        &mut self,
        phase: &str,
        critical: bool,
        label: &str,
        outcome: Result<T, SalvorError>,
    ) -> Option<T> {
        match outcome {
            Ok(value) => {
                self.pass();
                Some(value)
            }
            Err(error) => {
                self.fail(phase, critical, format!("{label}: {error}"));
                None
            }
        }
    }

    fn time_phase(&mut self, phase: &str, started: Instant) {
        self.rto_seconds_by_phase
            .insert(phase.to_string(), started.elapsed().as_secs_f64());
    }

    fn finish(self, rpo_seconds_estimate: u64) -> DrillReport {
        let tests_failed = self.tests_total - self.tests_passed;
        let overall_status = if self.critical_failed {
            DrillStatus::Failure
        } else if tests_failed == 0 {
            DrillStatus::Success
        } else {
            DrillStatus::PartialFailure
        };
        DrillReport {
            drill_id: self.id,
            timestamp: self.started,
            tests_total: self.tests_total,
            tests_passed: self.tests_passed,
            tests_failed,
            issues: self.issues,
            rto_seconds_by_phase: self.rto_seconds_by_phase,
            rpo_seconds_estimate,
            overall_status,
        }
    }
}

impl DrillHarness {
    pub fn new(
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        creator: Arc<BackupCreator>,
        orchestrator: Arc<RestoreOrchestrator>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            store,
            creator,
            orchestrator,
            alerts,
        }
    }

    /// Runs a full drill and returns the finalized report.
    ///
    /// `Err` only when the token was cancelled before the drill started or
    /// the report could not be written; everything that goes wrong inside
    /// the phases is captured in the report instead.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<DrillReport, SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        let mut run = DrillRun::begin();
        tracing::info!(drill = %run.id, "disaster recovery drill started");

        self.execute(&mut run, cancel).await;

        let report = run.finish(self.config.drill.backup_interval_hours * 3600);
        self.persist(&report).await?;

        if report.overall_status == DrillStatus::Success {
            tracing::info!(
                drill = %report.drill_id,
                passed = report.tests_passed,
                "drill passed every check"
            );
        } else {
            tracing::error!(
                drill = %report.drill_id,
                status = %report.overall_status,
                failed = report.tests_failed,
                "drill finished with failures"
            );
            self.alert_outcome(&report).await;
        }
        Ok(report)
    }

    async fn execute(&self, run: &mut DrillRun, cancel: &CancellationToken) {
        let started = Instant::now();
        self.preflight(run, cancel).await;
        run.time_phase(PHASE_PREFLIGHT, started);
        if Self::drill_cancelled(run, cancel) {
            return;
        }

        let started = Instant::now();
        let (database, contracts) = self.baseline_backups(run, cancel).await;
        run.time_phase(PHASE_BASELINE, started);
        if Self::drill_cancelled(run, cancel) {
            return;
        }

        let started = Instant::now();
        self.recovery_checks(run, database.as_ref(), contracts.as_ref())
            .await;
        run.time_phase(PHASE_RECOVERY, started);
        if Self::drill_cancelled(run, cancel) {
            return;
        }

        let started = Instant::now();
        let jobs = self.drill_restores(run, database, contracts, cancel).await;
        run.time_phase(PHASE_RESTORES, started);

        let started = Instant::now();
        self.validation(run, &jobs);
        run.time_phase(PHASE_VALIDATION, started);
    }

    fn drill_cancelled(run: &mut DrillRun, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            run.fail("drill", false, "cancelled before completion");
            return true;
        }
        false
    }

    /// Checks the external tools, the encryption key, and both working
    /// directories before anything destructive runs.
    async fn preflight(&self, run: &mut DrillRun, cancel: &CancellationToken) {
        let tools = [
            ("dump tool", self.config.database.dump_command.clone()),
            ("restore tool", self.config.database.restore_command.clone()),
        ];
        for (label, command) in tools {
            let outcome = self.tool_runnable(&command, cancel).await;
            run.record(PHASE_PREFLIGHT, false, label, outcome);
        }

        if let Some(key_file) = &self.config.crypto.key_file {
            let outcome = KeyMaterial::load(Path::new(key_file)).map(|_| ());
            run.record(PHASE_PREFLIGHT, false, "encryption key", outcome);
        }

        let outcome = self.artifact_dir_writable().await;
        run.record(PHASE_PREFLIGHT, false, "artifact directory", outcome);
        let outcome = self.report_dir_writable().await;
        run.record(PHASE_PREFLIGHT, false, "report directory", outcome);
    }

    async fn tool_runnable(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SalvorError> {
        let invocation = ToolInvocation::new(command).arg("--version");
        run_tool(&invocation, self.config.operation_timeout(), cancel)
            .await
            .map(|_| ())
    }

    async fn artifact_dir_writable(&self) -> Result<(), SalvorError> {
        let dir = self.store.staging_dir().await?;
        probe_write(&dir).await
    }

    async fn report_dir_writable(&self) -> Result<(), SalvorError> {
        let dir = self.config.reports_dir();
        tokio::fs::create_dir_all(&dir).await?;
        probe_write(&dir).await
    }

    /// Takes the two baseline backups concurrently. Either failing is
    /// critical: a drill that cannot produce backups has already answered
    /// the question it was asked.
    async fn baseline_backups(
        &self,
        run: &mut DrillRun,
        cancel: &CancellationToken,
    ) -> (Option<BackupArtifact>, Option<BackupArtifact>) {
        let encrypted = self.config.drill.encrypt;
        let (database, contracts) = tokio::join!(
            self.creator.create_database_backup(encrypted, cancel),
            self.creator.create_contract_snapshot(encrypted, cancel),
        );
        let database = run.record(PHASE_BASELINE, true, "database backup", database);
        let contracts = run.record(PHASE_BASELINE, true, "contract snapshot", contracts);
        (database, contracts)
    }

    /// Non-destructive recovery assertions: each kind has a listed restore
    /// candidate, and the baseline payloads still match their recorded
    /// digests. A checksum miss here is critical.
    async fn recovery_checks(
        &self,
        run: &mut DrillRun,
        database: Option<&BackupArtifact>,
        contracts: Option<&BackupArtifact>,
    ) {
        let listings = [
            ("database candidates", BackupKind::Database),
            ("contract candidates", BackupKind::ContractSnapshot),
        ];
        for (label, kind) in listings {
            let outcome = self.restorable_candidate(kind).await;
            run.record(PHASE_RECOVERY, false, label, outcome);
        }

        let checksums = [
            ("database checksum", database),
            ("contract checksum", contracts),
        ];
        for (label, artifact) in checksums {
            if let Some(artifact) = artifact {
                let outcome = self.store.verify_local(artifact).await;
                run.record(PHASE_RECOVERY, true, label, outcome);
            }
        }
    }

    async fn restorable_candidate(&self, kind: BackupKind) -> Result<(), SalvorError> {
        let artifacts = self.store.list(kind).await?;
        if artifacts.iter().any(|a| a.is_restore_candidate()) {
            Ok(())
        } else {
            Err(SalvorError::ValidationFailed {
                message: format!("no restorable {kind} artifact in the local store"),
            })
        }
    }

    /// Restores both baselines into disposable targets.
    ///
    /// A job that failed its validation gate still counts as a completed
    /// restore here; the validation phase reports that failure. Jobs that
    /// never reached validation fail this phase instead.
    async fn drill_restores(
        &self,
        run: &mut DrillRun,
        database: Option<BackupArtifact>,
        contracts: Option<BackupArtifact>,
        cancel: &CancellationToken,
    ) -> Vec<(&'static str, RestoreJob)> {
        let mut jobs = Vec::new();

        if let Some(artifact) = database {
            let scratch = format!(
                "{}_{}",
                self.config.drill.scratch_database_prefix,
                run.started.format("%Y%m%dT%H%M%S")
            );
            let outcome = self
                .orchestrator
                .restore_database(
                    RestoreSource::Local(artifact.id.clone()),
                    RestoreTarget::new(scratch),
                    RestoreMode::Drill,
                    cancel,
                )
                .await;
            self.record_restore(run, "database restore", outcome, &mut jobs);
        }

        if let Some(artifact) = contracts {
            let dest = match self.store.staging_dir().await {
                Ok(dir) => dir.join(format!("{}_contracts", run.id)),
                Err(error) => {
                    run.fail(
                        PHASE_RESTORES,
                        false,
                        format!("contract restore: {error}"),
                    );
                    return jobs;
                }
            };
            let outcome = self
                .orchestrator
                .restore_contract_snapshot(
                    RestoreSource::Local(artifact.id.clone()),
                    &dest,
                    RestoreMode::Drill,
                    cancel,
                )
                .await;
            self.record_restore(run, "contract restore", outcome, &mut jobs);
        }

        jobs
    }

    fn record_restore(
        &self,
        run: &mut DrillRun,
        label: &'static str,
        outcome: Result<RestoreJob, SalvorError>,
        jobs: &mut Vec<(&'static str, RestoreJob)>,
    ) {
        match outcome {
            Ok(job) => {
                if job.succeeded() || failed_validation(&job) {
                    run.pass();
                } else {
                    let reason = job.failure_reason.as_deref().unwrap_or("unknown failure");
                    run.fail(PHASE_RESTORES, false, format!("{label}: {reason}"));
                }
                jobs.push((label, job));
            }
            Err(error) => run.fail(PHASE_RESTORES, false, format!("{label}: {error}")),
        }
    }

    /// Captures each job's validation outcome. Targets are already torn
    /// down by now, so this reads the job records instead of re-querying.
    fn validation(&self, run: &mut DrillRun, jobs: &[(&'static str, RestoreJob)]) {
        for (label, job) in jobs {
            if job.succeeded() {
                run.pass();
            } else if failed_validation(job) {
                let reason = job.failure_reason.as_deref().unwrap_or("unknown failure");
                run.fail(PHASE_VALIDATION, false, format!("{label}: {reason}"));
            }
            // A job that failed before its validation gate was already
            // counted under drill_restores.
        }
    }

    /// Writes the report JSON into the report directory.
    async fn persist(&self, report: &DrillReport) -> Result<(), SalvorError> {
        let dir = self.config.reports_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", report.drill_id));
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| SalvorError::Internal(format!("serialize drill report: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::info!(report = %path.display(), "drill report written");
        Ok(())
    }

    async fn alert_outcome(&self, report: &DrillReport) {
        let summary = format!(
            "disaster recovery drill {} finished {}",
            report.drill_id, report.overall_status
        );
        let detail = format!(
            "{} of {} checks failed",
            report.tests_failed, report.tests_total
        );
        let alert = match report.overall_status {
            DrillStatus::Failure => Alert::critical("drill", summary, detail),
            _ => Alert::warning("drill", summary, detail),
        };
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::warn!(error = %e, "alert delivery failed");
        }
    }
}

fn failed_validation(job: &RestoreJob) -> bool {
    job.failure_reason
        .as_deref()
        .is_some_and(|reason| reason.starts_with("validation failed"))
}

async fn probe_write(dir: &Path) -> Result<(), SalvorError> {
    let probe = dir.join(".write_probe");
    tokio::fs::write(&probe, b"drill").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}
