// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restore orchestration.
//!
//! Drives one restore at a time per target through the job states:
//! fetch or load, checksum verification, optional decryption, the external
//! restore command, and post-restore validation. A failure anywhere after
//! the job starts lands in the job record rather than an `Err`; the record
//! is written to the report directory either way. `Err` is reserved for
//! refusals before anything ran: a cancelled request, a rejected target,
//! or a target already being restored.
//!
//! Drill mode never touches production: any target whose identity matches
//! the configured production identity is refused outright, and the
//! disposable target is created before the restore and dropped after it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use salvor_config::SalvorConfig;
use salvor_core::traits::{Alert, AlertSink, DatabaseProbe};
use salvor_core::types::{
    ArtifactId, BackupArtifact, BackupKind, RestoreJob, RestoreMode, RestoreStatus, RestoreTarget,
};
use salvor_core::SalvorError;
use salvor_crypto::{decrypt, KeyMaterial, IV_LEN};
use salvor_db::{run_tool, ToolInvocation};
use salvor_replicate::Replicator;
use salvor_store::LocalStore;

use crate::lock::TargetLocks;

/// Where a restore's payload comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreSource {
    /// An artifact registered in the local store.
    Local(ArtifactId),
    /// An artifact fetched from the offsite provider.
    Remote(ArtifactId),
}

impl RestoreSource {
    fn artifact_id(&self) -> &ArtifactId {
        match self {
            RestoreSource::Local(id) | RestoreSource::Remote(id) => id,
        }
    }
}

/// Runs database and contract-snapshot restores end to end.
pub struct RestoreOrchestrator {
    config: Arc<SalvorConfig>,
    store: Arc<LocalStore>,
    replicator: Option<Arc<Replicator>>,
    probe: Arc<dyn DatabaseProbe>,
    key: Option<KeyMaterial>,
    alerts: Arc<dyn AlertSink>,
    locks: Arc<TargetLocks>,
}

impl RestoreOrchestrator {
    pub fn new(
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        replicator: Option<Arc<Replicator>>,
        probe: Arc<dyn DatabaseProbe>,
        key: Option<KeyMaterial>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            store,
            replicator,
            probe,
            key,
            alerts,
            locks: Arc::new(TargetLocks::new()),
        }
    }

    /// Restores a database backup into `target`.
    ///
    /// In drill mode the target database is created first and dropped after
    /// validation; in production mode it must already exist. The returned
    /// job carries the terminal state and, on failure, the reason.
    pub async fn restore_database(
        &self,
        source: RestoreSource,
        target: RestoreTarget,
        mode: RestoreMode,
        cancel: &CancellationToken,
    ) -> Result<RestoreJob, SalvorError> {
        self.preflight(&source, &target, mode, cancel)?;
        let _guard = self.locks.acquire(&target)?;
        let staging = self.store.staging_dir().await?;

        let mut job = RestoreJob::new(source.artifact_id().clone(), mode, target.clone());
        tracing::info!(
            job = %job.id,
            artifact = %job.source_artifact_id,
            %target,
            %mode,
            "database restore started"
        );

        let workdir = staging.join(&job.id);
        let outcome = self
            .run_database_restore(&mut job, &source, &target, &workdir, cancel)
            .await;
        self.conclude(&mut job, outcome).await;
        let _ = tokio::fs::remove_dir_all(&workdir).await;
        self.persist(&job).await?;
        Ok(job)
    }

    /// Restores a contract snapshot into `dest_dir`.
    ///
    /// Validation checks that files with every configured extension came
    /// out of the archive. In drill mode the extracted tree is removed
    /// again after validation.
    pub async fn restore_contract_snapshot(
        &self,
        source: RestoreSource,
        dest_dir: &Path,
        mode: RestoreMode,
        cancel: &CancellationToken,
    ) -> Result<RestoreJob, SalvorError> {
        let target = RestoreTarget::new(dest_dir.display().to_string());
        self.preflight(&source, &target, mode, cancel)?;
        let _guard = self.locks.acquire(&target)?;
        let staging = self.store.staging_dir().await?;

        let mut job = RestoreJob::new(source.artifact_id().clone(), mode, target);
        tracing::info!(
            job = %job.id,
            artifact = %job.source_artifact_id,
            dest = %dest_dir.display(),
            %mode,
            "contract snapshot restore started"
        );

        let workdir = staging.join(&job.id);
        let outcome = self
            .run_contract_restore(&mut job, &source, dest_dir, &workdir, cancel)
            .await;
        self.conclude(&mut job, outcome).await;
        let _ = tokio::fs::remove_dir_all(&workdir).await;
        self.persist(&job).await?;
        Ok(job)
    }

    /// Refusals that precede any work: cancellation, a remote source with
    /// replication disabled, and the drill guard.
    fn preflight(
        &self,
        source: &RestoreSource,
        target: &RestoreTarget,
        mode: RestoreMode,
        cancel: &CancellationToken,
    ) -> Result<(), SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        if matches!(source, RestoreSource::Remote(_)) {
            self.remote_replicator()?;
        }
        if mode == RestoreMode::Drill && target.identity() == self.config.production_identity() {
            return Err(SalvorError::TargetRejected {
                target: target.identity(),
                reason: "drill restores must not touch the production database".to_string(),
            });
        }
        Ok(())
    }

    fn remote_replicator(&self) -> Result<&Replicator, SalvorError> {
        self.replicator.as_deref().ok_or_else(|| {
            SalvorError::Config(
                "remote restore requested but replication.provider is not set".to_string(),
            )
        })
    }

    async fn run_database_restore(
        &self,
        job: &mut RestoreJob,
        source: &RestoreSource,
        target: &RestoreTarget,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SalvorError> {
        tokio::fs::create_dir_all(workdir).await?;
        let artifact = self
            .resolve(job, source, BackupKind::Database, workdir, cancel)
            .await?;

        job.advance(RestoreStatus::VerifyingChecksum)?;
        self.verify(source, &artifact).await?;

        let payload = self.plaintext_payload(job, &artifact, workdir).await?;

        job.advance(RestoreStatus::Restoring)?;
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        let sql_path = workdir.join("restore.sql");
        gunzip_to(&payload, &sql_path).await?;

        if job.mode == RestoreMode::Drill {
            self.probe.create_database(target).await?;
        }
        if let Err(error) = self.run_restore_tool(target, &sql_path, cancel).await {
            self.teardown_database(job.mode, target).await;
            return Err(error);
        }

        job.advance(RestoreStatus::Validating)?;
        if let Err(error) = self.validate_database(target).await {
            self.teardown_database(job.mode, target).await;
            return Err(error);
        }

        self.teardown_database(job.mode, target).await;
        job.advance(RestoreStatus::Succeeded)?;
        Ok(())
    }

    async fn run_contract_restore(
        &self,
        job: &mut RestoreJob,
        source: &RestoreSource,
        dest_dir: &Path,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SalvorError> {
        tokio::fs::create_dir_all(workdir).await?;
        let artifact = self
            .resolve(job, source, BackupKind::ContractSnapshot, workdir, cancel)
            .await?;

        job.advance(RestoreStatus::VerifyingChecksum)?;
        self.verify(source, &artifact).await?;

        let payload = self.plaintext_payload(job, &artifact, workdir).await?;

        job.advance(RestoreStatus::Restoring)?;
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        if let Err(error) = unpack_archive(&payload, dest_dir).await {
            self.teardown_snapshot(job.mode, dest_dir).await;
            return Err(error);
        }

        job.advance(RestoreStatus::Validating)?;
        if let Err(error) = self.validate_contracts(dest_dir).await {
            self.teardown_snapshot(job.mode, dest_dir).await;
            return Err(error);
        }

        self.teardown_snapshot(job.mode, dest_dir).await;
        job.advance(RestoreStatus::Succeeded)?;
        Ok(())
    }

    /// Loads the artifact locally or fetches it from offsite into `workdir`.
    async fn resolve(
        &self,
        job: &mut RestoreJob,
        source: &RestoreSource,
        kind: BackupKind,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BackupArtifact, SalvorError> {
        let id = source.artifact_id();
        if id.kind() != Some(kind) {
            return Err(SalvorError::Config(format!(
                "artifact `{id}` is not a {kind} backup"
            )));
        }

        match source {
            RestoreSource::Local(id) => {
                let artifact = self.store.load(kind, id).await?;
                if artifact.quarantined {
                    return Err(SalvorError::ValidationFailed {
                        message: format!("artifact {id} is quarantined; refusing to restore it"),
                    });
                }
                if artifact.local_path.is_none() {
                    return Err(SalvorError::Storage {
                        source: Box::new(std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("artifact {id} has no local payload; restore it from offsite"),
                        )),
                    });
                }
                Ok(artifact)
            }
            RestoreSource::Remote(id) => {
                let replicator = self.remote_replicator()?;
                job.advance(RestoreStatus::Downloading)?;
                replicator.fetch(id, workdir, cancel).await
            }
        }
    }

    /// Recomputes the payload digest before anything destructive runs.
    ///
    /// A tampered local source is quarantined; a remote download was
    /// already checked against its sidecar during fetch and is re-checked
    /// here without touching quarantine state.
    async fn verify(
        &self,
        source: &RestoreSource,
        artifact: &BackupArtifact,
    ) -> Result<(), SalvorError> {
        match self.store.verify_local(artifact).await {
            Ok(()) => Ok(()),
            Err(error @ SalvorError::ChecksumMismatch { .. }) => {
                if matches!(source, RestoreSource::Local(_)) {
                    self.store.quarantine(artifact, &error.to_string()).await?;
                }
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Returns the gzip payload to restore from, decrypting first when the
    /// artifact is encrypted. The plaintext lands in `workdir` and is
    /// removed with it.
    async fn plaintext_payload(
        &self,
        job: &mut RestoreJob,
        artifact: &BackupArtifact,
        workdir: &Path,
    ) -> Result<PathBuf, SalvorError> {
        let Some(payload) = artifact.local_path.clone() else {
            return Err(SalvorError::Internal(format!(
                "artifact {} lost its payload mid-restore",
                artifact.id
            )));
        };
        if !artifact.encrypted {
            return Ok(payload);
        }

        job.advance(RestoreStatus::Decrypting)?;
        let Some(key) = &self.key else {
            return Err(SalvorError::KeyUnavailable {
                message: "artifact is encrypted but crypto.key_file is not configured".to_string(),
            });
        };
        let iv = parse_iv(artifact)?;
        let key = Zeroizing::new(*key.bytes());
        let dest = workdir.join("plaintext.gz");
        let dest_path = dest.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SalvorError> {
            let ciphertext = std::fs::read(&payload)?;
            let plaintext = decrypt(&key, &iv, &ciphertext)?;
            std::fs::write(&dest_path, &plaintext)?;
            Ok(())
        })
        .await
        .map_err(|e| SalvorError::Internal(format!("decryption task panicked: {e}")))??;
        Ok(dest)
    }

    async fn run_restore_tool(
        &self,
        target: &RestoreTarget,
        sql_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SalvorError> {
        let invocation = ToolInvocation::new(&self.config.database.restore_command)
            .arg(target.identity())
            .stdin_file(sql_path);
        let run = run_tool(&invocation, self.config.operation_timeout(), cancel).await?;
        tracing::info!(%target, stdout_bytes = run.stdout_bytes, "restore command completed");
        Ok(())
    }

    /// Table-count and critical-table gates, run through the probe.
    ///
    /// A probe error counts as a validation failure: data whose presence
    /// cannot be confirmed is treated as missing.
    async fn validate_database(&self, target: &RestoreTarget) -> Result<(), SalvorError> {
        let tables = self
            .probe
            .table_count(target)
            .await
            .map_err(|e| SalvorError::ValidationFailed {
                message: format!("table count query failed: {e}"),
            })?;
        if tables == 0 {
            return Err(SalvorError::ValidationFailed {
                message: "restored database contains no tables".to_string(),
            });
        }
        for table in &self.config.restore.critical_tables {
            let rows = self.probe.row_count(target, table).await.map_err(|e| {
                SalvorError::ValidationFailed {
                    message: format!("critical table `{table}`: {e}"),
                }
            })?;
            if rows == 0 {
                return Err(SalvorError::ValidationFailed {
                    message: format!("critical table `{table}` is empty"),
                });
            }
        }
        tracing::info!(%target, tables, "restored database validated");
        Ok(())
    }

    /// Every configured extension must appear among the restored files.
    async fn validate_contracts(&self, dest: &Path) -> Result<(), SalvorError> {
        let dest = dest.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || collect_extensions(&dest))
            .await
            .map_err(|e| SalvorError::Internal(format!("validation task panicked: {e}")))??;
        if scan.files == 0 {
            return Err(SalvorError::ValidationFailed {
                message: "contract snapshot unpacked no files".to_string(),
            });
        }
        for ext in &self.config.contracts.expected_extensions {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if !scan.extensions.contains(&ext) {
                return Err(SalvorError::ValidationFailed {
                    message: format!("no `.{ext}` files in restored snapshot"),
                });
            }
        }
        Ok(())
    }

    /// Best-effort drop of a drill's scratch database.
    async fn teardown_database(&self, mode: RestoreMode, target: &RestoreTarget) {
        if mode != RestoreMode::Drill {
            return;
        }
        if let Err(error) = self.probe.drop_database(target).await {
            tracing::warn!(%target, error = %error, "failed to drop drill database");
        }
    }

    /// Best-effort removal of a drill's extracted snapshot tree.
    async fn teardown_snapshot(&self, mode: RestoreMode, dest: &Path) {
        if mode != RestoreMode::Drill {
            return;
        }
        if let Err(error) = tokio::fs::remove_dir_all(dest).await {
            tracing::warn!(dest = %dest.display(), error = %error, "failed to remove drill snapshot");
        }
    }

    /// Folds the pipeline outcome into the job and alerts on production
    /// failures.
    async fn conclude(&self, job: &mut RestoreJob, outcome: Result<(), SalvorError>) {
        if let Err(error) = outcome {
            let alertable = job.mode == RestoreMode::Production && error.is_alertable();
            job.failure_category = Some(error.category().to_string());
            job.fail(error.to_string());
            if alertable {
                self.alert(Alert::critical(
                    "restore",
                    format!("restore {} failed", job.id),
                    error.to_string(),
                ))
                .await;
            }
        }
        if job.succeeded() {
            tracing::info!(job = %job.id, "restore succeeded");
        } else {
            tracing::error!(
                job = %job.id,
                reason = job.failure_reason.as_deref().unwrap_or(""),
                "restore failed"
            );
        }
    }

    /// Writes the terminal job record into the report directory.
    async fn persist(&self, job: &RestoreJob) -> Result<(), SalvorError> {
        let dir = self.config.reports_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", job.id));
        let json = serde_json::to_vec_pretty(job)
            .map_err(|e| SalvorError::Internal(format!("serialize restore job: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn alert(&self, alert: Alert) {
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::warn!(error = %e, "alert delivery failed");
        }
    }
}

fn parse_iv(artifact: &BackupArtifact) -> Result<[u8; IV_LEN], SalvorError> {
    let Some(iv_hex) = &artifact.iv_hex else {
        return Err(SalvorError::Decryption {
            message: format!("artifact {} is encrypted but records no IV", artifact.id),
        });
    };
    let bytes = hex::decode(iv_hex).map_err(|e| SalvorError::Decryption {
        message: format!("artifact {} has an unparsable IV: {e}", artifact.id),
    })?;
    bytes.try_into().map_err(|_| SalvorError::Decryption {
        message: format!("artifact {} has an IV of the wrong length", artifact.id),
    })
}

/// Decompresses `src` into `dest` on the blocking pool.
async fn gunzip_to(src: &Path, dest: &Path) -> Result<u64, SalvorError> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<u64, SalvorError> {
        let mut decoder = flate2::read::GzDecoder::new(std::fs::File::open(&src)?);
        let mut out = std::fs::File::create(&dest)?;
        Ok(std::io::copy(&mut decoder, &mut out)?)
    })
    .await
    .map_err(|e| SalvorError::Internal(format!("decompression task panicked: {e}")))?
}

/// Unpacks a gzipped tar archive into `dest` on the blocking pool.
async fn unpack_archive(src: &Path, dest: &Path) -> Result<(), SalvorError> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), SalvorError> {
        std::fs::create_dir_all(&dest)?;
        let decoder = flate2::read::GzDecoder::new(std::fs::File::open(&src)?);
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(&dest)?;
        Ok(())
    })
    .await
    .map_err(|e| SalvorError::Internal(format!("unpack task panicked: {e}")))?
}

struct ExtensionScan {
    files: u64,
    extensions: HashSet<String>,
}

fn collect_extensions(dir: &Path) -> Result<ExtensionScan, SalvorError> {
    let mut scan = ExtensionScan {
        files: 0,
        extensions: HashSet::new(),
    };
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                scan.files += 1;
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    scan.extensions.insert(ext.to_ascii_lowercase());
                }
            }
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::{DateTime, TimeZone, Utc};
    use salvor_core::traits::ObjectStoreProvider;
    use salvor_crypto::encrypt;
    use salvor_replicate::RemoteStore;
    use salvor_store::StagedArtifact;
    use salvor_test_utils::{write_fake_tool, MemoryAlertSink, ScriptedProbe};

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        probe: Arc<ScriptedProbe>,
        alerts: Arc<MemoryAlertSink>,
        replicator: Arc<Replicator>,
        orchestrator: RestoreOrchestrator,
    }

    fn fixture(mutate: impl FnOnce(&mut SalvorConfig, &Path)) -> Fixture {
        fixture_with_key(None, mutate)
    }

    fn fixture_with_key(
        key: Option<KeyMaterial>,
        mutate: impl FnOnce(&mut SalvorConfig, &Path),
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let mut config = SalvorConfig::default();
        config.engine.reports_dir = root.join("reports").display().to_string();
        config.runtime.retry_base_delay_ms = 1;
        config.database.restore_command = write_fake_tool(
            &root,
            "fake_restore",
            &format!("cat > \"{}\"", root.join("restored.sql").display()),
        )
        .display()
        .to_string();
        mutate(&mut config, &root);
        let config = Arc::new(config);

        let alerts = Arc::new(MemoryAlertSink::new());
        let store = Arc::new(LocalStore::new(
            root.join("store"),
            config.local_retention(),
            config.offsite_retention(),
            alerts.clone(),
        ));
        let probe = Arc::new(ScriptedProbe::new());
        let provider: Arc<dyn ObjectStoreProvider> = Arc::new(RemoteStore::in_memory());
        let replicator = Arc::new(Replicator::new(
            config.clone(),
            store.clone(),
            provider,
            alerts.clone(),
        ));

        let orchestrator = RestoreOrchestrator::new(
            config.clone(),
            store.clone(),
            Some(replicator.clone()),
            probe.clone(),
            key,
            alerts.clone(),
        );
        Fixture {
            _dir: dir,
            root,
            config,
            store,
            probe,
            alerts,
            replicator,
            orchestrator,
        }
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn test_key(root: &Path) -> KeyMaterial {
        let path = root.join("backup.key");
        std::fs::write(&path, [0x42u8; 32]).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }
        KeyMaterial::load(&path).unwrap()
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0).unwrap()
    }

    async fn add_artifact(
        store: &LocalStore,
        kind: BackupKind,
        created_at: DateTime<Utc>,
        payload: Vec<u8>,
        key: Option<&KeyMaterial>,
    ) -> BackupArtifact {
        let (bytes, iv_hex) = match key {
            Some(key) => {
                let (ciphertext, iv) = encrypt(key.bytes(), &payload).unwrap();
                (ciphertext, Some(hex::encode(iv)))
            }
            None => (payload, None),
        };
        let staging = store.staging_dir().await.unwrap();
        let path = staging.join(format!("staged-{kind}-{}", created_at.timestamp_millis()));
        tokio::fs::write(&path, &bytes).await.unwrap();
        store
            .register(StagedArtifact {
                kind,
                created_at,
                staged_path: path,
                checksum_sha256: salvor_crypto::sha256_hex(&bytes),
                encrypted: key.is_some(),
                iv_hex,
            })
            .await
            .unwrap()
    }

    async fn read_report(fx: &Fixture, job: &RestoreJob) -> RestoreJob {
        let path = fx.config.reports_dir().join(format!("{}.json", job.id));
        serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn production_restore_runs_tool_and_validates() {
        let fx = fixture(|config, _| {
            config.restore.critical_tables = vec!["users".to_string()];
        });
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"CREATE TABLE users (id int);"),
            None,
        )
        .await;
        fx.probe.set_table_count("replica_db", 4).await;
        fx.probe.set_row_count("replica_db", "users", 120).await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id.clone()),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        assert!(job.completed_at.is_some());
        let restored = tokio::fs::read(fx.root.join("restored.sql")).await.unwrap();
        assert_eq!(restored, b"CREATE TABLE users (id int);");
        // Production restores never create or drop databases.
        assert!(fx.probe.created().await.is_empty());
        assert!(fx.probe.dropped().await.is_empty());

        let report = read_report(&fx, &job).await;
        assert_eq!(report.status, RestoreStatus::Succeeded);
    }

    #[tokio::test]
    async fn drill_restore_creates_and_drops_scratch_database() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;
        fx.probe.set_table_count("salvor_drill_1", 2).await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("salvor_drill_1"),
                RestoreMode::Drill,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        assert_eq!(fx.probe.created().await, vec!["salvor_drill_1".to_string()]);
        assert_eq!(fx.probe.dropped().await, vec!["salvor_drill_1".to_string()]);
    }

    #[tokio::test]
    async fn drill_refuses_production_target() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;

        let err = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new(fx.config.production_identity()),
                RestoreMode::Drill,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SalvorError::TargetRejected { .. }));
        // Refused before anything ran: no report, no tool call, no alert.
        assert!(!fx.root.join("restored.sql").exists());
        assert_eq!(fx.alerts.count().await, 0);
    }

    #[tokio::test]
    async fn tampered_local_source_is_quarantined_and_tool_never_runs() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;
        tokio::fs::write(artifact.local_path.clone().unwrap(), b"garbage")
            .await
            .unwrap();

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id.clone()),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("checksum mismatch"));
        assert!(!fx.root.join("restored.sql").exists());
        let reloaded = fx
            .store
            .load(BackupKind::Database, &artifact.id)
            .await
            .unwrap();
        assert!(reloaded.quarantined);
    }

    #[tokio::test]
    async fn encrypted_artifact_restores_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = test_key(dir.path());
        let fx = fixture_with_key(Some(key), |_, _| {});
        let key = test_key(dir.path());

        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"CREATE TABLE enc (id int);"),
            Some(&key),
        )
        .await;
        fx.probe.set_table_count("replica_db", 1).await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        let restored = tokio::fs::read(fx.root.join("restored.sql")).await.unwrap();
        assert_eq!(restored, b"CREATE TABLE enc (id int);");
    }

    #[tokio::test]
    async fn encrypted_artifact_without_key_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let key = test_key(dir.path());
        let fx = fixture(|_, _| {});

        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            Some(&key),
        )
        .await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("key unavailable"));
        assert!(!fx.root.join("restored.sql").exists());
    }

    #[tokio::test]
    async fn validation_failure_fails_job_despite_clean_tool_exit() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;
        // No scripted table count: the probe reports zero tables.

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("salvor_drill_2"),
                RestoreMode::Drill,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("no tables"));
        assert_eq!(job.failure_category.as_deref(), Some("validation-failed"));
        // The scratch database is still torn down, and drill failures do
        // not page anyone.
        assert_eq!(fx.probe.dropped().await, vec!["salvor_drill_2".to_string()]);
        assert_eq!(fx.alerts.count().await, 0);
    }

    #[tokio::test]
    async fn empty_critical_table_fails_validation() {
        let fx = fixture(|config, _| {
            config.restore.critical_tables = vec!["orders".to_string()];
        });
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;
        fx.probe.set_table_count("replica_db", 3).await;
        fx.probe.set_row_count("replica_db", "orders", 0).await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job.failure_reason.as_deref().unwrap().contains("orders"));
    }

    #[tokio::test]
    async fn production_tool_failure_sends_alert() {
        let fx = fixture(|config, root| {
            config.database.restore_command = salvor_test_utils::fake_failing_tool(
                root,
                "fake_restore_fail",
                "psql: fatal: out of memory",
                1,
            )
            .display()
            .to_string();
        });
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("out of memory"));
        assert!(fx.alerts.contains_summary("restore").await);
    }

    #[tokio::test]
    async fn remote_source_fetches_from_offsite() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"CREATE TABLE offsite (id int);"),
            None,
        )
        .await;
        fx.replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();
        // Lose the local payload; only the offsite copy remains.
        tokio::fs::remove_file(artifact.local_path.clone().unwrap())
            .await
            .unwrap();
        fx.probe.set_table_count("replica_db", 1).await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Remote(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        let restored = tokio::fs::read(fx.root.join("restored.sql")).await.unwrap();
        assert_eq!(restored, b"CREATE TABLE offsite (id int);");
    }

    #[tokio::test]
    async fn remote_source_without_replicator_is_refused() {
        let fx = fixture(|_, _| {});
        let orchestrator = RestoreOrchestrator::new(
            fx.config.clone(),
            fx.store.clone(),
            None,
            fx.probe.clone(),
            None,
            fx.alerts.clone(),
        );
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;

        let err = orchestrator
            .restore_database(
                RestoreSource::Remote(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::Config(_)));
        assert!(err.to_string().contains("replication.provider"));
    }

    #[tokio::test]
    async fn concurrent_restore_against_same_target_is_rejected() {
        let fx = fixture(|config, root| {
            config.database.restore_command =
                salvor_test_utils::fake_slow_tool(root, "fake_restore_slow", 30)
                    .display()
                    .to_string();
        });
        let artifact = add_artifact(
            &fx.store,
            BackupKind::Database,
            ts(1, 0),
            gzip(b"SELECT 1;"),
            None,
        )
        .await;

        let orchestrator = Arc::new(fx.orchestrator);
        let cancel = CancellationToken::new();
        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            let id = artifact.id.clone();
            let cancel = cancel.clone();
            async move {
                orchestrator
                    .restore_database(
                        RestoreSource::Local(id),
                        RestoreTarget::new("replica_db"),
                        RestoreMode::Production,
                        &cancel,
                    )
                    .await
            }
        });

        // Give the first restore time to take the lock and start the tool.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let err = orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id.clone()),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::RestoreInProgress { .. }));

        // Cancelling mid-restore fails the job instead of erroring out.
        cancel.cancel();
        let job = first.await.unwrap().unwrap();
        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job.failure_reason.as_deref().unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn snapshot_restore_extracts_and_validates_extensions() {
        let fx = fixture(|_, _| {});
        let archive = tar_gz(&[
            ("Registry.json", "{\"address\":\"0xabc\"}"),
            ("tokens/Token.json", "{\"address\":\"0xdef\"}"),
        ]);
        let artifact = add_artifact(
            &fx.store,
            BackupKind::ContractSnapshot,
            ts(2, 0),
            archive,
            None,
        )
        .await;
        let dest = fx.root.join("contracts_out");

        let job = fx
            .orchestrator
            .restore_contract_snapshot(
                RestoreSource::Local(artifact.id),
                &dest,
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        let registry = tokio::fs::read_to_string(dest.join("Registry.json"))
            .await
            .unwrap();
        assert!(registry.contains("0xabc"));
        assert!(dest.join("tokens/Token.json").is_file());
    }

    #[tokio::test]
    async fn snapshot_restore_fails_when_expected_extension_is_missing() {
        let fx = fixture(|config, _| {
            config.contracts.expected_extensions = vec!["json".to_string(), "abi".to_string()];
        });
        let archive = tar_gz(&[("Registry.json", "{}")]);
        let artifact = add_artifact(
            &fx.store,
            BackupKind::ContractSnapshot,
            ts(2, 0),
            archive,
            None,
        )
        .await;

        let job = fx
            .orchestrator
            .restore_contract_snapshot(
                RestoreSource::Local(artifact.id),
                &fx.root.join("contracts_out"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job.failure_reason.as_deref().unwrap().contains("abi"));
    }

    #[tokio::test]
    async fn drill_snapshot_restore_cleans_up_extracted_tree() {
        let fx = fixture(|_, _| {});
        let archive = tar_gz(&[("Registry.json", "{}")]);
        let artifact = add_artifact(
            &fx.store,
            BackupKind::ContractSnapshot,
            ts(2, 0),
            archive,
            None,
        )
        .await;
        let dest = fx.root.join("drill_contracts");

        let job = fx
            .orchestrator
            .restore_contract_snapshot(
                RestoreSource::Local(artifact.id),
                &dest,
                RestoreMode::Drill,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(job.succeeded());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn wrong_kind_artifact_is_refused() {
        let fx = fixture(|_, _| {});
        let artifact = add_artifact(
            &fx.store,
            BackupKind::ContractSnapshot,
            ts(2, 0),
            gzip(b"not sql"),
            None,
        )
        .await;

        let job = fx
            .orchestrator
            .restore_database(
                RestoreSource::Local(artifact.id),
                RestoreTarget::new("replica_db"),
                RestoreMode::Production,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(job.status, RestoreStatus::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("not a database backup"));
    }
}
