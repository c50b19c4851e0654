// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup creation pipeline.
//!
//! Database backups stream the dump tool's stdout through gzip into a
//! staged temp file, so memory use stays flat regardless of dump size.
//! Contract snapshots tar the deployment-metadata directory through the
//! same gzip path. Either payload can then be encrypted in place before
//! the checksum is taken and the artifact is registered.
//!
//! Only the dump step retries: it talks to an external server and can
//! fail transiently. Everything after it is local filesystem work where
//! a failure means an operator problem, not a flaky network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use salvor_config::SalvorConfig;
use salvor_core::traits::{Alert, AlertSink};
use salvor_core::types::{BackupArtifact, BackupKind};
use salvor_core::SalvorError;
use salvor_crypto::{encrypt, sha256_file, KeyMaterial};
use salvor_db::{run_tool_to_writer, ToolInvocation};
use salvor_store::{LocalStore, StagedArtifact};

/// Buffer between the dump tool's stdout and the gzip thread.
const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Produces backup artifacts and registers them in the local store.
pub struct BackupCreator {
    config: Arc<SalvorConfig>,
    store: Arc<LocalStore>,
    key: Option<KeyMaterial>,
    alerts: Arc<dyn AlertSink>,
}

impl BackupCreator {
    pub fn new(
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        key: Option<KeyMaterial>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            store,
            key,
            alerts,
        }
    }

    /// Dumps the production database into a compressed, optionally
    /// encrypted artifact.
    pub async fn create_database_backup(
        &self,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> Result<BackupArtifact, SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        self.require_key(encrypted)?;

        let created_at = Utc::now();
        let staging = self.store.staging_dir().await?;
        let staged_path = staging.join(format!(
            "database-{}.sql.gz",
            created_at.format("%Y%m%dT%H%M%S%.3f")
        ));

        let policy = self.config.tool_retry();
        let mut attempt = 1;
        loop {
            match self.dump_compressed(&staged_path, cancel).await {
                Ok(raw_bytes) => {
                    tracing::info!(raw_bytes, attempt, "database dump completed");
                    break;
                }
                Err(e) if e.is_retryable() && policy.has_next(attempt) => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "database dump failed, will retry"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return self.fail(&staged_path, SalvorError::Cancelled).await;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return self.fail(&staged_path, e).await,
            }
        }

        match self
            .finalize(BackupKind::Database, created_at, staged_path.clone(), encrypted)
            .await
        {
            Ok(artifact) => Ok(artifact),
            Err(e) => self.fail(&staged_path, e).await,
        }
    }

    /// Archives the contract deployment-metadata directory into a
    /// compressed, optionally encrypted artifact.
    pub async fn create_contract_snapshot(
        &self,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> Result<BackupArtifact, SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        self.require_key(encrypted)?;

        let source = PathBuf::from(&self.config.contracts.source_dir);
        match tokio::fs::metadata(&source).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                let e = SalvorError::Storage {
                    source: Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotADirectory,
                        format!("contracts source {} is not a directory", source.display()),
                    )),
                };
                return self.alert_and_err(e).await;
            }
            Err(e) => {
                let e = SalvorError::Storage {
                    source: Box::new(std::io::Error::new(
                        e.kind(),
                        format!("contracts source {}: {e}", source.display()),
                    )),
                };
                return self.alert_and_err(e).await;
            }
        }

        let created_at = Utc::now();
        let staging = self.store.staging_dir().await?;
        let staged_path = staging.join(format!(
            "contracts-{}.tar.gz",
            created_at.format("%Y%m%dT%H%M%S%.3f")
        ));

        if let Err(e) = archive_directory(source, staged_path.clone()).await {
            return self.fail(&staged_path, e).await;
        }
        if cancel.is_cancelled() {
            return self.fail(&staged_path, SalvorError::Cancelled).await;
        }

        match self
            .finalize(
                BackupKind::ContractSnapshot,
                created_at,
                staged_path.clone(),
                encrypted,
            )
            .await
        {
            Ok(artifact) => Ok(artifact),
            Err(e) => self.fail(&staged_path, e).await,
        }
    }

    /// One dump attempt: spawn the tool and gzip its stdout into `dest`.
    async fn dump_compressed(
        &self,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, SalvorError> {
        let gz_file = std::fs::File::create(dest)?;
        let (reader, mut writer) = tokio::io::duplex(DUPLEX_CAPACITY);
        let gzip = tokio::task::spawn_blocking(move || -> Result<(), SalvorError> {
            let mut bridge = SyncIoBridge::new(reader);
            let mut encoder = GzEncoder::new(gz_file, Compression::default());
            std::io::copy(&mut bridge, &mut encoder)?;
            encoder.finish()?;
            Ok(())
        });

        let invocation = ToolInvocation::new(&self.config.database.dump_command)
            .arg(&self.config.database.url);
        let run = run_tool_to_writer(
            &invocation,
            self.config.operation_timeout(),
            cancel,
            &mut writer,
        )
        .await;
        drop(writer);

        let gzip = gzip
            .await
            .map_err(|e| SalvorError::Internal(format!("compression task panicked: {e}")))?;
        let run = run?;
        gzip?;
        Ok(run.stdout_bytes)
    }

    /// Encryption, checksum, and registration, shared by both producers.
    async fn finalize(
        &self,
        kind: BackupKind,
        created_at: DateTime<Utc>,
        staged_path: PathBuf,
        encrypted: bool,
    ) -> Result<BackupArtifact, SalvorError> {
        let iv_hex = if encrypted {
            Some(self.encrypt_in_place(&staged_path).await?)
        } else {
            None
        };

        let checksum_path = staged_path.clone();
        let checksum_sha256 = tokio::task::spawn_blocking(move || sha256_file(&checksum_path))
            .await
            .map_err(|e| SalvorError::Internal(format!("checksum task panicked: {e}")))??;

        self.store
            .register(StagedArtifact {
                kind,
                created_at,
                staged_path,
                checksum_sha256,
                encrypted,
                iv_hex,
            })
            .await
    }

    /// Encrypts the staged payload in place, returning the IV as hex.
    async fn encrypt_in_place(&self, path: &Path) -> Result<String, SalvorError> {
        let Some(key) = &self.key else {
            return Err(SalvorError::KeyUnavailable {
                message: "encryption requested but crypto.key_file is not configured".to_string(),
            });
        };
        let key = Zeroizing::new(*key.bytes());
        let path = path.to_path_buf();
        let iv = tokio::task::spawn_blocking(move || -> Result<_, SalvorError> {
            let plaintext = std::fs::read(&path)?;
            let (ciphertext, iv) = encrypt(&key, &plaintext)?;
            std::fs::write(&path, &ciphertext)?;
            Ok(iv)
        })
        .await
        .map_err(|e| SalvorError::Internal(format!("encryption task panicked: {e}")))??;
        Ok(hex::encode(iv))
    }

    fn require_key(&self, encrypted: bool) -> Result<(), SalvorError> {
        if encrypted && self.key.is_none() {
            return Err(SalvorError::KeyUnavailable {
                message: "encryption requested but crypto.key_file is not configured".to_string(),
            });
        }
        Ok(())
    }

    /// Cleans up the staged file and routes the error through alerting.
    async fn fail(
        &self,
        staged_path: &Path,
        err: SalvorError,
    ) -> Result<BackupArtifact, SalvorError> {
        let _ = tokio::fs::remove_file(staged_path).await;
        self.alert_and_err(err).await
    }

    async fn alert_and_err(&self, err: SalvorError) -> Result<BackupArtifact, SalvorError> {
        if err.is_alertable() {
            let alert = Alert::critical(
                "backup",
                format!("backup failed: {}", err.category()),
                err.to_string(),
            );
            if let Err(e) = self.alerts.send(&alert).await {
                tracing::warn!(error = %e, "alert delivery failed");
            }
        }
        Err(err)
    }
}

/// Tars `source` recursively through gzip into `dest` on the blocking pool.
async fn archive_directory(source: PathBuf, dest: PathBuf) -> Result<(), SalvorError> {
    tokio::task::spawn_blocking(move || -> Result<(), SalvorError> {
        let file = std::fs::File::create(&dest)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all("", &source)?;
        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| SalvorError::Internal(format!("archive task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use salvor_crypto::decrypt;
    use salvor_test_utils::{fake_failing_tool, write_fake_tool, MemoryAlertSink};

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        alerts: Arc<MemoryAlertSink>,
        root: PathBuf,
    }

    fn fixture(mutate: impl FnOnce(&mut SalvorConfig, &Path)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let mut config = SalvorConfig::default();
        config.engine.artifacts_dir = root.join("artifacts").display().to_string();
        config.runtime.retry_base_delay_ms = 1;
        mutate(&mut config, &root);

        let alerts = Arc::new(MemoryAlertSink::new());
        let store = Arc::new(LocalStore::new(
            config.artifacts_dir(),
            config.local_retention(),
            config.offsite_retention(),
            alerts.clone(),
        ));
        Fixture {
            _dir: dir,
            config: Arc::new(config),
            store,
            alerts,
            root,
        }
    }

    fn creator(fx: &Fixture, key: Option<KeyMaterial>) -> BackupCreator {
        BackupCreator::new(fx.config.clone(), fx.store.clone(), key, fx.alerts.clone())
    }

    fn write_key_file(dir: &Path) -> PathBuf {
        let path = dir.join("backup.key");
        std::fs::write(&path, [0x42u8; 32]).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }
        path
    }

    fn gunzip(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn database_backup_compresses_the_dump() {
        let fx = fixture(|config, root| {
            let tool = write_fake_tool(root, "fake_pg_dump", "printf 'CREATE TABLE users;\\n'");
            config.database.dump_command = tool.display().to_string();
        });
        let creator = creator(&fx, None);

        let artifact = creator
            .create_database_backup(false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.kind, BackupKind::Database);
        assert!(!artifact.encrypted);
        assert!(artifact.iv_hex.is_none());

        let stored = std::fs::read(artifact.local_path.as_ref().unwrap()).unwrap();
        assert_eq!(gunzip(&stored), b"CREATE TABLE users;\n");

        // Registered checksum matches the stored (compressed) bytes.
        fx.store.verify_local(&artifact).await.unwrap();

        // Staging left nothing behind.
        let staging = fx.store.staging_dir().await.unwrap();
        assert_eq!(std::fs::read_dir(staging).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn database_backup_retries_transient_dump_failures() {
        let fx = fixture(|config, root| {
            let counter = root.join("attempts");
            let body = format!(
                "n=$(cat {c} 2>/dev/null || echo 0)\n\
                 n=$((n+1))\n\
                 echo $n > {c}\n\
                 if [ $n -lt 3 ]; then echo 'server closed the connection' >&2; exit 1; fi\n\
                 printf 'dump after retries\\n'",
                c = counter.display()
            );
            let tool = write_fake_tool(root, "flaky_pg_dump", &body);
            config.database.dump_command = tool.display().to_string();
            config.runtime.tool_attempts = 3;
        });
        let creator = creator(&fx, None);

        let artifact = creator
            .create_database_backup(false, &CancellationToken::new())
            .await
            .unwrap();
        let stored = std::fs::read(artifact.local_path.as_ref().unwrap()).unwrap();
        assert_eq!(gunzip(&stored), b"dump after retries\n");
        assert_eq!(
            std::fs::read_to_string(fx.root.join("attempts")).unwrap().trim(),
            "3"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_retries_surface_the_tool_error_and_alert() {
        let fx = fixture(|config, root| {
            let tool = fake_failing_tool(root, "dead_pg_dump", "connection refused", 1);
            config.database.dump_command = tool.display().to_string();
            config.runtime.tool_attempts = 2;
        });
        let creator = creator(&fx, None);

        let err = creator
            .create_database_backup(false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::ExternalTool { .. }));
        assert!(fx.alerts.contains_summary("backup failed").await);

        let staging = fx.store.staging_dir().await.unwrap();
        assert_eq!(std::fs::read_dir(staging).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn encrypted_backup_round_trips_through_the_key() {
        let fx = fixture(|config, root| {
            let tool = write_fake_tool(root, "fake_pg_dump", "printf 'SECRET ROWS\\n'");
            config.database.dump_command = tool.display().to_string();
            let key_file = write_key_file(root);
            config.crypto.key_file = Some(key_file.display().to_string());
        });
        let key_path = PathBuf::from(fx.config.crypto.key_file.as_ref().unwrap());
        let key = KeyMaterial::load(&key_path).unwrap();
        let creator = creator(&fx, Some(key));

        let artifact = creator
            .create_database_backup(true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(artifact.encrypted);
        let iv_hex = artifact.iv_hex.clone().unwrap();
        assert_eq!(iv_hex.len(), 32);

        // The stored bytes are ciphertext; decrypting with the key and IV
        // yields the gzip stream.
        let stored = std::fs::read(artifact.local_path.as_ref().unwrap()).unwrap();
        assert_ne!(gunzip_try(&stored), Some(b"SECRET ROWS\n".to_vec()));

        let key = KeyMaterial::load(&key_path).unwrap();
        let mut iv = [0u8; 16];
        hex::decode_to_slice(&iv_hex, &mut iv).unwrap();
        let plaintext = decrypt(key.bytes(), &iv, &stored).unwrap();
        assert_eq!(gunzip(&plaintext), b"SECRET ROWS\n");
    }

    fn gunzip_try(bytes: &[u8]) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).ok()?;
        Some(out)
    }

    #[tokio::test]
    async fn encryption_without_a_key_fails_before_dumping() {
        let fx = fixture(|config, _root| {
            config.database.dump_command = "/nonexistent/pg_dump".to_string();
        });
        let creator = creator(&fx, None);

        let err = creator
            .create_database_backup(true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::KeyUnavailable { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let fx = fixture(|_, _| {});
        let creator = creator(&fx, None);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = creator
            .create_database_backup(false, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::Cancelled));
        assert_eq!(fx.alerts.count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn contract_snapshot_archives_the_source_tree() {
        let fx = fixture(|config, root| {
            let deployments = root.join("deployments");
            std::fs::create_dir_all(deployments.join("v2")).unwrap();
            std::fs::write(deployments.join("registry.json"), b"{\"address\":\"0xabc\"}").unwrap();
            std::fs::write(deployments.join("v2/token.json"), b"{\"abi\":[]}").unwrap();
            config.contracts.source_dir = deployments.display().to_string();
        });
        let creator = creator(&fx, None);

        let artifact = creator
            .create_contract_snapshot(false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(artifact.kind, BackupKind::ContractSnapshot);

        let stored = std::fs::read(artifact.local_path.as_ref().unwrap()).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(stored.as_slice()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("registry.json")));
        assert!(names.iter().any(|n| n.contains("v2") && n.ends_with("token.json")));
    }

    #[tokio::test]
    async fn missing_contracts_directory_is_a_storage_error() {
        let fx = fixture(|config, root| {
            config.contracts.source_dir = root.join("no-such-dir").display().to_string();
        });
        let creator = creator(&fx, None);

        let err = creator
            .create_contract_snapshot(false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::Storage { .. }));
        assert!(err.to_string().contains("no-such-dir"));
    }
}
