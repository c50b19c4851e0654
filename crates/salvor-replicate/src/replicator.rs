// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offsite replication of backup artifacts.
//!
//! Every artifact ships as three remote objects under
//! `[prefix/]<kind>/<id>`: the payload, a `sha256sum`-compatible checksum
//! file, and a metadata sidecar. The sidecar repeats the local store's
//! record with `local_path` cleared, which makes an encrypted artifact
//! restorable from the offsite copy alone.
//!
//! An upload only counts as `Valid` after a post-upload `head` confirms the
//! remote size matches the local payload. A failed replication never rolls
//! back the local backup.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use salvor_config::SalvorConfig;
use salvor_core::traits::{Alert, AlertSink, ObjectStoreProvider};
use salvor_core::types::{
    ArtifactId, BackupArtifact, BackupKind, ReplicationRecord, ReplicationStatus,
};
use salvor_core::SalvorError;
use salvor_crypto::sha256_file;
use salvor_store::LocalStore;

/// Suffix of the uploaded checksum file.
const CHECKSUM_SUFFIX: &str = ".sha256";
/// Suffix of the uploaded metadata sidecar.
const META_SUFFIX: &str = ".meta.json";

/// One offsite restore candidate, as reported by [`Replicator::list_remote`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteEntry {
    pub id: ArtifactId,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Outcome of a [`Replicator::prune_remote`] pass.
#[derive(Debug, Default)]
pub struct RemotePruneReport {
    /// Artifacts whose offsite objects were deleted this pass.
    pub pruned: Vec<ArtifactId>,
    /// Payload objects still inside the offsite retention window.
    pub retained: u64,
}

/// Uploads, fetches and prunes backup artifacts against one offsite
/// provider.
pub struct Replicator {
    config: Arc<SalvorConfig>,
    store: Arc<LocalStore>,
    provider: Arc<dyn ObjectStoreProvider>,
    alerts: Arc<dyn AlertSink>,
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator").finish_non_exhaustive()
    }
}

impl Replicator {
    pub fn new(
        config: Arc<SalvorConfig>,
        store: Arc<LocalStore>,
        provider: Arc<dyn ObjectStoreProvider>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            alerts,
        }
    }

    /// Replicates one artifact to the offsite provider.
    ///
    /// The local payload is re-hashed first; bytes that no longer match
    /// their recorded digest are quarantined instead of shipped. Transient
    /// provider errors are retried with backoff; exhaustion produces a
    /// `Failed` record (plus an alert) rather than an error, and a size
    /// mismatch on the remote copy produces a `Corrupt` one. `Err` is
    /// reserved for problems on the local side.
    pub async fn upload(
        &self,
        artifact: &BackupArtifact,
        cancel: &CancellationToken,
    ) -> Result<ReplicationRecord, SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }

        if let Err(error) = self.store.verify_local(artifact).await {
            if matches!(error, SalvorError::ChecksumMismatch { .. }) {
                self.store.quarantine(artifact, &error.to_string()).await?;
            }
            return Err(error);
        }
        let Some(local) = artifact.local_path.clone() else {
            return Err(SalvorError::Internal(format!(
                "artifact {} has no local payload",
                artifact.id
            )));
        };

        let key = self.key_for(artifact.kind, &artifact.id);
        let policy = self.config.provider_retry();
        let mut attempt = 1;
        loop {
            match self.try_upload(artifact, &local, &key).await {
                Ok((status, remote_size_bytes)) => {
                    let record = self.record(artifact, &key, status, remote_size_bytes);
                    if status == ReplicationStatus::Corrupt {
                        tracing::error!(
                            artifact = %artifact.id,
                            local_bytes = artifact.size_bytes,
                            remote_bytes = remote_size_bytes,
                            "remote copy size mismatch"
                        );
                        self.alert(Alert::critical(
                            "replicator",
                            format!("offsite copy of {} is corrupt", artifact.id),
                            format!(
                                "remote size {remote_size_bytes} does not match local size {}",
                                artifact.size_bytes
                            ),
                        ))
                        .await;
                    } else {
                        tracing::info!(
                            artifact = %artifact.id,
                            uri = %record.remote_uri,
                            attempt,
                            "artifact replicated"
                        );
                    }
                    return Ok(record);
                }
                Err(e) if e.is_retryable() && policy.has_next(attempt) => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "replication attempt failed, will retry"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SalvorError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(
                        error = %e,
                        attempt,
                        artifact = %artifact.id,
                        "replication failed, retries exhausted"
                    );
                    self.alert(Alert::critical(
                        "replicator",
                        format!("replication of {} failed", artifact.id),
                        e.to_string(),
                    ))
                    .await;
                    return Ok(self.record(artifact, &key, ReplicationStatus::Failed, 0));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replicates a batch concurrently, bounded by the configured
    /// concurrency limit. Each artifact gets its own outcome; one failure
    /// never aborts the others.
    pub async fn replicate_many(
        &self,
        artifacts: Vec<BackupArtifact>,
        cancel: &CancellationToken,
    ) -> Vec<(ArtifactId, Result<ReplicationRecord, SalvorError>)> {
        let limit = self.config.runtime.concurrency_limit.max(1);
        stream::iter(artifacts)
            .map(|artifact| async move {
                let result = self.upload(&artifact, cancel).await;
                (artifact.id, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Downloads an artifact's payload and metadata into `dest_dir`,
    /// returning the reconstructed record with `local_path` pointing at the
    /// downloaded payload.
    ///
    /// The payload is verified against the digest in the metadata sidecar;
    /// a mismatch removes the download and fails without touching any
    /// quarantine state, since the local store never saw these bytes.
    pub async fn fetch(
        &self,
        id: &ArtifactId,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BackupArtifact, SalvorError> {
        if cancel.is_cancelled() {
            return Err(SalvorError::Cancelled);
        }
        let Some(kind) = id.kind() else {
            return Err(SalvorError::Config(format!(
                "artifact id `{id}` does not name a backup kind"
            )));
        };
        let key = self.key_for(kind, id);
        tokio::fs::create_dir_all(dest_dir).await?;

        let policy = self.config.provider_retry();
        let mut attempt = 1;
        loop {
            match self.try_fetch(id, &key, dest_dir).await {
                Ok(artifact) => {
                    tracing::info!(artifact = %id, attempt, "fetched artifact from offsite");
                    return Ok(artifact);
                }
                Err(e) if e.is_retryable() && policy.has_next(attempt) => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "fetch attempt failed, will retry"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SalvorError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Lists offsite restore candidates of `kind`, newest first.
    pub async fn list_remote(&self, kind: BackupKind) -> Result<Vec<RemoteEntry>, SalvorError> {
        let objects = self
            .with_timeout(self.provider.list(&self.kind_prefix(kind)))
            .await?;
        let mut entries: Vec<RemoteEntry> = objects
            .into_iter()
            .filter(|o| !o.key.ends_with(CHECKSUM_SUFFIX) && !o.key.ends_with(META_SUFFIX))
            .map(|o| RemoteEntry {
                id: entry_id(&o.key),
                size_bytes: o.size_bytes,
                last_modified: o.last_modified,
            })
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    /// Deletes offsite objects older than the offsite retention window as
    /// of `now`. Sidecars go with their payload; a second pass over the
    /// same bucket is a no-op.
    pub async fn prune_remote(&self, now: DateTime<Utc>) -> Result<RemotePruneReport, SalvorError> {
        let cutoff = now - self.config.offsite_retention();
        let mut report = RemotePruneReport::default();

        let objects = self
            .with_timeout(self.provider.list(&self.root_prefix()))
            .await?;
        for object in objects {
            if object.key.ends_with(CHECKSUM_SUFFIX) || object.key.ends_with(META_SUFFIX) {
                continue;
            }
            let id = entry_id(&object.key);
            // Age from the id's embedded timestamp, falling back to the
            // provider's mtime. Objects with neither are left alone.
            let Some(written_at) = id.timestamp().or(object.last_modified) else {
                tracing::warn!(key = %object.key, "skipping remote object of unknown age");
                continue;
            };
            if written_at > cutoff {
                report.retained += 1;
                continue;
            }

            self.with_timeout(self.provider.delete(&object.key)).await?;
            self.with_timeout(
                self.provider
                    .delete(&format!("{}{CHECKSUM_SUFFIX}", object.key)),
            )
            .await?;
            self.with_timeout(self.provider.delete(&format!("{}{META_SUFFIX}", object.key)))
                .await?;
            tracing::info!(key = %object.key, "pruned expired offsite objects");
            report.pruned.push(id);
        }
        Ok(report)
    }

    /// One upload attempt: payload, size check, then both sidecars.
    async fn try_upload(
        &self,
        artifact: &BackupArtifact,
        local: &Path,
        key: &str,
    ) -> Result<(ReplicationStatus, u64), SalvorError> {
        self.with_timeout(self.provider.put(key, local)).await?;

        let remote = self.with_timeout(self.provider.head(key)).await?;
        if remote.size_bytes != artifact.size_bytes {
            return Ok((ReplicationStatus::Corrupt, remote.size_bytes));
        }

        let checksum_line = format!("{}  {}\n", artifact.checksum_sha256, artifact.id);
        self.put_bytes(&format!("{key}{CHECKSUM_SUFFIX}"), checksum_line.as_bytes())
            .await?;

        let mut meta = artifact.clone();
        meta.local_path = None;
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| SalvorError::Internal(format!("serialize replication metadata: {e}")))?;
        self.put_bytes(&format!("{key}{META_SUFFIX}"), &json).await?;

        Ok((ReplicationStatus::Valid, remote.size_bytes))
    }

    /// One fetch attempt: metadata sidecar first, then the payload it
    /// describes, then the digest check.
    async fn try_fetch(
        &self,
        id: &ArtifactId,
        key: &str,
        dest_dir: &Path,
    ) -> Result<BackupArtifact, SalvorError> {
        let meta_path = dest_dir.join(format!("{id}{META_SUFFIX}"));
        self.with_timeout(self.provider.get(&format!("{key}{META_SUFFIX}"), &meta_path))
            .await?;
        let bytes = tokio::fs::read(&meta_path).await?;
        let mut artifact: BackupArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            SalvorError::Internal(format!("corrupt replication metadata for {id}: {e}"))
        })?;

        let payload_path = dest_dir.join(id.as_str());
        self.with_timeout(self.provider.get(key, &payload_path))
            .await?;

        let hashed = payload_path.clone();
        let actual = tokio::task::spawn_blocking(move || sha256_file(&hashed))
            .await
            .map_err(|e| SalvorError::Internal(format!("checksum task panicked: {e}")))??;
        if actual != artifact.checksum_sha256 {
            let _ = tokio::fs::remove_file(&payload_path).await;
            return Err(SalvorError::ChecksumMismatch {
                artifact: id.to_string(),
                expected: artifact.checksum_sha256.clone(),
                actual,
            });
        }

        artifact.local_path = Some(payload_path);
        Ok(artifact)
    }

    /// Uploads a small in-memory object through a staging file, since the
    /// provider interface deals in files.
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<(), SalvorError> {
        let staging = self.store.staging_dir().await?;
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let tmp = staging.join(format!("{file_name}.upload"));
        tokio::fs::write(&tmp, bytes).await?;
        let result = self.with_timeout(self.provider.put(key, &tmp)).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        result.map(|_| ())
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, SalvorError>>,
    ) -> Result<T, SalvorError> {
        let limit = self.config.operation_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(SalvorError::ProviderTimeout {
                provider: self.provider.kind().to_string(),
                duration: limit,
            }),
        }
    }

    fn record(
        &self,
        artifact: &BackupArtifact,
        key: &str,
        status: ReplicationStatus,
        remote_size_bytes: u64,
    ) -> ReplicationRecord {
        ReplicationRecord {
            artifact_id: artifact.id.clone(),
            provider: self.provider.kind(),
            remote_uri: self.provider.remote_uri(key),
            uploaded_at: Utc::now(),
            remote_size_bytes,
            status,
        }
    }

    async fn alert(&self, alert: Alert) {
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::warn!(error = %e, "alert delivery failed");
        }
    }

    fn root_prefix(&self) -> String {
        self.config.replication.prefix.trim_matches('/').to_string()
    }

    fn kind_prefix(&self, kind: BackupKind) -> String {
        let root = self.root_prefix();
        if root.is_empty() {
            kind.to_string()
        } else {
            format!("{root}/{kind}")
        }
    }

    fn key_for(&self, kind: BackupKind, id: &ArtifactId) -> String {
        format!("{}/{}", self.kind_prefix(kind), id)
    }
}

/// The id encoded in a remote key's last path segment.
fn entry_id(key: &str) -> ArtifactId {
    let name = key.rsplit('/').next().unwrap_or(key);
    ArtifactId(name.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use salvor_core::traits::RemoteObject;
    use salvor_core::types::ProviderKind;
    use salvor_crypto::sha256_hex;
    use salvor_store::StagedArtifact;
    use salvor_test_utils::MemoryAlertSink;

    use crate::providers::RemoteStore;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        scratch: PathBuf,
        store: Arc<LocalStore>,
        provider: Arc<dyn ObjectStoreProvider>,
        alerts: Arc<MemoryAlertSink>,
        replicator: Replicator,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(RemoteStore::in_memory()), |_| {})
    }

    fn fixture_with(
        provider: Arc<dyn ObjectStoreProvider>,
        mutate: impl FnOnce(&mut SalvorConfig),
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");

        let mut config = SalvorConfig::default();
        config.runtime.retry_base_delay_ms = 1;
        mutate(&mut config);
        let config = Arc::new(config);

        let alerts = Arc::new(MemoryAlertSink::new());
        let store = Arc::new(LocalStore::new(
            dir.path().join("store"),
            config.local_retention(),
            config.offsite_retention(),
            alerts.clone(),
        ));
        let replicator = Replicator::new(
            config,
            store.clone(),
            provider.clone(),
            alerts.clone(),
        );
        Fixture {
            _dir: dir,
            scratch,
            store,
            provider,
            alerts,
            replicator,
        }
    }

    async fn add_artifact(
        store: &LocalStore,
        kind: BackupKind,
        created_at: DateTime<Utc>,
        bytes: &[u8],
    ) -> BackupArtifact {
        let staging = store.staging_dir().await.unwrap();
        let path = staging.join(format!("staged-{kind}-{}", created_at.timestamp_millis()));
        tokio::fs::write(&path, bytes).await.unwrap();
        store
            .register(StagedArtifact {
                kind,
                created_at,
                staged_path: path,
                checksum_sha256: sha256_hex(bytes),
                encrypted: false,
                iv_hex: None,
            })
            .await
            .unwrap()
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    /// Forwards to an in-memory store but under-reports object sizes.
    struct ShrinkingProvider(RemoteStore);

    #[async_trait]
    impl ObjectStoreProvider for ShrinkingProvider {
        fn kind(&self) -> ProviderKind {
            self.0.kind()
        }
        fn remote_uri(&self, key: &str) -> String {
            self.0.remote_uri(key)
        }
        async fn put(&self, key: &str, local: &Path) -> Result<u64, SalvorError> {
            self.0.put(key, local).await
        }
        async fn get(&self, key: &str, dest: &Path) -> Result<u64, SalvorError> {
            self.0.get(key, dest).await
        }
        async fn head(&self, key: &str) -> Result<RemoteObject, SalvorError> {
            let mut object = self.0.head(key).await?;
            object.size_bytes = object.size_bytes.saturating_sub(1);
            Ok(object)
        }
        async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, SalvorError> {
            self.0.list(prefix).await
        }
        async fn delete(&self, key: &str) -> Result<(), SalvorError> {
            self.0.delete(key).await
        }
    }

    /// Rejects every upload with a retryable provider error.
    #[derive(Default)]
    struct DownProvider {
        puts: AtomicU32,
    }

    #[async_trait]
    impl ObjectStoreProvider for DownProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::S3
        }
        fn remote_uri(&self, key: &str) -> String {
            format!("s3://down/{key}")
        }
        async fn put(&self, _key: &str, _local: &Path) -> Result<u64, SalvorError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Err(SalvorError::Provider {
                provider: "s3".to_string(),
                message: "connection reset by peer".to_string(),
                source: None,
            })
        }
        async fn get(&self, _key: &str, _dest: &Path) -> Result<u64, SalvorError> {
            Err(SalvorError::Provider {
                provider: "s3".to_string(),
                message: "connection reset by peer".to_string(),
                source: None,
            })
        }
        async fn head(&self, _key: &str) -> Result<RemoteObject, SalvorError> {
            Err(SalvorError::Provider {
                provider: "s3".to_string(),
                message: "connection reset by peer".to_string(),
                source: None,
            })
        }
        async fn list(&self, _prefix: &str) -> Result<Vec<RemoteObject>, SalvorError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _key: &str) -> Result<(), SalvorError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn upload_writes_payload_and_both_sidecars() {
        let fx = fixture();
        let artifact =
            add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump bytes").await;

        let record = fx
            .replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.status, ReplicationStatus::Valid);
        assert_eq!(record.remote_size_bytes, artifact.size_bytes);
        assert_eq!(record.provider, ProviderKind::Fs);
        let key = format!("database/{}", artifact.id);
        assert_eq!(record.remote_uri, format!("memory://salvor/{key}"));

        fx.provider.head(&key).await.unwrap();
        fx.provider.head(&format!("{key}.sha256")).await.unwrap();

        let meta_dest = fx.scratch.join("meta.json");
        tokio::fs::create_dir_all(&fx.scratch).await.unwrap();
        fx.provider
            .get(&format!("{key}.meta.json"), &meta_dest)
            .await
            .unwrap();
        let remote_meta: BackupArtifact =
            serde_json::from_slice(&tokio::fs::read(&meta_dest).await.unwrap()).unwrap();
        assert_eq!(remote_meta.id, artifact.id);
        assert_eq!(remote_meta.checksum_sha256, artifact.checksum_sha256);
        assert!(remote_meta.local_path.is_none());
    }

    #[tokio::test]
    async fn upload_honors_configured_prefix() {
        let fx = fixture_with(Arc::new(RemoteStore::in_memory()), |config| {
            config.replication.prefix = "salvor/prod/".to_string();
        });
        let artifact = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump").await;

        let record = fx
            .replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();
        let key = format!("salvor/prod/database/{}", artifact.id);
        assert_eq!(record.remote_uri, format!("memory://salvor/{key}"));
        fx.provider.head(&key).await.unwrap();
    }

    #[tokio::test]
    async fn upload_quarantines_tampered_local_payload() {
        let fx = fixture();
        let artifact =
            add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"original").await;
        let payload = artifact.local_path.clone().unwrap();
        tokio::fs::write(&payload, b"tampered").await.unwrap();

        let err = fx
            .replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::ChecksumMismatch { .. }));

        let reloaded = fx
            .store
            .load(BackupKind::Database, &artifact.id)
            .await
            .unwrap();
        assert!(reloaded.quarantined);
        assert!(fx.alerts.contains_summary("quarantined").await);

        // Nothing was shipped.
        let key = format!("database/{}", artifact.id);
        assert!(fx.provider.head(&key).await.is_err());
    }

    #[tokio::test]
    async fn upload_marks_corrupt_when_remote_size_differs() {
        let fx = fixture_with(
            Arc::new(ShrinkingProvider(RemoteStore::in_memory())),
            |_| {},
        );
        let artifact = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump").await;

        let record = fx
            .replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.status, ReplicationStatus::Corrupt);
        assert_eq!(record.remote_size_bytes, artifact.size_bytes - 1);
        assert!(fx.alerts.contains_summary("corrupt").await);

        // Sidecars are withheld from a copy that failed the size check.
        let key = format!("database/{}", artifact.id);
        assert!(fx.provider.head(&format!("{key}.meta.json")).await.is_err());
    }

    #[tokio::test]
    async fn upload_records_failed_after_exhausting_retries() {
        let down = Arc::new(DownProvider::default());
        let fx = fixture_with(down.clone(), |config| {
            config.runtime.provider_attempts = 3;
        });
        let artifact = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump").await;

        let record = fx
            .replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.status, ReplicationStatus::Failed);
        assert_eq!(record.remote_size_bytes, 0);
        assert_eq!(down.puts.load(Ordering::SeqCst), 3);
        assert!(fx.alerts.contains_summary("replication of").await);

        // The local payload is untouched by a failed replication.
        fx.store.verify_local(&artifact).await.unwrap();
    }

    #[tokio::test]
    async fn upload_cancelled_before_start() {
        let fx = fixture();
        let artifact = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fx.replicator.upload(&artifact, &cancel).await.unwrap_err();
        assert!(matches!(err, SalvorError::Cancelled));
        assert_eq!(fx.alerts.count().await, 0);
    }

    #[tokio::test]
    async fn fetch_reconstructs_artifact_from_offsite() {
        let fx = fixture();
        let artifact =
            add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump bytes").await;
        fx.replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();

        let fetched = fx
            .replicator
            .fetch(&artifact.id, &fx.scratch, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fetched.id, artifact.id);
        assert_eq!(fetched.checksum_sha256, artifact.checksum_sha256);
        let payload = fetched.local_path.unwrap();
        assert_eq!(tokio::fs::read(&payload).await.unwrap(), b"dump bytes");
    }

    #[tokio::test]
    async fn fetch_rejects_corrupted_remote_payload() {
        let fx = fixture();
        let artifact = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"dump").await;
        fx.replicator
            .upload(&artifact, &CancellationToken::new())
            .await
            .unwrap();

        // Corrupt the remote payload behind the replicator's back.
        let bad = fx.store.staging_dir().await.unwrap().join("bad");
        tokio::fs::write(&bad, b"not the dump").await.unwrap();
        fx.provider
            .put(&format!("database/{}", artifact.id), &bad)
            .await
            .unwrap();

        let err = fx
            .replicator
            .fetch(&artifact.id, &fx.scratch, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::ChecksumMismatch { .. }));
        assert!(!fx.scratch.join(artifact.id.as_str()).exists());
    }

    #[tokio::test]
    async fn fetch_rejects_id_without_kind() {
        let fx = fixture();
        let err = fx
            .replicator
            .fetch(
                &ArtifactId("checkpoint".to_string()),
                &fx.scratch,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SalvorError::Config(_)));
    }

    #[tokio::test]
    async fn list_remote_skips_sidecars_and_sorts_newest_first() {
        let fx = fixture();
        let older = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"one").await;
        let newer = add_artifact(&fx.store, BackupKind::Database, ts(2, 0), b"two").await;
        let cancel = CancellationToken::new();
        fx.replicator.upload(&older, &cancel).await.unwrap();
        fx.replicator.upload(&newer, &cancel).await.unwrap();

        let entries = fx.replicator.list_remote(BackupKind::Database).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, newer.id);
        assert_eq!(entries[1].id, older.id);
        assert_eq!(entries[0].size_bytes, 3);
    }

    #[tokio::test]
    async fn prune_remote_deletes_expired_objects_with_sidecars() {
        let fx = fixture();
        let now = ts(20, 12);
        let expired = add_artifact(
            &fx.store,
            BackupKind::Database,
            now - chrono::Duration::days(120),
            b"old",
        )
        .await;
        let fresh = add_artifact(&fx.store, BackupKind::Database, ts(19, 0), b"new").await;
        let cancel = CancellationToken::new();
        fx.replicator.upload(&expired, &cancel).await.unwrap();
        fx.replicator.upload(&fresh, &cancel).await.unwrap();

        let report = fx.replicator.prune_remote(now).await.unwrap();
        assert_eq!(report.pruned, vec![expired.id.clone()]);
        assert_eq!(report.retained, 1);

        let old_key = format!("database/{}", expired.id);
        assert!(fx.provider.head(&old_key).await.is_err());
        assert!(fx.provider.head(&format!("{old_key}.sha256")).await.is_err());
        assert!(fx
            .provider
            .head(&format!("{old_key}.meta.json"))
            .await
            .is_err());
        fx.provider
            .head(&format!("database/{}", fresh.id))
            .await
            .unwrap();

        // Second pass finds nothing left to prune.
        let again = fx.replicator.prune_remote(now).await.unwrap();
        assert!(again.pruned.is_empty());
        assert_eq!(again.retained, 1);
    }

    #[tokio::test]
    async fn replicate_many_keeps_outcomes_separate() {
        let fx = fixture();
        let good = add_artifact(&fx.store, BackupKind::Database, ts(1, 0), b"good").await;
        let bad = add_artifact(&fx.store, BackupKind::ContractSnapshot, ts(2, 0), b"bad").await;
        tokio::fs::write(bad.local_path.clone().unwrap(), b"tampered")
            .await
            .unwrap();

        let results = fx
            .replicator
            .replicate_many(vec![good.clone(), bad.clone()], &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 2);

        let good_result = &results.iter().find(|(id, _)| *id == good.id).unwrap().1;
        assert_eq!(
            good_result.as_ref().unwrap().status,
            ReplicationStatus::Valid
        );
        let bad_result = &results.iter().find(|(id, _)| *id == bad.id).unwrap().1;
        assert!(matches!(
            bad_result.as_ref().unwrap_err(),
            SalvorError::ChecksumMismatch { .. }
        ));
    }
}
