// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local artifact store.
//!
//! Payloads live under `<root>/<kind>/<id>` with a `<id>.meta.json` sidecar
//! next to each. Registration moves a staged file into place with a rename,
//! so a crash never leaves a half-written payload under a final name, and
//! sidecars are written through a temp file for the same reason.
//!
//! Pruning deletes expired payloads but keeps their sidecars: the metadata
//! (checksum, IV, retention windows) is what makes the offsite copy
//! restorable after the local bytes are gone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use salvor_core::traits::{Alert, AlertSink};
use salvor_core::types::{ArtifactId, BackupArtifact, BackupKind};
use salvor_core::SalvorError;
use salvor_crypto::sha256_file;

/// Suffix appended to a payload file when verification finds it corrupt.
const QUARANTINE_SUFFIX: &str = ".corrupt";

/// A backup payload staged in the store's staging directory, ready to be
/// registered under its final name.
#[derive(Debug)]
pub struct StagedArtifact {
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    /// Temp file inside [`LocalStore::staging_dir`]; consumed by `register`.
    pub staged_path: PathBuf,
    /// SHA-256 hex digest of the staged bytes.
    pub checksum_sha256: String,
    pub encrypted: bool,
    pub iv_hex: Option<String>,
}

/// Outcome of a [`LocalStore::prune`] pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Artifacts whose local payload was deleted this pass.
    pub pruned: Vec<ArtifactId>,
    /// Artifacts still inside their local retention window.
    pub retained: u64,
    /// Quarantined artifacts, which pruning never touches.
    pub quarantined_kept: u64,
}

/// Filesystem-backed store for backup artifacts and their metadata.
pub struct LocalStore {
    root: PathBuf,
    local_retention: Duration,
    offsite_retention: Duration,
    alerts: Arc<dyn AlertSink>,
}

impl LocalStore {
    pub fn new(
        root: impl Into<PathBuf>,
        local_retention: Duration,
        offsite_retention: Duration,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            root: root.into(),
            local_retention,
            offsite_retention,
            alerts,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for staging files before registration.
    ///
    /// Lives under the store root so the final rename never crosses a
    /// filesystem boundary.
    pub async fn staging_dir(&self) -> Result<PathBuf, SalvorError> {
        let dir = self.root.join("staging");
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Final payload location for an artifact of `kind` with this `id`.
    pub fn payload_path(&self, kind: BackupKind, id: &ArtifactId) -> PathBuf {
        self.root.join(kind.to_string()).join(id.as_str())
    }

    /// Metadata sidecar location for an artifact of `kind` with this `id`.
    pub fn sidecar_path(&self, kind: BackupKind, id: &ArtifactId) -> PathBuf {
        self.root
            .join(kind.to_string())
            .join(format!("{}.meta.json", id.as_str()))
    }

    /// Moves a staged payload into place and records its metadata.
    ///
    /// Returns the registered artifact with retention expiries stamped from
    /// the creation time and the store's configured windows.
    pub async fn register(&self, staged: StagedArtifact) -> Result<BackupArtifact, SalvorError> {
        let id = ArtifactId::new(staged.kind, staged.created_at);
        let dest = self.payload_path(staged.kind, &id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size_bytes = tokio::fs::metadata(&staged.staged_path).await?.len();
        let artifact = BackupArtifact {
            id: id.clone(),
            kind: staged.kind,
            created_at: staged.created_at,
            local_path: Some(dest.clone()),
            size_bytes,
            checksum_sha256: staged.checksum_sha256,
            encrypted: staged.encrypted,
            iv_hex: staged.iv_hex,
            retention_expires_at: staged.created_at + self.local_retention,
            offsite_retention_expires_at: staged.created_at + self.offsite_retention,
            quarantined: false,
        };
        artifact.validate()?;

        tokio::fs::rename(&staged.staged_path, &dest).await?;
        self.write_sidecar(&artifact).await?;

        tracing::info!(
            artifact = %artifact.id,
            size_bytes = artifact.size_bytes,
            encrypted = artifact.encrypted,
            "registered backup artifact"
        );
        Ok(artifact)
    }

    /// Loads an artifact's metadata from its sidecar.
    pub async fn load(
        &self,
        kind: BackupKind,
        id: &ArtifactId,
    ) -> Result<BackupArtifact, SalvorError> {
        let path = self.sidecar_path(kind, id);
        let bytes = tokio::fs::read(&path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SalvorError::Internal(format!("corrupt sidecar for {id}: {e}")))
    }

    /// Lists all artifacts of `kind`, newest first.
    ///
    /// Quarantined and pruned artifacts are included; callers filter with
    /// [`BackupArtifact::is_restore_candidate`] when selecting a restore
    /// source. A missing kind directory is an empty store, not an error.
    pub async fn list(&self, kind: BackupKind) -> Result<Vec<BackupArtifact>, SalvorError> {
        let dir = self.root.join(kind.to_string());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".meta.json") {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await?;
            match serde_json::from_slice::<BackupArtifact>(&bytes) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    tracing::warn!(sidecar = %entry.path().display(), error = %e, "skipping unreadable sidecar");
                }
            }
        }

        artifacts.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(artifacts)
    }

    /// The newest artifact of `kind` that is still a restore candidate.
    pub async fn latest(&self, kind: BackupKind) -> Result<Option<BackupArtifact>, SalvorError> {
        let artifacts = self.list(kind).await?;
        Ok(artifacts.into_iter().find(BackupArtifact::is_restore_candidate))
    }

    /// Recomputes the payload digest and compares it to the recorded one.
    ///
    /// Hashing runs on the blocking pool; payloads can be large.
    pub async fn verify_local(&self, artifact: &BackupArtifact) -> Result<(), SalvorError> {
        let Some(path) = artifact.local_path.clone() else {
            return Err(SalvorError::Storage {
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("artifact {} has no local payload to verify", artifact.id),
                )),
            });
        };

        let actual = tokio::task::spawn_blocking(move || sha256_file(&path))
            .await
            .map_err(|e| SalvorError::Internal(format!("checksum task panicked: {e}")))??;

        if actual != artifact.checksum_sha256 {
            return Err(SalvorError::ChecksumMismatch {
                artifact: artifact.id.to_string(),
                expected: artifact.checksum_sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Marks an artifact corrupt: the payload is renamed aside with a
    /// `.corrupt` suffix, the sidecar records the quarantine, and a critical
    /// alert goes out. Already-quarantined artifacts are returned unchanged.
    pub async fn quarantine(
        &self,
        artifact: &BackupArtifact,
        reason: &str,
    ) -> Result<BackupArtifact, SalvorError> {
        if artifact.quarantined {
            return Ok(artifact.clone());
        }

        let mut updated = artifact.clone();
        if let Some(path) = &artifact.local_path {
            let aside = quarantine_path(path);
            tokio::fs::rename(path, &aside).await?;
            updated.local_path = Some(aside);
        }
        updated.quarantined = true;
        self.write_sidecar(&updated).await?;

        tracing::error!(artifact = %updated.id, reason, "artifact quarantined");
        let alert = Alert::critical(
            "store",
            format!("artifact {} quarantined", updated.id),
            format!("local payload failed verification: {reason}"),
        );
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::warn!(error = %e, "alert delivery failed");
        }
        Ok(updated)
    }

    /// Deletes payloads whose local retention has expired as of `now`.
    ///
    /// Sidecars stay behind with `local_path` cleared, and a second pass
    /// over the same store is a no-op. Quarantined artifacts are left for
    /// an operator regardless of age.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<PruneReport, SalvorError> {
        let mut report = PruneReport::default();
        for kind in [
            BackupKind::Database,
            BackupKind::ContractSnapshot,
            BackupKind::FileStore,
        ] {
            for artifact in self.list(kind).await? {
                if artifact.quarantined {
                    report.quarantined_kept += 1;
                    continue;
                }
                let Some(path) = &artifact.local_path else {
                    continue;
                };
                if artifact.retention_expires_at > now {
                    report.retained += 1;
                    continue;
                }

                match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::warn!(artifact = %artifact.id, "payload already missing during prune");
                    }
                    Err(e) => return Err(e.into()),
                }

                let mut updated = artifact.clone();
                updated.local_path = None;
                self.write_sidecar(&updated).await?;
                tracing::info!(artifact = %updated.id, "pruned expired local payload");
                report.pruned.push(updated.id);
            }
        }
        Ok(report)
    }

    async fn write_sidecar(&self, artifact: &BackupArtifact) -> Result<(), SalvorError> {
        let path = self.sidecar_path(artifact.kind, &artifact.id);
        let json = serde_json::to_vec_pretty(artifact)
            .map_err(|e| SalvorError::Internal(format!("serialize sidecar: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// `<payload>.corrupt` next to the original payload.
fn quarantine_path(payload: &Path) -> PathBuf {
    let mut name = payload.as_os_str().to_os_string();
    name.push(QUARANTINE_SUFFIX);
    PathBuf::from(name)
}
