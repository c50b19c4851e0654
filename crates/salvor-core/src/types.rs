// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entities owned by the backup engine.
//!
//! All four entities persist as JSON (metadata sidecars and report files),
//! so every struct here derives `Serialize`/`Deserialize`. Mutation of a
//! [`RestoreJob`]'s status goes through the transition methods only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SalvorError;

/// Identifier for a backup artifact: `<kind>_<UTC timestamp>`.
///
/// Timestamp-derived and fixed-width, so lexicographic order is creation
/// order and the id doubles as the payload file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    /// Builds the id for an artifact of `kind` created at `at`.
    pub fn new(kind: BackupKind, at: DateTime<Utc>) -> Self {
        ArtifactId(format!("{kind}_{}", at.format("%Y%m%dT%H%M%S%.3fZ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind encoded in the id prefix, if the id is well-formed.
    pub fn kind(&self) -> Option<BackupKind> {
        let prefix = self.0.split('_').next()?;
        prefix.parse().ok()
    }

    /// The creation timestamp encoded in the id, if the id is well-formed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.split_once('_')?.1;
        chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S%.3fZ")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a backup artifact contains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum BackupKind {
    /// Relational database dump.
    #[strum(serialize = "database")]
    #[serde(rename = "database")]
    Database,
    /// Tarball of versioned deployment metadata (ABIs, addresses, bytecodes).
    #[strum(serialize = "contracts")]
    #[serde(rename = "contracts")]
    ContractSnapshot,
    /// File-store payload; carried in the data model but has no producer here.
    #[strum(serialize = "filestore")]
    #[serde(rename = "filestore")]
    FileStore,
}

/// A single backup payload plus its integrity/encryption metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub id: ArtifactId,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    /// Filesystem location; `None` once the local payload has been pruned.
    pub local_path: Option<PathBuf>,
    /// Size of the payload as stored (post-compression, post-encryption).
    pub size_bytes: u64,
    /// SHA-256 hex digest of the payload as stored.
    pub checksum_sha256: String,
    pub encrypted: bool,
    /// Hex-encoded initialization vector; present iff `encrypted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv_hex: Option<String>,
    /// Local retention expiry (default 30 days after creation).
    pub retention_expires_at: DateTime<Utc>,
    /// Offsite retention expiry (default 90 days after creation).
    pub offsite_retention_expires_at: DateTime<Utc>,
    /// Set when local verification found the payload corrupt; the payload is
    /// renamed aside and the artifact leaves candidate listings.
    #[serde(default)]
    pub quarantined: bool,
}

impl BackupArtifact {
    /// Checks the structural invariants recorded in the metadata.
    pub fn validate(&self) -> Result<(), SalvorError> {
        if self.checksum_sha256.len() != 64
            || !self.checksum_sha256.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(SalvorError::Internal(format!(
                "artifact {}: checksum_sha256 is not a sha-256 hex digest",
                self.id
            )));
        }
        match (&self.encrypted, &self.iv_hex) {
            (true, None) => Err(SalvorError::Internal(format!(
                "artifact {}: encrypted without an IV",
                self.id
            ))),
            (true, Some(iv)) if iv.is_empty() => Err(SalvorError::Internal(format!(
                "artifact {}: encrypted with an empty IV",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    /// Whether this artifact can be offered as a local restore candidate.
    pub fn is_restore_candidate(&self) -> bool {
        !self.quarantined && self.local_path.is_some()
    }
}

/// Offsite object-storage backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ProviderKind {
    #[strum(serialize = "s3")]
    #[serde(rename = "s3")]
    S3,
    #[strum(serialize = "gcs")]
    #[serde(rename = "gcs")]
    Gcs,
    #[strum(serialize = "azure")]
    #[serde(rename = "azure")]
    Azure,
    /// Filesystem-backed store, for drills and air-gapped staging.
    #[strum(serialize = "fs")]
    #[serde(rename = "fs")]
    Fs,
}

/// Outcome of one replication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ReplicationStatus {
    /// Uploaded and size-verified against the local payload.
    Valid,
    /// Uploaded but the remote size does not match; not a usable copy.
    Corrupt,
    /// Upload did not complete after exhausting retries.
    Failed,
}

/// Record of one artifact's replication to one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRecord {
    pub artifact_id: ArtifactId,
    pub provider: ProviderKind,
    pub remote_uri: String,
    pub uploaded_at: DateTime<Utc>,
    pub remote_size_bytes: u64,
    pub status: ReplicationStatus,
}

/// Restore destination: a connection descriptor or a disposable database name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestoreTarget(pub String);

impl RestoreTarget {
    pub fn new(descriptor: impl Into<String>) -> Self {
        RestoreTarget(descriptor.into())
    }

    /// Identity used for exclusive locking and the production guard.
    pub fn identity(&self) -> String {
        self.0.trim().to_string()
    }

    /// The bare database name: the last path segment of a URL descriptor,
    /// or the descriptor itself when it is already a plain name.
    pub fn database_name(&self) -> &str {
        let raw = self.0.trim();
        let without_query = raw.split('?').next().unwrap_or(raw);
        match without_query.rsplit_once('/') {
            Some((_, name)) if without_query.contains("://") => name,
            _ => without_query,
        }
    }
}

impl std::fmt::Display for RestoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a restore lands in production or a disposable drill target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum RestoreMode {
    #[strum(serialize = "production")]
    #[serde(rename = "production")]
    Production,
    #[strum(serialize = "drill")]
    #[serde(rename = "drill")]
    Drill,
}

/// Lifecycle states of a restore job; transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum RestoreStatus {
    Pending,
    Downloading,
    VerifyingChecksum,
    Decrypting,
    Restoring,
    Validating,
    Succeeded,
    Failed,
}

impl RestoreStatus {
    fn rank(self) -> u8 {
        match self {
            RestoreStatus::Pending => 0,
            RestoreStatus::Downloading => 1,
            RestoreStatus::VerifyingChecksum => 2,
            RestoreStatus::Decrypting => 3,
            RestoreStatus::Restoring => 4,
            RestoreStatus::Validating => 5,
            RestoreStatus::Succeeded => 6,
            RestoreStatus::Failed => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RestoreStatus::Succeeded | RestoreStatus::Failed)
    }
}

/// One restore execution, from request to terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreJob {
    pub id: String,
    pub source_artifact_id: ArtifactId,
    pub mode: RestoreMode,
    pub target: RestoreTarget,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RestoreStatus,
    pub failure_reason: Option<String>,
    /// Category slug of the error behind `failure_reason`, so scripted
    /// consumers of the job record do not have to parse the reason text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<String>,
}

impl RestoreJob {
    pub fn new(source_artifact_id: ArtifactId, mode: RestoreMode, target: RestoreTarget) -> Self {
        let started_at = Utc::now();
        RestoreJob {
            id: format!("restore_{}", started_at.format("%Y%m%dT%H%M%S%.3fZ")),
            source_artifact_id,
            mode,
            target,
            started_at,
            completed_at: None,
            status: RestoreStatus::Pending,
            failure_reason: None,
            failure_category: None,
        }
    }

    /// Moves the job forward to `next`.
    ///
    /// Skipping states is allowed (a local unencrypted restore goes
    /// `Pending → VerifyingChecksum → Restoring`), moving backwards or out
    /// of a terminal state is not. `Failed` is reached via [`fail`](Self::fail).
    pub fn advance(&mut self, next: RestoreStatus) -> Result<(), SalvorError> {
        if self.status.is_terminal() {
            return Err(SalvorError::Internal(format!(
                "restore job {}: no transitions out of terminal state {}",
                self.id, self.status
            )));
        }
        if next == RestoreStatus::Failed {
            return Err(SalvorError::Internal(format!(
                "restore job {}: use fail() to record a failure reason",
                self.id
            )));
        }
        if next.rank() <= self.status.rank() {
            return Err(SalvorError::Internal(format!(
                "restore job {}: cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        tracing::debug!(job = %self.id, from = %self.status, to = %next, "restore job transition");
        self.status = next;
        if next == RestoreStatus::Succeeded {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Moves the job to `Failed` with a reason and halts further transitions.
    ///
    /// A no-op on an already-terminal job, so error paths may call it
    /// unconditionally.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let reason = reason.into();
        tracing::debug!(job = %self.id, from = %self.status, %reason, "restore job failed");
        self.status = RestoreStatus::Failed;
        self.failure_reason = Some(reason);
        self.completed_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.status == RestoreStatus::Succeeded
    }
}

/// One problem observed during a drill phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillIssue {
    pub phase: String,
    pub message: String,
}

/// Aggregate outcome of a drill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum DrillStatus {
    /// Every phase passed.
    Success,
    /// Some phases failed, but backup creation and checksum verification held.
    PartialFailure,
    /// A critical phase (backup creation or checksum verification) failed.
    Failure,
}

/// Machine-readable result of one quarterly drill, persisted as JSON and
/// never mutated after finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillReport {
    pub drill_id: String,
    pub timestamp: DateTime<Utc>,
    pub tests_total: u32,
    pub tests_passed: u32,
    pub tests_failed: u32,
    /// Ordered phase failures, in execution order.
    pub issues: Vec<DrillIssue>,
    /// Elapsed seconds per phase (RTO proxy).
    pub rto_seconds_by_phase: BTreeMap<String, f64>,
    /// Worst-case data-loss window, derived from the configured backup cadence.
    pub rpo_seconds_estimate: u64,
    pub overall_status: DrillStatus,
}
