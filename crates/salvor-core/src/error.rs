// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Salvor backup engine.

use thiserror::Error;

/// The primary error type used across all Salvor components.
///
/// Variants are split along the retryable / fatal line: transient
/// infrastructure failures ([`is_retryable`](SalvorError::is_retryable))
/// may be re-attempted with backoff, while data-integrity failures are
/// surfaced with full context and never retried automatically.
#[derive(Debug, Error)]
pub enum SalvorError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// An external dump/restore tool exited non-zero or timed out. Retryable.
    #[error("external tool failure: {tool}: {message}")]
    ExternalTool { tool: String, message: String },

    /// Stored payload bytes no longer match the recorded digest. Fatal for
    /// the artifact; never retried blindly.
    #[error("checksum mismatch for {artifact}: expected {expected}, actual {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Decryption failed (bad padding or wrong key/IV pairing). Fatal;
    /// requires operator escalation -- no key recovery is attempted.
    #[error("decryption error: {message}")]
    Decryption { message: String },

    /// Offsite provider error (network, API rejection). Retryable with backoff.
    #[error("provider error: {provider}: {message}")]
    Provider {
        provider: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Offsite provider call exceeded the per-operation timeout. Retryable.
    #[error("provider timeout: {provider} after {duration:?}")]
    ProviderTimeout {
        provider: String,
        duration: std::time::Duration,
    },

    /// Another restore already holds the exclusive lock for this target.
    /// Rejects the new request; the running job is unaffected.
    #[error("restore already in progress for target {target}")]
    RestoreInProgress { target: String },

    /// The restore target was refused before any action was taken
    /// (e.g. a drill restore aimed at the production identity).
    #[error("restore target rejected: {target}: {reason}")]
    TargetRejected { target: String, reason: String },

    /// Post-restore validation found missing tables or empty critical data,
    /// even though the restore command itself succeeded.
    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    /// Local disk is full. Immediately fatal, no retry.
    #[error("disk space exhausted: {message}")]
    DiskSpaceExhausted { message: String },

    /// The encryption key file is missing, unreadable, malformed, or has
    /// unsafe permissions. Immediately fatal, no retry.
    #[error("encryption key unavailable: {message}")]
    KeyUnavailable { message: String },

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// Local filesystem errors (artifact directory, sidecars, temp files).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors (state machine misuse, serialization).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SalvorError {
    /// Whether the retry policy may re-attempt the failed operation.
    ///
    /// Only transient infrastructure failures qualify; integrity and key
    /// errors must reach an operator unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SalvorError::ExternalTool { .. }
                | SalvorError::Provider { .. }
                | SalvorError::ProviderTimeout { .. }
        )
    }

    /// Stable category slug used in CLI error lines and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SalvorError::Config(_) => "config",
            SalvorError::ExternalTool { .. } => "external-tool",
            SalvorError::ChecksumMismatch { .. } => "checksum-mismatch",
            SalvorError::Decryption { .. } => "decryption",
            SalvorError::Provider { .. } => "provider",
            SalvorError::ProviderTimeout { .. } => "provider-timeout",
            SalvorError::RestoreInProgress { .. } => "restore-in-progress",
            SalvorError::TargetRejected { .. } => "target-rejected",
            SalvorError::ValidationFailed { .. } => "validation-failed",
            SalvorError::DiskSpaceExhausted { .. } => "disk-space",
            SalvorError::KeyUnavailable { .. } => "key-unavailable",
            SalvorError::Cancelled => "cancelled",
            SalvorError::Storage { .. } => "storage",
            SalvorError::Internal(_) => "internal",
        }
    }

    /// Process exit code for the CLI, one per error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            SalvorError::Config(_) => 2,
            SalvorError::ExternalTool { .. } => 3,
            SalvorError::ChecksumMismatch { .. }
            | SalvorError::Decryption { .. }
            | SalvorError::ValidationFailed { .. } => 4,
            SalvorError::Provider { .. } | SalvorError::ProviderTimeout { .. } => 5,
            SalvorError::KeyUnavailable { .. } => 6,
            SalvorError::RestoreInProgress { .. } | SalvorError::TargetRejected { .. } => 7,
            SalvorError::DiskSpaceExhausted { .. } => 8,
            SalvorError::Cancelled => 130,
            SalvorError::Storage { .. } | SalvorError::Internal(_) => 1,
        }
    }

    /// Whether this error must fire the alert sink when it surfaces.
    ///
    /// Retryable errors alert only after the retry budget is exhausted, at
    /// which point callers wrap-or-pass them through here.
    pub fn is_alertable(&self) -> bool {
        !matches!(
            self,
            SalvorError::RestoreInProgress { .. }
                | SalvorError::TargetRejected { .. }
                | SalvorError::Cancelled
                | SalvorError::Config(_)
        )
    }
}

impl From<std::io::Error> for SalvorError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::StorageFull {
            return SalvorError::DiskSpaceExhausted {
                message: err.to_string(),
            };
        }
        SalvorError::Storage {
            source: Box::new(err),
        }
    }
}
