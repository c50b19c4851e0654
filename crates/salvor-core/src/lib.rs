// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Salvor backup engine.
//!
//! This crate provides the error taxonomy, the four persisted entities
//! (artifacts, replication records, restore jobs, drill reports), and the
//! trait seams to external collaborators (object storage, alerting, the
//! database probe). Every other crate in the workspace builds on these.

pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SalvorError;
pub use retry::RetryPolicy;
pub use types::{
    ArtifactId, BackupArtifact, BackupKind, DrillIssue, DrillReport, DrillStatus, ProviderKind,
    ReplicationRecord, ReplicationStatus, RestoreJob, RestoreMode, RestoreStatus, RestoreTarget,
};

// Re-export the collaborator traits at crate root.
pub use traits::{Alert, AlertSeverity, AlertSink, DatabaseProbe, ObjectStoreProvider, RemoteObject};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvor_error_has_all_variants() {
        // Verify all 14 error variants exist and can be constructed.
        let _config = SalvorError::Config("test".into());
        let _tool = SalvorError::ExternalTool {
            tool: "pg_dump".into(),
            message: "exit 2".into(),
        };
        let _checksum = SalvorError::ChecksumMismatch {
            artifact: "database_x".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let _decryption = SalvorError::Decryption {
            message: "bad padding".into(),
        };
        let _provider = SalvorError::Provider {
            provider: "s3".into(),
            message: "503".into(),
            source: None,
        };
        let _provider_timeout = SalvorError::ProviderTimeout {
            provider: "gcs".into(),
            duration: std::time::Duration::from_secs(30),
        };
        let _in_progress = SalvorError::RestoreInProgress {
            target: "platform".into(),
        };
        let _rejected = SalvorError::TargetRejected {
            target: "platform".into(),
            reason: "matches production identity".into(),
        };
        let _validation = SalvorError::ValidationFailed {
            message: "users empty".into(),
        };
        let _disk = SalvorError::DiskSpaceExhausted {
            message: "/var/backups".into(),
        };
        let _key = SalvorError::KeyUnavailable {
            message: "missing".into(),
        };
        let _cancelled = SalvorError::Cancelled;
        let _storage = SalvorError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _internal = SalvorError::Internal("test".into());
    }

    #[test]
    fn backup_kind_has_three_variants() {
        use std::str::FromStr;

        let variants = [
            BackupKind::Database,
            BackupKind::ContractSnapshot,
            BackupKind::FileStore,
        ];
        assert_eq!(variants.len(), 3, "BackupKind must have exactly 3 variants");

        // Verify Display and FromStr round-trip for all variants.
        for variant in &variants {
            let s = variant.to_string();
            let parsed = BackupKind::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn provider_kind_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [
            ProviderKind::S3,
            ProviderKind::Gcs,
            ProviderKind::Azure,
            ProviderKind::Fs,
        ] {
            let s = variant.to_string();
            let parsed = ProviderKind::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_trait_seams_are_exported() {
        // Compile-time check that the collaborator traits are accessible
        // through the public API.
        fn _assert_object_store<T: ObjectStoreProvider>() {}
        fn _assert_alert_sink<T: AlertSink>() {}
        fn _assert_database_probe<T: DatabaseProbe>() {}
    }
}
