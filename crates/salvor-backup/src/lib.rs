// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup creation for the Salvor engine.
//!
//! Two producers share one pipeline: database backups stream `pg_dump`
//! output through gzip, contract snapshots tar the deployment-metadata
//! tree, and both end in optional AES-256-CBC encryption, a SHA-256
//! checksum, and registration in the local artifact store.

pub mod creator;

pub use creator::BackupCreator;
