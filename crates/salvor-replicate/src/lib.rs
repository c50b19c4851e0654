// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offsite replication for the Salvor engine.
//!
//! Ships backup artifacts to S3, GCS, Azure Blob or a filesystem
//! destination through one provider trait, verifies every copy after
//! upload, and enforces the offsite retention window independently of
//! local pruning.

pub mod providers;
pub mod replicator;

pub use providers::{build_provider, RemoteStore};
pub use replicator::{RemoteEntry, RemotePruneReport, Replicator};
