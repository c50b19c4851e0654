// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local artifact storage for the Salvor engine.
//!
//! Owns the on-disk layout of backup payloads and their JSON metadata
//! sidecars, retention-based pruning, integrity verification, and the
//! quarantine path for payloads that fail verification.

pub mod store;

pub use store::{LocalStore, PruneReport, StagedArtifact};
