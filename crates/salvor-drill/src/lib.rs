// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disaster recovery drills for Salvor.
//!
//! A drill answers one question on a schedule: if production data vanished
//! right now, would the backups actually bring it back? The harness takes
//! real backups, restores them into disposable targets, and records what
//! held and what did not, with per-phase timings as the RTO evidence and
//! the configured backup cadence as the RPO estimate.

pub mod harness;

pub use harness::DrillHarness;
