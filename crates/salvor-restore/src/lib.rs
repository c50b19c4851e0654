// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restore engine for Salvor.
//!
//! Takes a backup artifact from the local store or the offsite provider
//! and turns it back into a running database or an on-disk contract tree,
//! with checksum verification before and validation after. Production
//! restores write into an existing target; drill restores get a disposable
//! one that is created for the run and dropped afterwards. One restore per
//! target at a time.

pub mod lock;
pub mod orchestrator;

pub use lock::{TargetGuard, TargetLocks};
pub use orchestrator::{RestoreOrchestrator, RestoreSource};
