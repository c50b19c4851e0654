// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive in-process locks keyed by restore target identity.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use salvor_core::types::RestoreTarget;
use salvor_core::SalvorError;

/// Serializes restores per target identity.
///
/// A second restore against a held identity is rejected with
/// `RestoreInProgress`, never queued; the running job is unaffected.
/// Different identities proceed independently.
#[derive(Debug, Default)]
pub struct TargetLocks {
    held: Mutex<HashSet<String>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `target`, releasing it when the guard drops.
    pub fn acquire(self: &Arc<Self>, target: &RestoreTarget) -> Result<TargetGuard, SalvorError> {
        let identity = target.identity();
        if !lock_set(&self.held).insert(identity.clone()) {
            return Err(SalvorError::RestoreInProgress { target: identity });
        }
        Ok(TargetGuard {
            locks: Arc::clone(self),
            identity,
        })
    }
}

/// Held lock on one target identity.
#[derive(Debug)]
pub struct TargetGuard {
    locks: Arc<TargetLocks>,
    identity: String,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        lock_set(&self.locks.held).remove(&self.identity);
    }
}

/// Recovers from mutex poisoning: insert and remove keep the set consistent
/// even when a holder's thread panicked.
fn lock_set(held: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    match held.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
