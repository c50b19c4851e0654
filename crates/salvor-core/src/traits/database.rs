// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database probe trait for restore validation and drill targets.

use async_trait::async_trait;

use crate::error::SalvorError;
use crate::types::RestoreTarget;

/// Row-count/table-presence query interface to the relational database.
///
/// The engine never links a database driver; validation queries and
/// scratch-database lifecycle go through this trait, implemented over the
/// same command-line tooling the restore path uses.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    /// Number of user tables visible in the target database.
    async fn table_count(&self, target: &RestoreTarget) -> Result<u64, SalvorError>;

    /// Row count for `table`; an absent table is an error, not zero.
    async fn row_count(&self, target: &RestoreTarget, table: &str) -> Result<u64, SalvorError>;

    /// Creates the disposable database a drill restore lands in.
    async fn create_database(&self, target: &RestoreTarget) -> Result<(), SalvorError>;

    /// Drops a disposable database once a drill is done with it.
    async fn drop_database(&self, target: &RestoreTarget) -> Result<(), SalvorError>;
}
