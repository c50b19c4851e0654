// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `psql`-backed implementation of [`DatabaseProbe`].
//!
//! Validation queries run through `psql -X -A -t`, so the engine needs no
//! database driver: the same client tooling the restore path already
//! requires answers table and row counts. Scratch-database lifecycle goes
//! through `createdb`/`dropdb` with the bare database name.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use salvor_core::traits::DatabaseProbe;
use salvor_core::types::RestoreTarget;
use salvor_core::SalvorError;

use crate::command::{run_tool, ToolInvocation};

const TABLE_COUNT_SQL: &str = "SELECT count(*) FROM information_schema.tables \
     WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
     AND table_type = 'BASE TABLE'";

/// Probe that shells out to the PostgreSQL client tools.
pub struct PsqlProbe {
    psql: String,
    createdb: String,
    dropdb: String,
    timeout: Duration,
}

impl PsqlProbe {
    pub fn new(
        psql: impl Into<String>,
        createdb: impl Into<String>,
        dropdb: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            psql: psql.into(),
            createdb: createdb.into(),
            dropdb: dropdb.into(),
            timeout,
        }
    }

    /// Runs one scalar query against `target` and parses the single value.
    async fn query_count(&self, target: &RestoreTarget, sql: &str) -> Result<u64, SalvorError> {
        // -X skips psqlrc, -A -t strip alignment and headers, leaving just
        // the value. The target descriptor doubles as psql's dbname
        // argument, so both URLs and plain names work.
        let invocation = ToolInvocation::new(&self.psql)
            .arg("-X")
            .arg("-A")
            .arg("-t")
            .arg("-c")
            .arg(sql)
            .arg(target.identity());
        let run = run_tool(&invocation, self.timeout, &CancellationToken::new()).await?;
        let raw = String::from_utf8_lossy(&run.stdout);
        let value = raw.trim();
        value.parse::<u64>().map_err(|_| {
            SalvorError::Internal(format!("unexpected count output from psql: {value:?}"))
        })
    }
}

#[async_trait]
impl DatabaseProbe for PsqlProbe {
    async fn table_count(&self, target: &RestoreTarget) -> Result<u64, SalvorError> {
        self.query_count(target, TABLE_COUNT_SQL).await
    }

    async fn row_count(&self, target: &RestoreTarget, table: &str) -> Result<u64, SalvorError> {
        // Table names are validated as identifier-safe at config load, and
        // quoting keeps psql from case-folding them.
        let sql = format!("SELECT count(*) FROM \"{table}\"");
        self.query_count(target, &sql).await
    }

    async fn create_database(&self, target: &RestoreTarget) -> Result<(), SalvorError> {
        let name = target.database_name().to_string();
        let invocation = ToolInvocation::new(&self.createdb).arg(&name);
        run_tool(&invocation, self.timeout, &CancellationToken::new()).await?;
        tracing::info!(database = %name, "created scratch database");
        Ok(())
    }

    async fn drop_database(&self, target: &RestoreTarget) -> Result<(), SalvorError> {
        let name = target.database_name().to_string();
        let invocation = ToolInvocation::new(&self.dropdb).arg("--if-exists").arg(&name);
        run_tool(&invocation, self.timeout, &CancellationToken::new()).await?;
        tracing::info!(database = %name, "dropped scratch database");
        Ok(())
    }
}
