// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted database probe for deterministic testing.
//!
//! `ScriptedProbe` implements `DatabaseProbe` with pre-configured answers
//! per target identity, and records every create/drop call so tests can
//! assert on scratch-database lifecycle without a real server.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use salvor_core::traits::DatabaseProbe;
use salvor_core::types::RestoreTarget;
use salvor_core::SalvorError;

/// A database probe that answers from scripted tables instead of a server.
///
/// Unknown targets report the fallback table count (zero unless raised);
/// unknown (target, table) pairs error the way a real probe does when the
/// relation is absent.
#[derive(Default)]
pub struct ScriptedProbe {
    tables: Mutex<HashMap<String, u64>>,
    fallback_tables: Mutex<u64>,
    rows: Mutex<HashMap<(String, String), u64>>,
    created: Mutex<Vec<String>>,
    dropped: Mutex<Vec<String>>,
    fail_queries: Mutex<bool>,
}

impl ScriptedProbe {
    /// Create a probe with no scripted answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the user-table count for a target identity.
    pub async fn set_table_count(&self, target: &str, count: u64) {
        self.tables.lock().await.insert(target.to_string(), count);
    }

    /// Table count reported for targets with no scripted answer. Useful
    /// when the target name is generated at runtime, like a drill's
    /// scratch database.
    pub async fn set_fallback_table_count(&self, count: u64) {
        *self.fallback_tables.lock().await = count;
    }

    /// Script the row count for a table within a target.
    pub async fn set_row_count(&self, target: &str, table: &str, rows: u64) {
        self.rows
            .lock()
            .await
            .insert((target.to_string(), table.to_string()), rows);
    }

    /// Make every subsequent query call fail, simulating a dead server.
    pub async fn fail_queries(&self, fail: bool) {
        *self.fail_queries.lock().await = fail;
    }

    /// Targets passed to `create_database`, in call order.
    pub async fn created(&self) -> Vec<String> {
        self.created.lock().await.clone()
    }

    /// Targets passed to `drop_database`, in call order.
    pub async fn dropped(&self) -> Vec<String> {
        self.dropped.lock().await.clone()
    }

    async fn check_failure(&self) -> Result<(), SalvorError> {
        if *self.fail_queries.lock().await {
            return Err(SalvorError::ExternalTool {
                tool: "scripted-probe".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseProbe for ScriptedProbe {
    async fn table_count(&self, target: &RestoreTarget) -> Result<u64, SalvorError> {
        self.check_failure().await?;
        if let Some(count) = self.tables.lock().await.get(&target.identity()).copied() {
            return Ok(count);
        }
        Ok(*self.fallback_tables.lock().await)
    }

    async fn row_count(&self, target: &RestoreTarget, table: &str) -> Result<u64, SalvorError> {
        self.check_failure().await?;
        self.rows
            .lock()
            .await
            .get(&(target.identity(), table.to_string()))
            .copied()
            .ok_or_else(|| SalvorError::ExternalTool {
                tool: "scripted-probe".to_string(),
                message: format!("relation \"{table}\" does not exist"),
            })
    }

    async fn create_database(&self, target: &RestoreTarget) -> Result<(), SalvorError> {
        self.check_failure().await?;
        self.created.lock().await.push(target.identity());
        Ok(())
    }

    async fn drop_database(&self, target: &RestoreTarget) -> Result<(), SalvorError> {
        self.check_failure().await?;
        self.dropped.lock().await.push(target.identity());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_answers_are_returned() {
        let probe = ScriptedProbe::new();
        probe.set_table_count("drill_db", 12).await;
        probe.set_row_count("drill_db", "users", 340).await;

        let target = RestoreTarget("drill_db".to_string());
        assert_eq!(probe.table_count(&target).await.unwrap(), 12);
        assert_eq!(probe.row_count(&target, "users").await.unwrap(), 340);
    }

    #[tokio::test]
    async fn unknown_target_has_zero_tables() {
        let probe = ScriptedProbe::new();
        let target = RestoreTarget("never_scripted".to_string());
        assert_eq!(probe.table_count(&target).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fallback_count_covers_generated_target_names() {
        let probe = ScriptedProbe::new();
        probe.set_fallback_table_count(7).await;
        probe.set_table_count("known", 2).await;

        assert_eq!(
            probe
                .table_count(&RestoreTarget("salvor_drill_20260401".to_string()))
                .await
                .unwrap(),
            7
        );
        assert_eq!(
            probe.table_count(&RestoreTarget("known".to_string())).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn absent_table_is_an_error_not_zero() {
        let probe = ScriptedProbe::new();
        probe.set_table_count("db", 3).await;

        let target = RestoreTarget("db".to_string());
        let err = probe.row_count(&target, "missing").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn create_and_drop_are_recorded() {
        let probe = ScriptedProbe::new();
        let target = RestoreTarget("scratch_1".to_string());
        probe.create_database(&target).await.unwrap();
        probe.drop_database(&target).await.unwrap();

        assert_eq!(probe.created().await, vec!["scratch_1".to_string()]);
        assert_eq!(probe.dropped().await, vec!["scratch_1".to_string()]);
    }

    #[tokio::test]
    async fn fail_queries_simulates_dead_server() {
        let probe = ScriptedProbe::new();
        probe.set_table_count("db", 5).await;
        probe.fail_queries(true).await;

        let target = RestoreTarget("db".to_string());
        assert!(probe.table_count(&target).await.is_err());

        probe.fail_queries(false).await;
        assert_eq!(probe.table_count(&target).await.unwrap(), 5);
    }
}
