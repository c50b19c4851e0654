// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory alert sink for deterministic testing.
//!
//! `MemoryAlertSink` implements `AlertSink` by recording every alert it
//! receives, enabling assertions on what a pipeline raised without any
//! network delivery.

use async_trait::async_trait;
use tokio::sync::Mutex;

use salvor_core::traits::{Alert, AlertSink};
use salvor_core::SalvorError;

/// An alert sink that records alerts instead of delivering them.
#[derive(Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    /// Create a new sink with no recorded alerts.
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts recorded so far, in delivery order.
    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }

    /// Number of alerts recorded so far.
    pub async fn count(&self) -> usize {
        self.alerts.lock().await.len()
    }

    /// Whether any recorded alert's summary contains `needle`.
    pub async fn contains_summary(&self, needle: &str) -> bool {
        self.alerts
            .lock()
            .await
            .iter()
            .any(|a| a.summary.contains(needle))
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn send(&self, alert: &Alert) -> Result<(), SalvorError> {
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }
}

/// An alert sink whose delivery always fails.
///
/// Used to verify that callers treat alerting as best-effort and never
/// let a broken notification channel fail the operation itself.
#[derive(Default)]
pub struct FailingAlertSink;

impl FailingAlertSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for FailingAlertSink {
    async fn send(&self, _alert: &Alert) -> Result<(), SalvorError> {
        Err(SalvorError::Internal("alert sink unavailable".to_string()))
    }
}
