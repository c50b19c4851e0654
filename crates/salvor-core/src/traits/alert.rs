// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert notification trait.

use async_trait::async_trait;
use strum::Display;

use crate::error::SalvorError;

/// How urgently an operator needs to see the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// A single operator notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    /// Component that raised the alert (`store`, `replicator`, `drill`, ...).
    pub component: String,
    /// One-line summary suitable for a chat channel.
    pub summary: String,
    /// Full context: artifact ids, expected vs actual values, phase names.
    pub detail: String,
}

impl Alert {
    pub fn warning(
        component: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Alert {
            severity: AlertSeverity::Warning,
            component: component.into(),
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn critical(
        component: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Alert {
            severity: AlertSeverity::Critical,
            component: component.into(),
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

/// Outbound notification channel.
///
/// Senders treat delivery as best-effort: a failing sink is logged by the
/// caller and never turns a backup or restore result into a failure.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), SalvorError>;
}
