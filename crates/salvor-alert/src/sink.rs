// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete alert sinks.
//!
//! Delivery is best-effort by contract: callers log a failed `send` and move
//! on, so neither sink retries internally. A webhook outage must not stall
//! the backup or restore path that raised the alert.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use salvor_config::SalvorConfig;
use salvor_core::{Alert, AlertSeverity, AlertSink, SalvorError};
use serde::Serialize;
use tracing::{debug, error, warn};

/// JSON document POSTed to the webhook, one per alert.
#[derive(Serialize)]
struct WebhookPayload<'a> {
    severity: &'a str,
    component: &'a str,
    summary: &'a str,
    detail: &'a str,
}

/// Delivers alerts as JSON POSTs to an operator webhook.
pub struct WebhookAlerter {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlerter {
    /// Builds the sink with a dedicated HTTP client enforcing the delivery
    /// timeout on every POST.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SalvorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SalvorError::Provider {
                provider: "webhook".to_string(),
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), SalvorError> {
        let payload = WebhookPayload {
            severity: severity_label(alert.severity),
            component: &alert.component,
            summary: &alert.summary,
            detail: &alert.detail,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SalvorError::Provider {
                provider: "webhook".to_string(),
                message: format!("alert delivery failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SalvorError::Provider {
                provider: "webhook".to_string(),
                message: format!("webhook returned {status}: {body}"),
                source: None,
            });
        }

        debug!(component = %alert.component, severity = %alert.severity, "alert delivered");
        Ok(())
    }
}

/// Wire label for a severity, matching the kebab-case style of error
/// categories and report fields.
fn severity_label(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
    }
}

/// Writes alerts to the tracing stream.
///
/// Used when no webhook is configured, so an install without paging still
/// records every alert where an operator can grep for it.
pub struct LogAlerter;

#[async_trait]
impl AlertSink for LogAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), SalvorError> {
        match alert.severity {
            AlertSeverity::Warning => warn!(
                component = %alert.component,
                detail = %alert.detail,
                "{}",
                alert.summary
            ),
            AlertSeverity::Critical => error!(
                component = %alert.component,
                detail = %alert.detail,
                "{}",
                alert.summary
            ),
        }
        Ok(())
    }
}

/// Picks the sink the config asks for: the webhook when `alerts.webhook_url`
/// is set, the log fallback otherwise.
pub fn sink_from_config(config: &SalvorConfig) -> Result<Arc<dyn AlertSink>, SalvorError> {
    match &config.alerts.webhook_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.alerts.timeout_secs);
            Ok(Arc::new(WebhookAlerter::new(url.clone(), timeout)?))
        }
        None => Ok(Arc::new(LogAlerter)),
    }
}
