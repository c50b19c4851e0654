// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator alerting for Salvor.
//!
//! Backup, replication, restore, and drill components raise alerts through
//! the `AlertSink` trait from `salvor-core`; this crate supplies the concrete
//! sinks. [`WebhookAlerter`] delivers each alert as a JSON POST to the
//! endpoint in `alerts.webhook_url`, [`LogAlerter`] writes it to the tracing
//! stream instead, and [`sink_from_config`] picks between them.

pub mod sink;

pub use sink::{sink_from_config, LogAlerter, WebhookAlerter};
