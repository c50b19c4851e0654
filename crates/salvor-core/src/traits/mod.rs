// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams to the engine's external collaborators.
//!
//! Object storage, alerting, and the database probe are consumed only
//! through these traits; concrete implementations live in their own crates
//! and use `#[async_trait]` for dynamic dispatch compatibility.

pub mod alert;
pub mod database;
pub mod object_store;

// Re-export all traits at the traits module level for convenience.
pub use alert::{Alert, AlertSeverity, AlertSink};
pub use database::DatabaseProbe;
pub use object_store::{ObjectStoreProvider, RemoteObject};
