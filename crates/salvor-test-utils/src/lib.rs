// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities shared across Salvor integration tests.
//!
//! Provides an in-memory alert sink, a scripted database probe, and fake
//! command-line tools, so pipelines can be exercised end to end without a
//! database server, an object store, or a notification channel.

pub mod alert;
pub mod probe;
pub mod tool;

pub use alert::{FailingAlertSink, MemoryAlertSink};
pub use probe::ScriptedProbe;
pub use tool::{fake_dump_tool, fake_failing_tool, fake_slow_tool, write_fake_tool};
