// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External database tooling for the Salvor engine.
//!
//! The engine never links a database driver. Dumps, restores, validation
//! queries, and scratch-database lifecycle all shell out to the configured
//! PostgreSQL client tools, with timeouts and cancellation enforced on
//! every invocation.

pub mod command;
pub mod probe;

pub use command::{run_tool, run_tool_to_writer, ToolInvocation, ToolRun};
pub use probe::PsqlProbe;
