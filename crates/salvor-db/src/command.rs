// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subprocess runner for external dump/restore tooling.
//!
//! All invocations of `pg_dump`, `psql`, `createdb`, and `dropdb` go
//! through [`run_tool`] or [`run_tool_to_writer`], which enforce the
//! operation timeout, honor cooperative cancellation, and translate
//! non-zero exits into [`SalvorError::ExternalTool`] with the stderr tail
//! attached. Children are spawned with kill-on-drop, so an abandoned
//! invocation never leaves a dump process running.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use salvor_core::SalvorError;

/// How much trailing stderr to keep for error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// One external tool invocation: program, arguments, extra environment,
/// and an optional file to feed as stdin.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub stdin_file: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Feed the contents of `path` to the child's stdin.
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }
}

/// Result of a completed tool run.
#[derive(Debug)]
pub struct ToolRun {
    /// Captured stdout; empty when the run streamed to a writer.
    pub stdout: Vec<u8>,
    /// Total bytes the tool wrote to stdout.
    pub stdout_bytes: u64,
    /// Trailing stderr, trimmed; useful context even on success.
    pub stderr_tail: String,
}

/// Runs a tool to completion, capturing stdout in memory.
///
/// For probe queries and lifecycle commands whose output is small. Dump
/// output goes through [`run_tool_to_writer`] instead.
pub async fn run_tool(
    invocation: &ToolInvocation,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ToolRun, SalvorError> {
    let mut sink = Vec::new();
    let run = run_tool_to_writer(invocation, timeout, cancel, &mut sink).await?;
    Ok(ToolRun {
        stdout: sink,
        ..run
    })
}

/// Runs a tool to completion, streaming its stdout into `writer`.
///
/// The child is killed when the timeout elapses, when `cancel` fires, or
/// when this future is dropped. On a non-zero exit the stderr tail is
/// folded into the returned [`SalvorError::ExternalTool`].
pub async fn run_tool_to_writer<W>(
    invocation: &ToolInvocation,
    timeout: Duration,
    cancel: &CancellationToken,
    writer: &mut W,
) -> Result<ToolRun, SalvorError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .envs(invocation.envs.iter().cloned())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    match &invocation.stdin_file {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            command.stdin(Stdio::from(file));
        }
        None => {
            command.stdin(Stdio::null());
        }
    }

    let mut child = command.spawn().map_err(|e| SalvorError::ExternalTool {
        tool: invocation.program.clone(),
        message: format!("failed to spawn: {e}"),
    })?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SalvorError::Internal("child stdout was not piped".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| SalvorError::Internal("child stderr was not piped".to_string()))?;

    let run = async {
        let stderr_read = async {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        };
        let (copied, stderr_buf) = tokio::join!(tokio::io::copy(&mut stdout, writer), stderr_read);
        let stdout_bytes = copied?;
        let status = child.wait().await?;
        Ok::<_, SalvorError>((status, stdout_bytes, stderr_buf))
    };

    // The child is killed on drop, so the early-return branches leave no
    // orphaned process behind.
    let result = tokio::select! {
        _ = cancel.cancelled() => Err(SalvorError::Cancelled),
        _ = tokio::time::sleep(timeout) => Err(SalvorError::ExternalTool {
            tool: invocation.program.clone(),
            message: format!("timed out after {}s", timeout.as_secs()),
        }),
        run = run => run,
    };
    let (status, stdout_bytes, stderr_buf) = result?;

    let stderr_tail = tail_of(&stderr_buf, STDERR_TAIL_BYTES);
    if !status.success() {
        let summary = match (status.code(), stderr_tail.is_empty()) {
            (Some(code), true) => format!("exited with status {code}"),
            (Some(code), false) => format!("exited with status {code}: {stderr_tail}"),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {stderr_tail}"),
        };
        return Err(SalvorError::ExternalTool {
            tool: invocation.program.clone(),
            message: summary,
        });
    }

    tracing::debug!(tool = %invocation.program, stdout_bytes, "external tool completed");
    Ok(ToolRun {
        stdout: Vec::new(),
        stdout_bytes,
        stderr_tail,
    })
}

fn tail_of(buf: &[u8], max: usize) -> String {
    let start = buf.len().saturating_sub(max);
    String::from_utf8_lossy(&buf[start..]).trim().to_string()
}
