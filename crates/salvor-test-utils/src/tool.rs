// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake command-line tools for exercising the dump/restore pipeline.
//!
//! Tests that drive `pg_dump`, `psql`, `createdb`, and `dropdb` use small
//! shell scripts written into a temp directory instead of real binaries, so
//! the full subprocess path (spawn, pipes, exit codes) runs in CI.

use std::path::{Path, PathBuf};

/// Write an executable shell script named `name` into `dir` and return its path.
///
/// The script body follows a `#!/bin/sh` line, so `body` can use positional
/// arguments, `echo`, and exit codes directly.
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!("#!/bin/sh\n{body}\n");
    std::fs::write(&path, script).expect("write fake tool");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).expect("stat fake tool").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod fake tool");
    }
    path
}

/// A fake dump tool that writes `payload` lines to stdout and exits 0.
pub fn fake_dump_tool(dir: &Path, name: &str, payload: &str) -> PathBuf {
    write_fake_tool(dir, name, &format!("printf '%s\\n' \"{payload}\""))
}

/// A fake tool that prints `stderr_line` to stderr and exits with `code`.
pub fn fake_failing_tool(dir: &Path, name: &str, stderr_line: &str, code: i32) -> PathBuf {
    write_fake_tool(
        dir,
        name,
        &format!("echo \"{stderr_line}\" >&2\nexit {code}"),
    )
}

/// A fake tool that sleeps `seconds` before exiting 0, for timeout tests.
pub fn fake_slow_tool(dir: &Path, name: &str, seconds: u32) -> PathBuf {
    write_fake_tool(dir, name, &format!("sleep {seconds}"))
}
