// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./salvor.toml` > `~/.config/salvor/salvor.toml` > `/etc/salvor/salvor.toml`
//! with environment variable overrides via `SALVOR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SalvorConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/salvor/salvor.toml` (system-wide)
/// 3. `~/.config/salvor/salvor.toml` (user XDG config)
/// 4. `./salvor.toml` (local directory)
/// 5. `SALVOR_*` environment variables
pub fn load_config() -> Result<SalvorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SalvorConfig::default()))
        .merge(Toml::file("/etc/salvor/salvor.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("salvor/salvor.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("salvor.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SalvorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SalvorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SalvorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SalvorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SALVOR_DATABASE_DUMP_COMMAND` must map
/// to `database.dump_command`, not `database.dump.command`.
fn env_provider() -> Env {
    Env::prefixed("SALVOR_").map(|key| map_env_key(key.as_str()).into())
}

// Longest sections first so SALVOR_REPLICATION_S3_BUCKET resolves to
// replication.s3.bucket rather than replication.s3_bucket. Only the
// leading section is mapped: SALVOR_DATABASE_RESTORE_COMMAND stays
// database.restore_command.
const SECTIONS: &[&str] = &[
    "replication_s3",
    "replication_gcs",
    "replication_azure",
    "replication_fs",
    "engine",
    "database",
    "contracts",
    "crypto",
    "retention",
    "replication",
    "restore",
    "drill",
    "alerts",
    "runtime",
];

/// Maps a lowercased, prefix-stripped env var name to a figment key path.
///
/// Example: `SALVOR_RETENTION_LOCAL_DAYS` arrives as `retention_local_days`
/// and maps to `retention.local_days`.
fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section) {
            if let Some(rest) = rest.strip_prefix('_') {
                return format!("{}.{rest}", section.replace('_', "."));
            }
        }
    }
    key.to_string()
}
