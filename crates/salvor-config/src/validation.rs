// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: provider/destination consistency, identifier-safe table
//! names, positive retry and retention budgets.

use std::str::FromStr;

use salvor_core::ProviderKind;

use crate::diagnostic::ConfigError;
use crate::model::SalvorConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SalvorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.engine.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "engine.log_level must be one of {}, got `{}`",
                VALID_LOG_LEVELS.join(", "),
                config.engine.log_level
            ),
        });
    }

    for (key, value) in [
        ("engine.artifacts_dir", &config.engine.artifacts_dir),
        ("engine.reports_dir", &config.engine.reports_dir),
        ("database.url", &config.database.url),
        ("database.dump_command", &config.database.dump_command),
        ("database.restore_command", &config.database.restore_command),
        ("database.create_command", &config.database.create_command),
        ("database.drop_command", &config.database.drop_command),
        ("contracts.source_dir", &config.contracts.source_dir),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    if config.retention.local_days == 0 {
        errors.push(ConfigError::Validation {
            message: "retention.local_days must be at least 1".to_string(),
        });
    }
    if config.retention.offsite_days == 0 {
        errors.push(ConfigError::Validation {
            message: "retention.offsite_days must be at least 1".to_string(),
        });
    }

    // Provider selection must name a known backend with a usable destination.
    if let Some(provider) = config.replication.provider.as_deref() {
        match ProviderKind::from_str(provider) {
            Ok(ProviderKind::S3) => {
                if config.replication.s3.bucket.trim().is_empty() {
                    errors.push(ConfigError::Validation {
                        message: "replication.s3.bucket must be set when provider = \"s3\""
                            .to_string(),
                    });
                }
            }
            Ok(ProviderKind::Gcs) => {
                if config.replication.gcs.bucket.trim().is_empty() {
                    errors.push(ConfigError::Validation {
                        message: "replication.gcs.bucket must be set when provider = \"gcs\""
                            .to_string(),
                    });
                }
            }
            Ok(ProviderKind::Azure) => {
                if config.replication.azure.container.trim().is_empty() {
                    errors.push(ConfigError::Validation {
                        message: "replication.azure.container must be set when provider = \"azure\""
                            .to_string(),
                    });
                }
            }
            Ok(ProviderKind::Fs) => {
                if config.replication.fs.path.trim().is_empty() {
                    errors.push(ConfigError::Validation {
                        message: "replication.fs.path must be set when provider = \"fs\""
                            .to_string(),
                    });
                }
            }
            Err(_) => {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "replication.provider must be one of s3, gcs, azure, fs, got `{provider}`"
                    ),
                });
            }
        }
    }

    // Critical tables end up interpolated into validation queries; restrict
    // them to identifier-safe characters.
    for (i, table) in config.restore.critical_tables.iter().enumerate() {
        if table.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("restore.critical_tables[{i}] must not be empty"),
            });
        } else if !table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            errors.push(ConfigError::Validation {
                message: format!(
                    "restore.critical_tables[{i}] `{table}` may only contain letters, digits, and underscores"
                ),
            });
        }
    }

    if config.drill.backup_interval_hours == 0 {
        errors.push(ConfigError::Validation {
            message: "drill.backup_interval_hours must be at least 1".to_string(),
        });
    }

    let prefix = &config.drill.scratch_database_prefix;
    if prefix.trim().is_empty()
        || !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "drill.scratch_database_prefix `{prefix}` must be a nonempty identifier (letters, digits, underscores)"
            ),
        });
    }

    if config.drill.encrypt && config.crypto.key_file.is_none() {
        errors.push(ConfigError::Validation {
            message: "drill.encrypt = true requires crypto.key_file to be set".to_string(),
        });
    }

    if let Some(url) = config.alerts.webhook_url.as_deref()
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(ConfigError::Validation {
            message: format!("alerts.webhook_url must start with http:// or https://, got `{url}`"),
        });
    }

    if config.runtime.concurrency_limit == 0 {
        errors.push(ConfigError::Validation {
            message: "runtime.concurrency_limit must be at least 1".to_string(),
        });
    }
    if config.runtime.operation_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "runtime.operation_timeout_secs must be at least 1".to_string(),
        });
    }
    if config.runtime.tool_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "runtime.tool_attempts must be at least 1".to_string(),
        });
    }
    if config.runtime.provider_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "runtime.provider_attempts must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
