// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Salvor backup engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. The loaded
//! config is immutable: it is constructed once and passed by reference into
//! every component constructor -- nothing reads ambient global state.

use std::path::PathBuf;
use std::time::Duration;

use salvor_core::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Top-level Salvor configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SalvorConfig {
    /// Engine identity, directories, and logging.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Production database and the external tools that talk to it.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Contract deployment-metadata snapshots.
    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Artifact encryption settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Local and offsite retention windows.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Offsite replication provider selection and destinations.
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Restore validation and the production guard.
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Quarterly drill settings.
    #[serde(default)]
    pub drill: DrillConfig,

    /// Alert delivery settings.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Concurrency, timeouts, and retry budgets.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl SalvorConfig {
    pub fn artifacts_dir(&self) -> PathBuf {
        PathBuf::from(&self.engine.artifacts_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        PathBuf::from(&self.engine.reports_dir)
    }

    /// The connection identity a drill restore must never target.
    ///
    /// `restore.production_identity` when set, otherwise the production
    /// database URL itself.
    pub fn production_identity(&self) -> String {
        self.restore
            .production_identity
            .as_deref()
            .unwrap_or(&self.database.url)
            .trim()
            .to_string()
    }

    /// Per-operation timeout applied to external tools and provider calls.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.operation_timeout_secs)
    }

    pub fn local_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention.local_days))
    }

    pub fn offsite_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention.offsite_days))
    }

    /// Retry schedule for external dump/restore tools.
    pub fn tool_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.runtime.tool_attempts,
            Duration::from_millis(self.runtime.retry_base_delay_ms),
        )
    }

    /// Retry schedule for offsite provider operations.
    pub fn provider_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.runtime.provider_attempts,
            Duration::from_millis(self.runtime.retry_base_delay_ms),
        )
    }
}

/// Engine identity and filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding artifact payloads and their metadata sidecars.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// Directory holding drill reports and restore job records.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            artifacts_dir: default_artifacts_dir(),
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_artifacts_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("salvor/artifacts").display().to_string())
        .unwrap_or_else(|| "/var/lib/salvor/artifacts".to_string())
}

fn default_reports_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("salvor/reports").display().to_string())
        .unwrap_or_else(|| "/var/lib/salvor/reports".to_string())
}

/// Production database connection and external tooling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection descriptor of the production database being backed up.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Dump tool invoked for database backups.
    #[serde(default = "default_dump_command")]
    pub dump_command: String,

    /// Restore/query tool invoked for restores and validation probes.
    #[serde(default = "default_restore_command")]
    pub restore_command: String,

    /// Tool that creates a disposable drill database.
    #[serde(default = "default_create_command")]
    pub create_command: String,

    /// Tool that drops a disposable drill database.
    #[serde(default = "default_drop_command")]
    pub drop_command: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            dump_command: default_dump_command(),
            restore_command: default_restore_command(),
            create_command: default_create_command(),
            drop_command: default_drop_command(),
        }
    }
}

fn default_database_url() -> String {
    "postgres://localhost:5432/platform".to_string()
}

fn default_dump_command() -> String {
    "pg_dump".to_string()
}

fn default_restore_command() -> String {
    "psql".to_string()
}

fn default_create_command() -> String {
    "createdb".to_string()
}

fn default_drop_command() -> String {
    "dropdb".to_string()
}

/// Contract snapshot source material.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsConfig {
    /// Directory of versioned deployment metadata (ABIs, addresses, bytecodes).
    #[serde(default = "default_contracts_dir")]
    pub source_dir: String,

    /// File extensions a restored snapshot must contain to validate.
    #[serde(default = "default_contract_extensions")]
    pub expected_extensions: Vec<String>,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_contracts_dir(),
            expected_extensions: default_contract_extensions(),
        }
    }
}

fn default_contracts_dir() -> String {
    "deployments".to_string()
}

fn default_contract_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

/// Artifact encryption settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CryptoConfig {
    /// Path to the AES-256 key file (32 raw bytes or 64 hex characters).
    /// `None` disables encryption support entirely.
    #[serde(default)]
    pub key_file: Option<String>,
}

/// Retention windows, in days.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// How long local payloads are kept before pruning.
    #[serde(default = "default_local_days")]
    pub local_days: u32,

    /// How long offsite copies are kept; typically longer than local.
    #[serde(default = "default_offsite_days")]
    pub offsite_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            local_days: default_local_days(),
            offsite_days: default_offsite_days(),
        }
    }
}

fn default_local_days() -> u32 {
    30
}

fn default_offsite_days() -> u32 {
    90
}

/// Offsite replication destination.
///
/// Credentials are never stored here: each provider's client reads its
/// standard environment (`AWS_*`, `GOOGLE_*`, `AZURE_*`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicationConfig {
    /// Active provider (`s3`, `gcs`, `azure`, `fs`). `None` disables replication.
    #[serde(default)]
    pub provider: Option<String>,

    /// Key prefix prepended to every uploaded object.
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub gcs: GcsConfig,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub fs: FsConfig,
}

/// Amazon S3 (or S3-compatible) destination.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores (MinIO, Ceph).
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Google Cloud Storage destination.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GcsConfig {
    #[serde(default)]
    pub bucket: String,
}

/// Azure Blob Storage destination.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AzureConfig {
    #[serde(default)]
    pub container: String,
}

/// Filesystem-backed destination, for drills and air-gapped staging.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    #[serde(default)]
    pub path: String,
}

/// Restore validation and production guard settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreConfig {
    /// Connection identity that drill restores must refuse. Defaults to the
    /// production database URL when unset.
    #[serde(default)]
    pub production_identity: Option<String>,

    /// Tables that must exist with nonzero rows for a restore to validate.
    #[serde(default)]
    pub critical_tables: Vec<String>,
}

/// Quarterly drill settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DrillConfig {
    /// Scheduled backup cadence in hours; the drill's RPO estimate is this
    /// window expressed in seconds.
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u64,

    /// Prefix for disposable drill database names.
    #[serde(default = "default_scratch_prefix")]
    pub scratch_database_prefix: String,

    /// Whether drill backups exercise the encryption path. Requires
    /// `crypto.key_file`.
    #[serde(default)]
    pub encrypt: bool,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            backup_interval_hours: default_backup_interval_hours(),
            scratch_database_prefix: default_scratch_prefix(),
            encrypt: false,
        }
    }
}

fn default_backup_interval_hours() -> u64 {
    24
}

fn default_scratch_prefix() -> String {
    "salvor_drill".to_string()
}

/// Alert delivery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Webhook endpoint receiving JSON alert payloads. `None` logs alerts
    /// instead of delivering them.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Delivery timeout for one webhook POST.
    #[serde(default = "default_alert_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_alert_timeout_secs(),
        }
    }
}

fn default_alert_timeout_secs() -> u64 {
    10
}

/// Concurrency, timeout, and retry budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Upper bound on concurrent backup/replication work.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Per-operation timeout for external tools and provider calls, seconds.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Attempts for an external dump/restore tool before surfacing failure.
    #[serde(default = "default_tool_attempts")]
    pub tool_attempts: u32,

    /// Attempts for one provider operation before marking replication failed.
    #[serde(default = "default_provider_attempts")]
    pub provider_attempts: u32,

    /// Base delay for exponential backoff between retries, milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            operation_timeout_secs: default_operation_timeout_secs(),
            tool_attempts: default_tool_attempts(),
            provider_attempts: default_provider_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_concurrency_limit() -> usize {
    2
}

fn default_operation_timeout_secs() -> u64 {
    900
}

fn default_tool_attempts() -> u32 {
    3
}

fn default_provider_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}
