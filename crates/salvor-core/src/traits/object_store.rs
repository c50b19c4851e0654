// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offsite object-storage provider trait.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SalvorError;
use crate::types::ProviderKind;

/// Metadata for one remote object, as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    /// Key relative to the provider's configured bucket/container and prefix.
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Provider-agnostic interface over offsite object storage.
///
/// One trait covers every backend (S3, GCS, Azure, filesystem); selection
/// happens in a configuration-driven factory, never by inspecting types at
/// runtime. Implementations must handle large payloads with
/// multipart/resumable uploads behind [`put`](ObjectStoreProvider::put).
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    /// Which backend this provider talks to.
    fn kind(&self) -> ProviderKind;

    /// Stable URI for `key`, e.g. `s3://bucket/prefix/database_...`.
    fn remote_uri(&self, key: &str) -> String;

    /// Uploads the file at `local` under `key`, returning bytes sent.
    async fn put(&self, key: &str, local: &Path) -> Result<u64, SalvorError>;

    /// Downloads `key` to `dest`, returning bytes received.
    async fn get(&self, key: &str, dest: &Path) -> Result<u64, SalvorError>;

    /// Stats `key` without downloading it; used for post-upload size checks.
    async fn head(&self, key: &str) -> Result<RemoteObject, SalvorError>;

    /// Lists objects under `prefix` (empty prefix lists everything).
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, SalvorError>;

    /// Removes `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), SalvorError>;
}

impl std::fmt::Debug for dyn ObjectStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreProvider")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}
