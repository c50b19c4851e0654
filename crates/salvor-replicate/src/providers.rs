// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object-storage backends for offsite replication.
//!
//! A single [`RemoteStore`] adapts the `object_store` crate's concrete
//! clients (S3, GCS, Azure Blob, local filesystem) to the
//! [`ObjectStoreProvider`] trait. Backend selection happens once, in the
//! configuration-driven [`build_provider`] factory.
//!
//! Uploads stream through `object_store`'s multipart [`BufWriter`], so a
//! large artifact never has to fit in memory; downloads stream chunk by
//! chunk for the same reason.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use tokio::io::AsyncWriteExt;

use salvor_config::SalvorConfig;
use salvor_core::traits::{ObjectStoreProvider, RemoteObject};
use salvor_core::types::ProviderKind;
use salvor_core::SalvorError;

/// One offsite destination: an `object_store` backend plus the bucket or
/// root it was built for.
pub struct RemoteStore {
    kind: ProviderKind,
    /// URI root without a trailing slash, e.g. `s3://acme-backups`.
    uri_root: String,
    inner: Arc<dyn ObjectStore>,
}

impl RemoteStore {
    fn new(kind: ProviderKind, uri_root: String, inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            kind,
            uri_root,
            inner,
        }
    }

    /// Provider backed by `object_store`'s in-memory implementation.
    ///
    /// Contents vanish with the process; only useful in tests.
    pub fn in_memory() -> Self {
        Self::new(
            ProviderKind::Fs,
            "memory://salvor".to_string(),
            Arc::new(InMemory::new()),
        )
    }

    fn provider_err(&self, error: object_store::Error) -> SalvorError {
        SalvorError::Provider {
            provider: self.kind.to_string(),
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    fn transfer_err(&self, op: &str, key: &str, error: std::io::Error) -> SalvorError {
        SalvorError::Provider {
            provider: self.kind.to_string(),
            message: format!("{op} {key}: {error}"),
            source: Some(Box::new(error)),
        }
    }

    fn remote_object(meta: ObjectMeta) -> RemoteObject {
        RemoteObject {
            key: meta.location.to_string(),
            size_bytes: meta.size as u64,
            last_modified: Some(meta.last_modified),
        }
    }
}

#[async_trait]
impl ObjectStoreProvider for RemoteStore {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn remote_uri(&self, key: &str) -> String {
        format!("{}/{}", self.uri_root, key)
    }

    async fn put(&self, key: &str, local: &Path) -> Result<u64, SalvorError> {
        let mut file = tokio::fs::File::open(local).await?;
        let mut writer = BufWriter::new(Arc::clone(&self.inner), ObjectPath::from(key));
        let finished = match tokio::io::copy(&mut file, &mut writer).await {
            Ok(sent) => writer.shutdown().await.map(|()| sent),
            Err(error) => {
                // Abandon any in-flight multipart parts before surfacing
                // the error; the upload is restarted from scratch on retry.
                let _ = writer.abort().await;
                Err(error)
            }
        };
        finished.map_err(|e| self.transfer_err("put", key, e))
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<u64, SalvorError> {
        let result = self
            .inner
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| self.provider_err(e))?;
        let mut stream = result.into_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut received = 0u64;
        while let Some(chunk) = stream.try_next().await.map_err(|e| self.provider_err(e))? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(received)
    }

    async fn head(&self, key: &str) -> Result<RemoteObject, SalvorError> {
        let meta = self
            .inner
            .head(&ObjectPath::from(key))
            .await
            .map_err(|e| self.provider_err(e))?;
        Ok(Self::remote_object(meta))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, SalvorError> {
        let path = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        let mut stream = self.inner.list(path.as_ref());
        let mut objects = Vec::new();
        while let Some(meta) = stream.try_next().await.map_err(|e| self.provider_err(e))? {
            objects.push(Self::remote_object(meta));
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), SalvorError> {
        match self.inner.delete(&ObjectPath::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(error) => Err(self.provider_err(error)),
        }
    }
}

/// Builds the provider named by `replication.provider`.
///
/// Credentials come from the environment (`AWS_*`, `GOOGLE_*`, `AZURE_*`),
/// matching how the underlying `object_store` builders resolve them; the
/// configuration only carries destinations. Returns a `Config` error when
/// replication is disabled or the provider name is unknown.
pub fn build_provider(config: &SalvorConfig) -> Result<Arc<dyn ObjectStoreProvider>, SalvorError> {
    let Some(name) = config.replication.provider.as_deref() else {
        return Err(SalvorError::Config(
            "replication.provider is not set; offsite replication is disabled".to_string(),
        ));
    };
    let kind: ProviderKind = name
        .parse()
        .map_err(|_| SalvorError::Config(format!("unknown replication provider `{name}`")))?;

    let store = match kind {
        ProviderKind::S3 => {
            let s3 = &config.replication.s3;
            let mut builder = AmazonS3Builder::from_env().with_bucket_name(s3.bucket.as_str());
            if let Some(region) = &s3.region {
                builder = builder.with_region(region.as_str());
            }
            if let Some(endpoint) = &s3.endpoint {
                builder = builder.with_endpoint(endpoint.as_str());
            }
            let inner = builder.build().map_err(|e| builder_err(kind, e))?;
            RemoteStore::new(kind, format!("s3://{}", s3.bucket), Arc::new(inner))
        }
        ProviderKind::Gcs => {
            let gcs = &config.replication.gcs;
            let inner = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(gcs.bucket.as_str())
                .build()
                .map_err(|e| builder_err(kind, e))?;
            RemoteStore::new(kind, format!("gs://{}", gcs.bucket), Arc::new(inner))
        }
        ProviderKind::Azure => {
            let azure = &config.replication.azure;
            let inner = MicrosoftAzureBuilder::from_env()
                .with_container_name(azure.container.as_str())
                .build()
                .map_err(|e| builder_err(kind, e))?;
            RemoteStore::new(
                kind,
                format!("azure://{}", azure.container),
                Arc::new(inner),
            )
        }
        ProviderKind::Fs => {
            let root = PathBuf::from(&config.replication.fs.path);
            std::fs::create_dir_all(&root)?;
            let inner = LocalFileSystem::new_with_prefix(&root).map_err(|e| builder_err(kind, e))?;
            RemoteStore::new(kind, format!("file://{}", root.display()), Arc::new(inner))
        }
    };
    Ok(Arc::new(store))
}

fn builder_err(kind: ProviderKind, error: object_store::Error) -> SalvorError {
    SalvorError::Provider {
        provider: kind.to_string(),
        message: format!("failed to build client: {error}"),
        source: Some(Box::new(error)),
    }
}
