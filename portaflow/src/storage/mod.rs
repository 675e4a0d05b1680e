//! Attachment storage backends.
//!
//! Identity-document images go either to an S3-compatible bucket or to local
//! disk, selected by configuration. Both backends return a URL suitable for
//! embedding in the operations email: public or presigned for the bucket,
//! token-gated download links for disk.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use url::Url;

use crate::config::{Config, StorageConfig};
use crate::errors::{Error, Result};
use crate::text::sanitize;

/// A stored attachment: the key under which it lives and the URL that reaches it.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    /// Object key relative to the bucket or disk root
    pub path: String,
    /// Final file name component of the key
    pub object_name: String,
    /// URL embedded in the notification emails
    pub url: String,
}

/// Trait for attachment storage backends
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Write the bytes under `path` and return the attachment with its URL.
    async fn store(&self, path: &str, content_type: &str, content: Bytes) -> Result<StoredAttachment>;

    /// Read back a stored attachment. Only meaningful for backends that serve
    /// their own downloads; bucket backends answer NotFound.
    async fn retrieve(&self, path: &str) -> Result<Vec<u8>>;

    /// Object key for an uploaded image. `side` is the document face label
    /// ("ine-frente" / "ine-reverso").
    fn object_path(&self, folder: &str, side: &str, filename: &str) -> String {
        let safe = match sanitize(filename) {
            s if s.is_empty() => "archivo".to_string(),
            s => s,
        };
        format!("{folder}/{side}-{safe}")
    }

    /// Extra folder-name suffix, for backends that need collision resistance
    /// beyond the timestamped folder name.
    fn folder_suffix(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// S3-compatible bucket storage
// ============================================================================

/// Bucket storage backend. Works against AWS S3 or any S3-compatible endpoint
/// (MinIO, R2) via `endpoint_url`.
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<Url>,
    signed_url_ttl: Duration,
}

impl S3ObjectStorage {
    pub async fn new(bucket: String, endpoint_url: Option<Url>, public_base_url: Option<Url>, signed_url_ttl_secs: u64) -> Self {
        let base = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(endpoint) = &endpoint_url {
            // Custom endpoints (MinIO etc.) need path-style addressing
            builder = builder.endpoint_url(endpoint.as_str()).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        Self {
            client,
            bucket,
            public_base_url,
            signed_url_ttl: Duration::from_secs(signed_url_ttl_secs),
        }
    }

    async fn url_for(&self, path: &str) -> Result<String> {
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{}/{}", base.as_str().trim_end_matches('/'), path));
        }

        let presigning = aws_sdk_s3::presigning::PresigningConfig::expires_in(self.signed_url_ttl).map_err(|e| {
            tracing::error!("Invalid presigning TTL: {e}");
            Error::Storage {
                message: "Error generando URL firmada".to_string(),
            }
        })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| {
                tracing::error!("Presigned URL generation failed for {path}: {e}");
                Error::Storage {
                    message: "Error generando URL firmada".to_string(),
                }
            })?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl BlobStorage for S3ObjectStorage {
    async fn store(&self, path: &str, content_type: &str, content: Bytes) -> Result<StoredAttachment> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(content))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Bucket upload failed for {path}: {e}");
                Error::Storage {
                    message: "Error subiendo archivo a Storage".to_string(),
                }
            })?;

        let url = self.url_for(path).await?;
        let object_name = path.rsplit('/').next().unwrap_or(path).to_string();

        Ok(StoredAttachment {
            path: path.to_string(),
            object_name,
            url,
        })
    }

    async fn retrieve(&self, path: &str) -> Result<Vec<u8>> {
        // Bucket objects are served by the bucket itself, not this service
        Err(Error::NotFound {
            resource: format!("object {path}"),
        })
    }
}

// ============================================================================
// Local disk storage
// ============================================================================

/// Local filesystem storage backend. Attachments are written under `root` and
/// served back through the token-gated `/admin/download` endpoint.
pub struct LocalDiskStorage {
    root: PathBuf,
    canon_root: PathBuf,
    public_base_url: Url,
    admin_token: String,
}

impl LocalDiskStorage {
    pub async fn new(root: PathBuf, public_base_url: Url, admin_token: String) -> Result<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to create storage directory {root:?}: {e}")))?;
        let canon_root = fs::canonicalize(&root)
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to resolve storage directory {root:?}: {e}")))?;

        Ok(Self {
            root,
            canon_root,
            public_base_url,
            admin_token,
        })
    }

    /// Reject keys that could address files outside the storage root.
    fn validate_relative(path: &str) -> Result<&Path> {
        let rel = Path::new(path);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            && !path.is_empty();
        if safe { Ok(rel) } else { Err(Error::InvalidPath) }
    }

    fn download_url(&self, path: &str) -> Result<String> {
        let mut url = self
            .public_base_url
            .join("admin/download")
            .map_err(|e| Error::Other(anyhow::anyhow!("Invalid public base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("file", path)
            .append_pair("token", &self.admin_token);
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStorage for LocalDiskStorage {
    async fn store(&self, path: &str, _content_type: &str, content: Bytes) -> Result<StoredAttachment> {
        let rel = Self::validate_relative(path)?;
        let full_path = self.root.join(rel);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                tracing::error!("Failed to create attachment directory {parent:?}: {e}");
                Error::Storage {
                    message: "Error subiendo archivo a Storage".to_string(),
                }
            })?;
        }

        fs::write(&full_path, &content).await.map_err(|e| {
            tracing::error!("Failed to write attachment {full_path:?}: {e}");
            Error::Storage {
                message: "Error subiendo archivo a Storage".to_string(),
            }
        })?;

        let object_name = path.rsplit('/').next().unwrap_or(path).to_string();

        Ok(StoredAttachment {
            path: path.to_string(),
            object_name,
            url: self.download_url(path)?,
        })
    }

    async fn retrieve(&self, path: &str) -> Result<Vec<u8>> {
        let rel = Self::validate_relative(path)?;
        let full_path = self.root.join(rel);

        // Canonicalize and re-check containment in case of symlinks
        let canonical = fs::canonicalize(&full_path).await.map_err(|_| Error::NotFound {
            resource: format!("file {path}"),
        })?;
        if !canonical.starts_with(&self.canon_root) {
            return Err(Error::InvalidPath);
        }

        fs::read(&canonical).await.map_err(|_| Error::NotFound {
            resource: format!("file {path}"),
        })
    }

    fn object_path(&self, folder: &str, side: &str, filename: &str) -> String {
        let safe = match sanitize(filename) {
            s if s.is_empty() => "archivo".to_string(),
            s => s,
        };
        // Millisecond prefix keeps re-submitted filenames from colliding on disk
        format!("{folder}/{side}-{}-{safe}", chrono::Utc::now().timestamp_millis())
    }

    fn folder_suffix(&self) -> Option<String> {
        Some(uuid::Uuid::new_v4().simple().to_string()[..8].to_string())
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create an attachment storage backend based on configuration
pub async fn create_blob_storage(config: &Config) -> Result<Arc<dyn BlobStorage>> {
    match &config.storage {
        StorageConfig::Bucket {
            bucket,
            endpoint_url,
            public_base_url,
            signed_url_ttl_secs,
        } => {
            tracing::info!("Creating bucket storage backend (bucket: {bucket})");
            let storage = S3ObjectStorage::new(
                bucket.clone(),
                endpoint_url.clone(),
                public_base_url.clone(),
                *signed_url_ttl_secs,
            )
            .await;
            Ok(Arc::new(storage))
        }
        StorageConfig::Disk { root, public_base_url } => {
            tracing::info!("Creating local disk storage backend (root: {root:?})");
            let admin_token = config
                .admin_token
                .clone()
                .ok_or(Error::ConfigurationMissing { what: "ADMIN_TOKEN" })?;
            let storage = LocalDiskStorage::new(root.clone(), public_base_url.clone(), admin_token).await?;
            Ok(Arc::new(storage))
        }
    }
}
