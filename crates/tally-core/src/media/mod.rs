//! Product media upload.
//!
//! Mutation payloads may still point at on-device images. Before a page is
//! transmitted those references are uploaded to object storage and replaced
//! with public URLs.

mod resolver;

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::R2Storage;
use crate::{Error, Result};

pub use resolver::{MediaUploadResolver, PRODUCT_MEDIA_NAMESPACE};

/// Uploads a local file and returns its remote URL.
#[allow(async_fn_in_trait)]
pub trait MediaUploader {
    /// Upload `local_uri` under `namespace`.
    ///
    /// `Ok(None)` means the upload went through but no public URL exists for
    /// the object.
    async fn upload(&self, local_uri: &str, namespace: &str) -> Result<Option<String>>;
}

/// Uploads on-device files to Cloudflare R2.
#[derive(Debug, Clone)]
pub struct R2MediaUploader {
    storage: R2Storage,
    timeout: Duration,
}

impl R2MediaUploader {
    /// Fails when the storage has no public base URL to serve uploads from.
    pub fn new(storage: R2Storage, timeout: Duration) -> Result<Self> {
        if storage.config().public_base_url.is_none() {
            return Err(Error::InvalidInput(
                "R2_PUBLIC_BASE_URL must be set to upload product media".to_string(),
            ));
        }
        Ok(Self { storage, timeout })
    }

    pub const fn storage(&self) -> &R2Storage {
        &self.storage
    }
}

impl MediaUploader for R2MediaUploader {
    async fn upload(&self, local_uri: &str, namespace: &str) -> Result<Option<String>> {
        let path = local_path(local_uri)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file");
        let object_key = self.storage.build_media_key(namespace, file_name)?;
        let Some(public_url) = self.storage.public_object_url(&object_key) else {
            return Ok(None);
        };
        let content_type = mime_guess::from_path(&path).first_raw();

        let upload = async {
            let bytes = tokio::fs::read(&path).await?;
            let size = bytes.len();
            self.storage
                .upload_bytes(&object_key, bytes, content_type)
                .await?;
            Ok::<_, Error>(size)
        };

        let size = tokio::time::timeout(self.timeout, upload)
            .await
            .map_err(|_| Error::Upload {
                local_uri: local_uri.to_string(),
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            })??;

        tracing::debug!(local_uri, %object_key, size, "Uploaded media");
        Ok(Some(public_url))
    }
}

/// Filesystem path for a `file://` URI or a bare path.
fn local_path(local_uri: &str) -> Result<PathBuf> {
    let trimmed = local_uri.trim();
    let raw = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    if raw.is_empty() {
        return Err(Error::InvalidInput("Local media URI is empty".to_string()));
    }

    let decoded = urlencoding::decode(raw)
        .map_err(|error| Error::InvalidInput(format!("Invalid local media URI {local_uri}: {error}")))?;
    Ok(PathBuf::from(decoded.into_owned()))
}
