//! Rewrites product mutation payloads so every image is a remote URL.

use futures::future::try_join_all;
use serde_json::{Map, Value};

use crate::models::{EntityType, MutationAction, MutationLogEntry};
use crate::{Error, Result};

use super::MediaUploader;

/// Object storage namespace for product images.
pub const PRODUCT_MEDIA_NAMESPACE: &str = "products";

const LOCAL_IMAGE_FIELD: &str = "localImage";
const IMAGE_FIELD: &str = "image";
const VARIANTS_FIELD: &str = "variants";

/// Uploads on-device product images referenced by a page of mutations.
///
/// The returned page has the same length and order as the input. Nothing is
/// written back to the mutation log.
#[derive(Debug, Clone)]
pub struct MediaUploadResolver<U> {
    uploader: U,
    namespace: String,
}

impl<U: MediaUploader> MediaUploadResolver<U> {
    pub fn new(uploader: U) -> Self {
        Self::with_namespace(uploader, PRODUCT_MEDIA_NAMESPACE)
    }

    pub fn with_namespace(uploader: U, namespace: impl Into<String>) -> Self {
        Self {
            uploader,
            namespace: namespace.into(),
        }
    }

    pub const fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Resolve local image references in a page of `entity` mutations.
    ///
    /// Only `products` pages are inspected. A failed primary image upload
    /// fails the whole page; a failed variant image is left as it was.
    pub async fn resolve_page(
        &self,
        entity: EntityType,
        page: Vec<MutationLogEntry>,
    ) -> Result<Vec<MutationLogEntry>> {
        if entity != EntityType::Products {
            return Ok(page);
        }

        try_join_all(page.into_iter().map(|entry| self.resolve_entry(entry))).await
    }

    async fn resolve_entry(&self, mut entry: MutationLogEntry) -> Result<MutationLogEntry> {
        let action = entry.action;
        let Some(document) = media_document(action, &mut entry.data) else {
            return Ok(entry);
        };

        if let Some(local_uri) = local_reference(document) {
            let url = self.upload_primary(&local_uri).await?;
            substitute(document, url);
        }

        if let Some(Value::Array(variants)) = document.get_mut(VARIANTS_FIELD) {
            for variant in variants.iter_mut().filter_map(Value::as_object_mut) {
                let Some(local_uri) = local_reference(variant) else {
                    continue;
                };
                match self.uploader.upload(&local_uri, &self.namespace).await {
                    Ok(Some(url)) => substitute(variant, url),
                    Ok(None) => {
                        tracing::warn!(
                            mutation_id = %entry.id,
                            %local_uri,
                            "Variant image upload returned no URL; leaving it unresolved"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            mutation_id = %entry.id,
                            %local_uri,
                            %error,
                            "Variant image upload failed; leaving it unresolved"
                        );
                    }
                }
            }
        }

        Ok(entry)
    }

    async fn upload_primary(&self, local_uri: &str) -> Result<String> {
        match self.uploader.upload(local_uri, &self.namespace).await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Err(Error::Upload {
                local_uri: local_uri.to_string(),
                reason: "no remote URL returned".to_string(),
            }),
            Err(error @ Error::Upload { .. }) => Err(error),
            Err(error) => Err(Error::Upload {
                local_uri: local_uri.to_string(),
                reason: error.to_string(),
            }),
        }
    }
}

/// The document whose image fields describe the product after this mutation.
///
/// INSERT payloads are the document itself. UPDATE payloads carry the patch
/// under `update`, optionally wrapped in `$set`.
fn media_document(action: MutationAction, data: &mut Value) -> Option<&mut Map<String, Value>> {
    match action {
        MutationAction::Insert => data.as_object_mut(),
        MutationAction::Update => {
            let update = data.get_mut("update")?;
            if update.get("$set").is_some_and(Value::is_object) {
                update.get_mut("$set")?.as_object_mut()
            } else {
                update.as_object_mut()
            }
        }
    }
}

/// A non-empty `localImage` whose `image` is still empty or absent.
fn local_reference(document: &Map<String, Value>) -> Option<String> {
    let local = document
        .get(LOCAL_IMAGE_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())?;

    let has_remote = match document.get(IMAGE_FIELD) {
        None | Some(Value::Null) => false,
        Some(Value::String(url)) => !url.trim().is_empty(),
        Some(_) => true,
    };

    (!has_remote).then(|| local.to_string())
}

fn substitute(document: &mut Map<String, Value>, url: String) {
    document.insert(IMAGE_FIELD.to_string(), Value::String(url));
    document.remove(LOCAL_IMAGE_FIELD);
}
