use std::{collections::HashSet, sync::Arc};

use futures::future::{join_all, try_join_all};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::image::{DiscardReport, EncodedVariant, ProductImages, Resolution, ResolvedImage, Upload},
    errors::{MediaError, StorageError, UploadRejection},
    settings::MediaSettings,
    storage::{ReferenceStyle, RetryPolicy, StorageAdapter},
};

use super::{
    references::{self, ImageRef},
    validate::validate_upload,
    variants::derive_variants,
};

/// Turns uploaded files into stored variants and back into locators.
pub struct MediaPipeline {
    storage: Arc<dyn StorageAdapter>,
    retry: RetryPolicy,
    settings: MediaSettings,
}

/// Variants of one source image, keyed by a fresh id.
struct PreparedImage {
    id: Uuid,
    variants: Vec<EncodedVariant>,
}

impl MediaPipeline {
    pub fn new(storage: Arc<dyn StorageAdapter>, settings: MediaSettings, retry: RetryPolicy) -> Self {
        Self { storage, retry, settings }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn settings(&self) -> &MediaSettings {
        &self.settings
    }

    /// Validates, renders and stores every upload.
    ///
    /// The first upload becomes the primary reference. References are only
    /// returned once every variant of every upload is written; on any failure
    /// nothing from the batch remains in storage.
    #[instrument(skip(self, uploads), fields(files = uploads.len()))]
    pub async fn ingest(&self, uploads: Vec<Upload>) -> Result<ProductImages, MediaError> {
        if uploads.is_empty() {
            return Err(UploadRejection::NoFiles.into());
        }
        if uploads.len() > self.settings.max_files_per_product {
            return Err(UploadRejection::TooManyFiles {
                count: uploads.len(),
                limit: self.settings.max_files_per_product,
            }
            .into());
        }

        let decoded = uploads
            .iter()
            .map(|upload| validate_upload(upload, self.settings.max_upload_bytes))
            .collect::<Result<Vec<_>, _>>()?;
        drop(uploads);

        let quality = self.settings.jpeg_quality;
        let rendered = try_join_all(
            decoded.into_iter().map(|d| derive_variants(d.image, quality)),
        )
        .await?;

        let prepared: Vec<PreparedImage> = rendered
            .into_iter()
            .map(|variants| PreparedImage { id: Uuid::new_v4(), variants })
            .collect();

        let references = self.write_all(&prepared).await?;

        let mut references = references.into_iter();
        let images = ProductImages {
            primary: references.next().unwrap_or_default(),
            additional: references.collect(),
        };

        info!(
            primary = %images.primary,
            additional = images.additional.len(),
            "Images ingested"
        );
        Ok(images)
    }

    /// Writes every variant, returning one reference per image in input order.
    async fn write_all(&self, prepared: &[PreparedImage]) -> Result<Vec<String>, MediaError> {
        let writes = prepared.iter().flat_map(move |image| {
            image.variants.iter().map(move |variant| {
                let key = references::variant_key(&image.id, variant.resolution);
                async move {
                    let mut attempts = 0u32;
                    let result = self
                        .retry
                        .run("put", &key, || {
                            attempts += 1;
                            self.put_variant(&key, variant, attempts > 1)
                        })
                        .await;
                    (key, variant.resolution, result)
                }
            })
        });

        // Wait for every write, even after a failure, so the rollback sees them all.
        let outcomes = join_all(writes).await;

        let mut locators = Vec::new();
        let mut written = Vec::new();
        let mut failure: Option<StorageError> = None;

        for (key, resolution, result) in outcomes {
            match result {
                Ok(locator) => {
                    if resolution == Resolution::Large {
                        locators.push((key.clone(), locator));
                    }
                    written.push(key);
                }
                // Someone else's blob; it must survive the rollback.
                Err(e @ StorageError::Conflict(_)) => {
                    warn!(key = %key, error = %e, "Variant key already taken");
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Variant write failed");
                    written.push(key);
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(err) = failure {
            self.rollback(written).await;
            return Err(MediaError::StorageWrite(err));
        }

        // `join_all` preserves input order, so `locators` follows `prepared`
        let references = locators
            .into_iter()
            .map(|(key, locator)| match self.storage.reference_style() {
                ReferenceStyle::BareKey => key,
                ReferenceStyle::PublicUrl => locator,
            })
            .collect();

        Ok(references)
    }

    /// One `put` attempt. Keys are fresh ids, so a conflict on a retry means an
    /// earlier attempt landed even though its response was lost.
    async fn put_variant(
        &self,
        key: &str,
        variant: &EncodedVariant,
        retried: bool,
    ) -> Result<String, StorageError> {
        match self.storage.put(key, &variant.bytes, variant.content_type).await {
            Err(StorageError::Conflict(_)) if retried => {
                debug!(key, "Variant stored by an earlier attempt");
                self.storage.locate(key).await
            }
            other => other,
        }
    }

    /// Removes the keys a failed batch wrote, or may have partially written.
    async fn rollback(&self, keys: Vec<String>) {
        let report = self.remove_keys(keys).await;
        if !report.is_clean() {
            warn!(orphaned = ?report.failed, "Rollback left variants behind");
        }
    }

    /// Locator for `reference` at `resolution`. Pure string work.
    ///
    /// Empty references yield the placeholder; URLs and root-relative paths are
    /// returned unchanged.
    pub fn resolve(&self, reference: &str, resolution: Resolution) -> String {
        let reference = reference.trim();

        if reference.is_empty() {
            return self.settings.placeholder.clone();
        }
        if references::is_locator(reference) {
            return reference.to_string();
        }

        match ImageRef::parse(reference) {
            Some(image) => self.storage.public_url(&image.variant_key(resolution)),
            None => self.storage.public_url(reference),
        }
    }

    pub fn resolve_all(&self, reference: &str) -> ResolvedImage {
        ResolvedImage {
            reference: reference.to_string(),
            large: self.resolve(reference, Resolution::Large),
            medium: self.resolve(reference, Resolution::Medium),
            thumbnail: self.resolve(reference, Resolution::Thumbnail),
        }
    }

    /// Storage keys owned by `reference`. Locators not produced by the
    /// current backend own nothing.
    pub fn keys_for_reference(&self, reference: &str) -> Vec<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Vec::new();
        }

        let key = if references::is_locator(reference) {
            match self.storage.key_from_locator(reference) {
                Some(key) => key,
                None => {
                    warn!(reference, "Reference is not managed by this storage backend, skipping");
                    return Vec::new();
                }
            }
        } else {
            reference.to_string()
        };

        references::keys_for_key(&key)
    }

    /// Deletes every variant behind `images`. Failures are logged, never returned.
    #[instrument(skip(self, images), fields(references = images.iter().count()))]
    pub async fn discard(&self, images: &ProductImages) -> DiscardReport {
        let mut seen = HashSet::new();
        let keys: Vec<String> = images
            .iter()
            .flat_map(|reference| self.keys_for_reference(reference))
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let report = self.remove_keys(keys).await;

        if report.is_clean() {
            info!(removed = report.removed.len(), "Images discarded");
        } else {
            warn!(
                removed = report.removed.len(),
                failed = ?report.failed,
                "Some image variants could not be deleted"
            );
        }
        report
    }

    async fn remove_keys(&self, keys: Vec<String>) -> DiscardReport {
        let removals = keys.into_iter().map(|key| async move {
            let result = self
                .retry
                .run("remove", &key, || self.storage.remove(&key))
                .await;
            (key, result)
        });

        let mut report = DiscardReport::default();
        for (key, result) in join_all(removals).await {
            match result {
                Ok(()) | Err(StorageError::NotFound(_)) => report.removed.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to delete image variant");
                    report.failed.push(key);
                }
            }
        }
        report
    }
}
