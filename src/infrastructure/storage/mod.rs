use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    errors::StorageError,
    settings::{StorageBackendKind, StorageSettings},
};

pub mod cdn;
pub mod local;
pub mod object;
pub mod retry;

pub use cdn::CdnStorage;
pub use local::LocalFsStorage;
pub use object::ObjectStorage;
pub use retry::RetryPolicy;

/// What the pipeline persists on a product for a stored variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStyle {
    /// The storage key itself, e.g. `5f0c…_1080.jpg`.
    BareKey,
    /// The public URL the backend returned for the key.
    PublicUrl,
}

/// A durable blob store for image variants.
///
/// Implementations must tolerate concurrent calls for distinct keys. `put` never
/// overwrites: an existing key is reported as [`StorageError::Conflict`]. `remove`
/// treats an absent key as success.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn kind(&self) -> StorageBackendKind;

    fn reference_style(&self) -> ReferenceStyle {
        ReferenceStyle::BareKey
    }

    /// Publicly resolvable locator for `key`. Performs no I/O.
    fn public_url(&self, key: &str) -> String;

    /// Recovers the storage key from a locator this backend produced.
    fn key_from_locator(&self, locator: &str) -> Option<String>;

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    async fn locate(&self, key: &str) -> Result<String, StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn check(&self) -> Result<(), StorageError>;
}

/// Builds the adapter selected by `storage.backend`.
pub async fn build_storage(settings: &StorageSettings) -> Result<Arc<dyn StorageAdapter>, StorageError> {
    let storage: Arc<dyn StorageAdapter> = match settings.backend {
        StorageBackendKind::Local => Arc::new(
            LocalFsStorage::new(&settings.local_root, &settings.public_base_url).await?,
        ),
        StorageBackendKind::Cdn => Arc::new(CdnStorage::from_settings(settings)?),
        StorageBackendKind::Object => Arc::new(ObjectStorage::s3(settings)?),
    };

    info!(backend = %storage.kind(), "Image storage backend ready");
    Ok(storage)
}

/// Rejects keys that could escape the storage namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.chars().any(char::is_control);

    if bad {
        return Err(StorageError::Rejected(format!("invalid storage key: {key:?}")));
    }
    Ok(())
}

/// `{base}/{key}` with exactly one slash in between.
pub(crate) fn join_public(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Inverse of [`join_public`].
pub(crate) fn strip_public(base: &str, locator: &str) -> Option<String> {
    let prefix = format!("{}/", base.trim_end_matches('/'));
    let key = locator.strip_prefix(&prefix)?;
    let key = key.split(['?', '#']).next().unwrap_or_default();
    let key = urlencoding::decode(key).ok()?.into_owned();

    validate_key(&key).ok().map(|_| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_separators_are_rejected() {
        assert!(validate_key("abc_400.jpg").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("nested/key.jpg").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn public_locator_round_trips_to_key() {
        let url = join_public("/images/", "abc_48.jpg");
        assert_eq!(url, "/images/abc_48.jpg");
        assert_eq!(strip_public("/images", &url).as_deref(), Some("abc_48.jpg"));
        assert_eq!(strip_public("/images", "/other/abc_48.jpg"), None);
        assert_eq!(
            strip_public("https://cdn.example.com/p", "https://cdn.example.com/p/abc.jpg?v=2").as_deref(),
            Some("abc.jpg")
        );
    }
}
