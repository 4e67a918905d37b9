use std::{fmt, sync::Arc};

use async_trait::async_trait;
use object_store::{
    aws::AmazonS3Builder, path::Path as ObjectPath, Attribute, Attributes, ObjectStore, PutMode,
    PutOptions, PutPayload,
};
use tracing::debug;

use crate::{
    errors::StorageError,
    settings::{StorageBackendKind, StorageSettings},
};

use super::{join_public, strip_public, validate_key, StorageAdapter};

/// Generic object storage (S3 and compatibles) through the `object_store` crate.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: &str) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// S3 client configured from `storage.object_*`, with credentials from the usual `AWS_*` variables.
    pub fn s3(settings: &StorageSettings) -> Result<Self, StorageError> {
        let bucket = settings
            .object_bucket
            .as_deref()
            .ok_or_else(|| StorageError::Rejected("storage.object_bucket is not set".into()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &settings.object_region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.object_endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Rejected(format!("failed to configure object storage: {e}")))?;

        Ok(Self::new(Arc::new(store), &settings.public_base_url))
    }

    fn path_for(&self, key: &str) -> Result<ObjectPath, StorageError> {
        validate_key(key)?;
        Ok(ObjectPath::from(key))
    }
}

impl fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

#[async_trait]
impl StorageAdapter for ObjectStorage {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::Object
    }

    fn public_url(&self, key: &str) -> String {
        join_public(&self.public_base_url, key)
    }

    fn key_from_locator(&self, locator: &str) -> Option<String> {
        strip_public(&self.public_base_url, locator)
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let options = PutOptions {
            mode: PutMode::Create,
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(bytes.to_vec()), options)
            .await
            .map_err(|e| object_error(key, e))?;

        debug!(key, size = bytes.len(), "Variant written to object storage");
        Ok(self.public_url(key))
    }

    async fn locate(&self, key: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;

        self.store
            .head(&path)
            .await
            .map_err(|e| object_error(key, e))?;

        Ok(self.public_url(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(object_error(key, e)),
        }
    }

    async fn check(&self) -> Result<(), StorageError> {
        self.store
            .list_with_delimiter(None)
            .await
            .map(|_| ())
            .map_err(|e| object_error("<root>", e))
    }
}

fn object_error(key: &str, err: object_store::Error) -> StorageError {
    use object_store::Error;

    match err {
        Error::AlreadyExists { .. } | Error::Precondition { .. } => {
            StorageError::Conflict(key.to_string())
        }
        Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
        Error::PermissionDenied { .. }
        | Error::Unauthenticated { .. }
        | Error::InvalidPath { .. }
        | Error::NotSupported { .. }
        | Error::UnknownConfigurationKey { .. } => StorageError::Rejected(err.to_string()),
        _ => StorageError::Transient(err.to_string()),
    }
}
