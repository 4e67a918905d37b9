use std::{io::ErrorKind, path::{Path, PathBuf}};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::{errors::StorageError, settings::StorageBackendKind};

use super::{join_public, strip_public, validate_key, StorageAdapter};

/// Variants kept as plain files in one directory, served under `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalFsStorage {
    pub async fn new(root: impl AsRef<Path>, public_base_url: &str) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageAdapter for LocalFsStorage {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::Local
    }

    fn public_url(&self, key: &str) -> String {
        join_public(&self.public_base_url, key)
    }

    fn key_from_locator(&self, locator: &str) -> Option<String> {
        strip_public(&self.public_base_url, locator)
    }

    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        let staging = self.root.join(format!(".{key}.{}.part", Uuid::new_v4()));

        let staged = async {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&staging)
                .await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = staged {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        // The key only appears once its bytes are complete; hard_link never replaces.
        let linked = fs::hard_link(&staging, &path).await;
        let _ = fs::remove_file(&staging).await;

        linked.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::Conflict(key.to_string()),
            _ => StorageError::from(e),
        })?;

        debug!(key, size = bytes.len(), "Variant written to disk");
        Ok(self.public_url(key))
    }

    async fn locate(&self, key: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;

        match fs::try_exists(&path).await? {
            true => Ok(self.public_url(key)),
            false => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn check(&self) -> Result<(), StorageError> {
        let metadata = fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Rejected(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}
