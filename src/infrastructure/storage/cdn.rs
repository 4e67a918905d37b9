use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use crate::{
    errors::StorageError,
    settings::{StorageBackendKind, StorageSettings},
};

use super::{strip_public, validate_key, ReferenceStyle, StorageAdapter};

/// Hosted media service speaking the Supabase Storage REST API.
///
/// Products store the full public URL of each upload, so references made
/// against this backend are passed through untouched by the resolver.
pub struct CdnStorage {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: Zeroizing<String>,
}

impl CdnStorage {
    pub fn new(
        base_url: &str,
        bucket: &str,
        service_key: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| StorageError::Rejected(format!("invalid cdn url {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StorageError::Rejected(format!("cdn url must be http(s): {base_url}")));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Rejected(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: Zeroizing::new(service_key.to_string()),
        })
    }

    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let base_url = settings
            .cdn_url
            .as_deref()
            .ok_or_else(|| StorageError::Rejected("storage.cdn_url is not set".into()))?;

        Self::new(base_url, &settings.cdn_bucket, &settings.cdn_service_key, settings.timeout())
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}", self.base_url, self.bucket)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(self.service_key.as_str())
            .header("apikey", self.service_key.as_str())
    }
}

impl fmt::Debug for CdnStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdnStorage")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl StorageAdapter for CdnStorage {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::Cdn
    }

    fn reference_style(&self) -> ReferenceStyle {
        ReferenceStyle::PublicUrl
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix(), urlencoding::encode(key))
    }

    fn key_from_locator(&self, locator: &str) -> Option<String> {
        strip_public(&self.public_prefix(), locator)
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        validate_key(key)?;

        let response = self
            .authorized(self.client.post(self.object_url(key)))
            .header("x-upsert", "false")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            debug!(key, size = bytes.len(), "Variant uploaded to cdn");
            return Ok(self.public_url(key));
        }

        Err(status_error(key, response).await)
    }

    async fn locate(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;

        let url = self.public_url(key);
        let response = self.client.head(&url).send().await.map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(url);
        }

        Err(status_error(key, response).await)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.client.delete(url))
            .json(&serde_json::json!({ "prefixes": [key] }))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        match status_error(key, response).await {
            StorageError::NotFound(_) => Ok(()),
            e => Err(e),
        }
    }

    async fn check(&self) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/bucket/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(status_error(&self.bucket, response).await)
    }
}

fn transport_error(err: reqwest::Error) -> StorageError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        StorageError::Transient(err.to_string())
    } else {
        StorageError::Rejected(err.to_string())
    }
}

async fn status_error(key: &str, response: Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(key, status, &body)
}

/// The storage API reports some conflicts and misses as 400 with a JSON body.
fn classify_status(key: &str, status: StatusCode, body: &str) -> StorageError {
    let lower = body.to_lowercase();

    if status == StatusCode::CONFLICT || lower.contains("duplicate") || lower.contains("already exists") {
        return StorageError::Conflict(key.to_string());
    }
    if status == StatusCode::NOT_FOUND || lower.contains("not found") {
        return StorageError::NotFound(key.to_string());
    }
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        return StorageError::Transient(format!("{status}: {body}"));
    }

    StorageError::Rejected(format!("{status}: {body}"))
}
