use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PLACEHOLDER};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

/// Which blob store the image pipeline writes to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Local,
    Cdn,
    Object,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub media: MediaSettings,
}

#[derive(Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// Directory variants are written to by the local backend.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Prefix used to build public locators for bare keys (local and object backends).
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default)]
    pub cdn_url: Option<String>,

    #[serde(default = "default_bucket")]
    pub cdn_bucket: String,

    #[serde(default)]
    pub cdn_service_key: String,

    #[serde(default)]
    pub object_bucket: Option<String>,

    #[serde(default)]
    pub object_region: Option<String>,

    #[serde(default)]
    pub object_endpoint: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaSettings {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_max_files")]
    pub max_files_per_product: usize,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "Storefront-API".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_db_max_connections() -> u32 {
    20
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_backend() -> StorageBackendKind {
    StorageBackendKind::Local
}
fn default_local_root() -> PathBuf {
    PathBuf::from("public/images")
}
fn default_public_base_url() -> String {
    "/images".to_string()
}
fn default_bucket() -> String {
    "product-images".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}
fn default_max_files() -> usize {
    10
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}
fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_root: default_local_root(),
            public_base_url: default_public_base_url(),
            cdn_url: None,
            cdn_bucket: default_bucket(),
            cdn_service_key: String::new(),
            object_bucket: None,
            object_region: None,
            object_endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_files_per_product: default_max_files(),
            jpeg_quality: default_jpeg_quality(),
            placeholder: default_placeholder(),
        }
    }
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        // APP_STORAGE__BACKEND=cdn style keys reach the nested tables
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins")
                    .try_parsing(true)
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.database_url = fill_or_env(config.database_url, "DATABASE_URL")?;

        if config.storage.cdn_service_key.trim().is_empty() {
            if let Ok(key) = env::var("SUPABASE_SERVICE_ROLE_KEY") {
                config.storage.cdn_service_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.database_url.trim().is_empty() {
            errors.push("DATABASE_URL cannot be empty");
        }
        if self.is_production() && self.cors_origins().iter().any(|o| o == "*") {
            errors.push("Wildcard CORS (*) is not allowed in production");
        }
        if !(1..=100).contains(&self.media.jpeg_quality) {
            errors.push("media.jpeg_quality must be between 1 and 100");
        }
        if self.media.max_upload_bytes == 0 {
            errors.push("media.max_upload_bytes must be greater than zero");
        }
        if self.media.max_files_per_product == 0 {
            errors.push("media.max_files_per_product must be greater than zero");
        }
        if self.storage.timeout_secs == 0 {
            errors.push("storage.timeout_secs must be greater than zero");
        }

        match self.storage.backend {
            StorageBackendKind::Local => {
                if self.storage.local_root.as_os_str().is_empty() {
                    errors.push("storage.local_root cannot be empty for the local backend");
                }
            }
            StorageBackendKind::Cdn => {
                if self.storage.cdn_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    errors.push("storage.cdn_url must be set for the cdn backend");
                }
                if self.storage.cdn_service_key.trim().is_empty() {
                    errors.push("storage.cdn_service_key must be set for the cdn backend");
                }
            }
            StorageBackendKind::Object => {
                if self.storage.object_bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
                    errors.push("storage.object_bucket must be set for the object backend");
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .iter()
            .flat_map(|origin| origin.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn fill_or_env(current: String, env_key: &str) -> Result<String, ConfigError> {
    if current.trim().is_empty() {
        env::var(env_key)
            .or_else(|_| env::var(format!("APP_{env_key}")))
            .map_err(|_| ConfigError::Message(format!("{env_key} must be set")))
    } else {
        Ok(current)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageBackendKind::Local => "local",
            StorageBackendKind::Cdn => "cdn",
            StorageBackendKind::Object => "object",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("database_url", &self.database_url.redact())
            .field("db_max_connections", &self.db_max_connections)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("storage", &self.storage)
            .field("media", &self.media)
            .finish()
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("backend", &self.backend)
            .field("local_root", &self.local_root)
            .field("public_base_url", &self.public_base_url)
            .field("cdn_url", &self.cdn_url)
            .field("cdn_bucket", &self.cdn_bucket)
            .field("cdn_service_key", &self.cdn_service_key.redact())
            .field("object_bucket", &self.object_bucket)
            .field("object_region", &self.object_region)
            .field("object_endpoint", &self.object_endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}
