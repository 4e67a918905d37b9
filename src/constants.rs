use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

// ───── Image variants ───────────────────────────────────────────────
pub const VARIANT_EXTENSION: &str = "jpg";
pub const VARIANT_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Decoder guard against decompression bombs.
pub const MAX_SOURCE_DIMENSION: u32 = 16_384;

pub const DEFAULT_PLACEHOLDER: &str = "/placeholder.svg";
