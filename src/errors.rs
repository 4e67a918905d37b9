use std::borrow::Cow;
use std::fmt;

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse
};
use derive_more::Display;
use serde::Serialize;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    ValidationError(Vec<FieldError>),
    InvalidInput(String),
    PayloadTooLarge(String),
    UnprocessableImage(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(errors) => {
                let messages = errors.iter()
                    .map(|e| format!("{}:{}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "validation error: {}", messages)
            }
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::UnprocessableImage(msg) => write!(f, "Unprocessable image: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal server error: {}", msg)
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::ValidationError(errors) => {
                serde_json::json!({
                    "error": "Validation failed",
                    "details": errors
                })
            }
            AppError::ServiceUnavailable(_) => {
                serde_json::json!({"error": self.to_string(), "retryable": true})
            }
            _ => {
                serde_json::json!({"error": self.to_string()})
            }
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnprocessableImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(|e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                })
            })
            .collect();

        AppError::ValidationError(field_errors)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23505")) => {
                AppError::Conflict("A product with this slug already exists".into())
            }
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23503")) => {
                AppError::Conflict("Referenced category does not exist".into())
            }
            _ => AppError::InternalError(format!("Database error: {}", err))
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Validation(UploadRejection::TooLarge { .. }) => {
                AppError::PayloadTooLarge(err.to_string())
            }
            MediaError::Validation(_) => AppError::InvalidInput(err.to_string()),
            MediaError::Transform(_) => AppError::UnprocessableImage(err.to_string()),
            MediaError::StorageWrite(ref e) if e.is_transient() => {
                AppError::ServiceUnavailable(err.to_string())
            }
            MediaError::StorageWrite(_) => AppError::InternalError(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

// ───── Image pipeline errors ────────────────────────────────────────

/// Failure of an `ingest` call. Nothing from the batch is left in storage.
#[derive(Debug, Display)]
pub enum MediaError {
    #[display("Upload rejected: {_0}")]
    Validation(UploadRejection),

    #[display("Image transform failed: {_0}")]
    Transform(String),

    #[display("Storage write failed: {_0}")]
    StorageWrite(StorageError),
}

impl std::error::Error for MediaError {}

impl MediaError {
    /// True when the same request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MediaError::StorageWrite(e) if e.is_transient())
    }

    /// True when the caller's input was at fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, MediaError::Validation(_) | MediaError::Transform(_))
    }
}

impl From<UploadRejection> for MediaError {
    fn from(err: UploadRejection) -> Self {
        MediaError::Validation(err)
    }
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum UploadRejection {
    #[display("no image was provided")]
    NoFiles,

    #[display("too many images: {count} (max {limit})")]
    TooManyFiles { count: usize, limit: usize },

    #[display("file {file} is empty")]
    EmptyPayload { file: String },

    #[display("file {file} is {size} bytes, limit is {limit}")]
    TooLarge { file: String, size: usize, limit: usize },

    #[display("file {file} has unsupported format ({detected})")]
    UnsupportedFormat { file: String, detected: String },

    #[display("file {file} is not a valid image: {reason}")]
    Corrupt { file: String, reason: String },
}

impl std::error::Error for UploadRejection {}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[display("key already exists: {_0}")]
    Conflict(String),

    #[display("key not found: {_0}")]
    NotFound(String),

    #[display("transient backend failure: {_0}")]
    Transient(String),

    #[display("backend rejected request: {_0}")]
    Rejected(String),
}

impl std::error::Error for StorageError {}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            ErrorKind::AlreadyExists => StorageError::Conflict(err.to_string()),
            ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::Unsupported => {
                StorageError::Rejected(err.to_string())
            }
            _ => StorageError::Transient(err.to_string()),
        }
    }
}
