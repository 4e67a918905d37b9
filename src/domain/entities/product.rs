use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use actix_multipart::form::{json::Json as MpJson, tempfile::TempFile, MultipartForm};

use crate::entities::image::{ProductImages, ResolvedImage};

// ───── Constants ──────────────────────────────────────────────────────
const MIN_NAME_LENGTH: u64 = 1;
const MAX_NAME_LENGTH: u64 = 200;
const MIN_SLUG_LENGTH: u64 = 2;
const MAX_SLUG_LENGTH: u64 = 120;
const MAX_DESCRIPTION_LENGTH: u64 = 5000;

// ───── Database Models ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn images(&self) -> ProductImages {
        ProductImages {
            primary: self.image_url.clone().unwrap_or_default(),
            additional: self.additional_images.clone(),
        }
    }
}

/// Column values written by both insert and update.
#[derive(Debug, Clone)]
pub struct ProductWrite {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub stock: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

// ───── API Response Models ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub image: Option<ResolvedImage>,
    pub gallery: Vec<ResolvedImage>,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

// ───── Input & Validation Requests ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProductRequest {
    #[validate(length(min = MIN_NAME_LENGTH, max = MAX_NAME_LENGTH, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(
        length(min = MIN_SLUG_LENGTH, max = MAX_SLUG_LENGTH),
        custom(function = "validate_slug")
    )]
    pub slug: Option<String>,

    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,

    #[validate(range(min = 0.0, message = "Compare-at price cannot be negative"))]
    pub compare_at_price: Option<f64>,

    pub category_id: Option<Uuid>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(nested)]
    #[serde(flatten)]
    pub product: NewProductRequest,

    /// Existing additional references to keep, in display order. `None` keeps all of them.
    pub additional_images: Option<Vec<String>>,
}

fn default_active() -> bool {
    true
}

/// `POST /products` body: JSON metadata plus the image files.
#[derive(Debug, MultipartForm)]
pub struct ProductUpload {
    #[multipart(rename = "metadata")]
    pub metadata: MpJson<NewProductRequest>,

    #[multipart(rename = "image")]
    pub image: Option<TempFile>,

    #[multipart(rename = "images")]
    pub images: Vec<TempFile>,
}

/// `PUT /products/{id}` body; every file part is optional.
#[derive(Debug, MultipartForm)]
pub struct ProductUpdateUpload {
    #[multipart(rename = "metadata")]
    pub metadata: MpJson<UpdateProductRequest>,

    #[multipart(rename = "image")]
    pub image: Option<TempFile>,

    #[multipart(rename = "images")]
    pub images: Vec<TempFile>,
}

// ───── Helper Functions ─────────────────────────────────────────────

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let well_formed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');

    if !well_formed {
        let mut err = ValidationError::new("invalid_slug");
        err.message = Some("Slug may only contain lowercase letters, digits and inner hyphens".into());
        return Err(err);
    }
    Ok(())
}

// ───── Write Preparation Logic ─────────────────────────────────────

impl NewProductRequest {
    /// Slug to store: the given one, or one derived from the name.
    pub fn effective_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => slug::slugify(&self.name),
        }
    }

    pub fn prepare_write(&self, images: &ProductImages) -> ProductWrite {
        ProductWrite {
            name: self.name.trim().to_string(),
            slug: self.effective_slug(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            price: self.price,
            compare_at_price: self.compare_at_price,
            category_id: self.category_id,
            image_url: Some(images.primary.clone()).filter(|p| !p.is_empty()),
            additional_images: images.additional.clone(),
            stock: self.stock,
            is_active: self.is_active,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, slug: Option<&str>) -> NewProductRequest {
        NewProductRequest {
            name: name.into(),
            slug: slug.map(Into::into),
            description: None,
            price: 10.0,
            compare_at_price: None,
            category_id: None,
            stock: 1,
            is_active: true,
        }
    }

    #[test]
    fn slug_is_derived_from_name_when_missing() {
        assert_eq!(request("Gold Hoop Earrings", None).effective_slug(), "gold-hoop-earrings");
        assert_eq!(request("Gold Hoop Earrings", Some("  ")).effective_slug(), "gold-hoop-earrings");
        assert_eq!(request("Ring", Some("silver-ring")).effective_slug(), "silver-ring");
    }

    #[test]
    fn malformed_slug_fails_validation() {
        assert!(request("Ring", Some("Silver Ring")).validate().is_err());
        assert!(request("Ring", Some("-ring")).validate().is_err());
        assert!(request("Ring", Some("silver-ring-2")).validate().is_ok());
    }

    #[test]
    fn negative_price_fails_validation() {
        let mut req = request("Ring", None);
        req.price = -1.0;
        assert!(req.validate().is_err());
    }
}
