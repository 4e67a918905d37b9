use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        image::{ProductImages, Upload},
        product::{NewProductRequest, Product, ProductListResponse, ProductResponse, UpdateProductRequest},
    },
    errors::AppError,
    media::MediaPipeline,
    repositories::product::ProductRepository,
    utils::valid_uuid::valid_uuid,
};

const MAX_PER_PAGE: u32 = 100;

pub struct ProductHandler<R>
where
    R: ProductRepository,
{
    pub product_repo: R,
    pub media: Arc<MediaPipeline>,
}

impl<R> ProductHandler<R>
where
    R: ProductRepository,
{
    pub fn new(product_repo: R, media: Arc<MediaPipeline>) -> Self {
        ProductHandler { product_repo, media }
    }

    /// Stores the uploaded images, then the product row pointing at them.
    ///
    /// `primary` is the main image; `additional` are gallery images in display order.
    pub async fn create_product(
        &self,
        request: NewProductRequest,
        primary: Option<Upload>,
        additional: Vec<Upload>,
    ) -> Result<ProductResponse, AppError> {
        request.validate()?;

        let uploads: Vec<Upload> = primary.into_iter().chain(additional).collect();
        let images = self.media.ingest(uploads).await?;

        let write = request.prepare_write(&images);
        let product = match self.product_repo.insert_product(&write).await {
            Ok(product) => product,
            Err(e) => {
                warn!(error = %e, "Product insert failed, discarding its new images");
                self.media.discard(&images).await;
                return Err(e);
            }
        };

        info!(product_id = %product.id, slug = %product.slug, "Product created");
        Ok(self.to_response(product))
    }

    /// Applies `request` and any new images.
    ///
    /// A new primary upload replaces the current main image. New additional
    /// uploads are appended after the kept references. Images no longer
    /// referenced are removed once the row is updated.
    pub async fn update_product(
        &self,
        id: &str,
        request: UpdateProductRequest,
        primary: Option<Upload>,
        additional: Vec<Upload>,
    ) -> Result<ProductResponse, AppError> {
        request.validate()?;
        let valid_id = valid_uuid(id)?;

        let existing = self.product_repo.get_product_by_id(&valid_id).await?;
        let previous = existing.images();

        if let Some(kept) = &request.additional_images {
            if let Some(unknown) = kept.iter().find(|r| !previous.additional.contains(r)) {
                return Err(AppError::InvalidInput(format!(
                    "additional image {unknown} does not belong to this product"
                )));
            }
        }

        let has_new_primary = primary.is_some();
        let uploads: Vec<Upload> = primary.into_iter().chain(additional).collect();
        let fresh = if uploads.is_empty() {
            ProductImages::default()
        } else {
            self.media.ingest(uploads).await?
        };

        let mut fresh_refs = fresh.iter().cloned();
        let primary_ref = if has_new_primary {
            fresh_refs.next().unwrap_or_default()
        } else {
            previous.primary.clone()
        };

        let mut additional_refs = request
            .additional_images
            .clone()
            .unwrap_or_else(|| previous.additional.clone());
        additional_refs.extend(fresh_refs);

        let next = ProductImages {
            primary: primary_ref,
            additional: additional_refs,
        };

        let limit = self.media.settings().max_files_per_product;
        if next.iter().count() > limit {
            self.media.discard(&fresh).await;
            return Err(AppError::InvalidInput(format!(
                "a product can hold at most {limit} images"
            )));
        }

        let write = request.product.prepare_write(&next);
        let product = match self.product_repo.update_product(&valid_id, &write).await {
            Ok(product) => product,
            Err(e) => {
                if !fresh.is_empty() {
                    warn!(product_id = %valid_id, error = %e, "Product update failed, discarding its new images");
                    self.media.discard(&fresh).await;
                }
                return Err(e);
            }
        };

        let superseded = previous.superseded_by(&next);
        if !superseded.is_empty() {
            self.media.discard(&superseded).await;
        }

        info!(product_id = %product.id, "Product updated");
        Ok(self.to_response(product))
    }

    /// Deletes the row first, then its images.
    pub async fn delete_product(&self, id: &str) -> Result<(), AppError> {
        let valid_id = valid_uuid(id)?;

        let deleted = self.product_repo.delete_product(&valid_id).await?;
        let report = self.media.discard(&deleted.images()).await;

        info!(
            product_id = %deleted.id,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Product deleted"
        );
        Ok(())
    }

    /// Looks a product up by id, falling back to its slug.
    pub async fn get_product(&self, id_or_slug: &str) -> Result<ProductResponse, AppError> {
        let product = match Uuid::parse_str(id_or_slug) {
            Ok(id) => self.product_repo.get_product_by_id(&id).await?,
            Err(_) => self.product_repo.get_product_by_slug(id_or_slug).await?,
        };

        Ok(self.to_response(product))
    }

    pub async fn list_products(
        &self,
        include_inactive: bool,
        page: u32,
        per_page: u32,
    ) -> Result<ProductListResponse, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let active_only = !include_inactive;

        let products = self.product_repo.list_products(active_only, page, per_page).await?;
        let total = self.product_repo.count_products(active_only).await?;

        Ok(ProductListResponse {
            products: products.into_iter().map(|p| self.to_response(p)).collect(),
            page,
            per_page,
            total,
        })
    }

    fn to_response(&self, product: Product) -> ProductResponse {
        let image = product
            .image_url
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(|r| self.media.resolve_all(r));
        let gallery = product
            .additional_images
            .iter()
            .map(|r| self.media.resolve_all(r))
            .collect();

        ProductResponse {
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price,
            compare_at_price: product.compare_at_price,
            category_id: product.category_id,
            image_url: product.image_url,
            additional_images: product.additional_images,
            image,
            gallery,
            stock: product.stock,
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}
