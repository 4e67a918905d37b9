use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use sqlx::{self, PgPool};

use crate::{
    entities::product::{Product, ProductWrite},
    errors::AppError,
    repositories::sqlx_repo::SqlxProductRepo,
};

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, compare_at_price, category_id, \
    image_url, additional_images, stock, is_active, created_at, updated_at";

/// Helper to compute OFFSET safely from 1-based `page` and `per_page`.
fn page_offset(page: u32, per_page: u32) -> i64 {
    let page = page.saturating_sub(1);
    (page as i64) * (per_page as i64)
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &ProductWrite) -> Result<Product, AppError>;
    async fn get_product_by_id(&self, id: &Uuid) -> Result<Product, AppError>;
    async fn get_product_by_slug(&self, slug: &str) -> Result<Product, AppError>;
    async fn list_products(&self, active_only: bool, page: u32, per_page: u32) -> Result<Vec<Product>, AppError>;
    async fn count_products(&self, active_only: bool) -> Result<i64, AppError>;
    async fn update_product(&self, id: &Uuid, product: &ProductWrite) -> Result<Product, AppError>;
    async fn delete_product(&self, id: &Uuid) -> Result<Product, AppError>;
    async fn check_connection(&self) -> Result<(), AppError>;
}

#[async_trait]
impl<T: ProductRepository + ?Sized> ProductRepository for Arc<T> {
    async fn insert_product(&self, product: &ProductWrite) -> Result<Product, AppError> {
        (**self).insert_product(product).await
    }
    async fn get_product_by_id(&self, id: &Uuid) -> Result<Product, AppError> {
        (**self).get_product_by_id(id).await
    }
    async fn get_product_by_slug(&self, slug: &str) -> Result<Product, AppError> {
        (**self).get_product_by_slug(slug).await
    }
    async fn list_products(&self, active_only: bool, page: u32, per_page: u32) -> Result<Vec<Product>, AppError> {
        (**self).list_products(active_only, page, per_page).await
    }
    async fn count_products(&self, active_only: bool) -> Result<i64, AppError> {
        (**self).count_products(active_only).await
    }
    async fn update_product(&self, id: &Uuid, product: &ProductWrite) -> Result<Product, AppError> {
        (**self).update_product(id, product).await
    }
    async fn delete_product(&self, id: &Uuid) -> Result<Product, AppError> {
        (**self).delete_product(id).await
    }
    async fn check_connection(&self) -> Result<(), AppError> {
        (**self).check_connection().await
    }
}

impl SqlxProductRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxProductRepo { pool }
    }
}

#[async_trait]
impl ProductRepository for SqlxProductRepo {
    async fn insert_product(&self, product: &ProductWrite) -> Result<Product, AppError> {
        let sql = format!(
            r#"
            INSERT INTO products (
                name, slug, description, price, compare_at_price, category_id,
                image_url, additional_images, stock, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.compare_at_price)
            .bind(product.category_id)
            .bind(&product.image_url)
            .bind(&product.additional_images)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(product.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get_product_by_id(&self, id: &Uuid) -> Result<Product, AppError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Product, AppError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1");

        sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))
    }

    async fn list_products(&self, active_only: bool, page: u32, per_page: u32) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE ($1 = FALSE OR is_active = TRUE)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(active_only)
            .bind(per_page as i64)
            .bind(page_offset(page, per_page))
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn count_products(&self, active_only: bool) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE ($1 = FALSE OR is_active = TRUE)",
        )
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update_product(&self, id: &Uuid, product: &ProductWrite) -> Result<Product, AppError> {
        let sql = format!(
            r#"
            UPDATE products SET
                name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6,
                category_id = $7, image_url = $8, additional_images = $9, stock = $10,
                is_active = $11, updated_at = $12
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.compare_at_price)
            .bind(product.category_id)
            .bind(&product.image_url)
            .bind(&product.additional_images)
            .bind(product.stock)
            .bind(product.is_active)
            .bind(product.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))
    }

    async fn delete_product(&self, id: &Uuid) -> Result<Product, AppError> {
        let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))
    }

    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::page_offset;

    #[test]
    fn offset_is_computed_from_one_based_pages() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }
}
