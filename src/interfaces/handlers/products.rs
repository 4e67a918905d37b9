use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{web, HttpResponse, Responder};
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    entities::{
        image::Upload,
        product::{ProductUpdateUpload, ProductUpload},
    },
    errors::AppError,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Reads a spooled multipart file back into memory.
async fn read_upload(file: TempFile) -> Result<Upload, AppError> {
    let bytes = tokio::fs::read(file.file.path())
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read uploaded file: {}", e)))?;

    Ok(Upload::new(
        file.file_name,
        file.content_type.map(|mime| mime.to_string()),
        bytes,
    ))
}

async fn read_uploads(
    primary: Option<TempFile>,
    additional: Vec<TempFile>,
) -> Result<(Option<Upload>, Vec<Upload>), AppError> {
    let primary = match primary {
        Some(file) => Some(read_upload(file).await?),
        None => None,
    };
    let additional = try_join_all(additional.into_iter().map(read_upload)).await?;

    Ok((primary, additional))
}

#[instrument(skip(state, form))]
pub async fn create_product(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<ProductUpload>,
) -> Result<impl Responder, AppError> {
    let product_handler = &state.product_handler;

    let (primary, additional) = read_uploads(form.image, form.images).await?;
    let product = product_handler
        .create_product(form.metadata.into_inner(), primary, additional)
        .await?;

    Ok(HttpResponse::Created().json(product))
}

#[instrument(skip(state, query))]
pub async fn get_all_products(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<impl Responder, AppError> {
    let product_handler = &state.product_handler;

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);

    let products = product_handler
        .list_products(query.include_inactive, page, per_page)
        .await?;

    Ok(HttpResponse::Ok().json(products))
}

#[instrument(skip(state))]
pub async fn get_product(
    product_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let product = state.product_handler.get_product(&product_id).await?;
    Ok(HttpResponse::Ok().json(product))
}

#[instrument(skip(state, form))]
pub async fn update_product(
    product_id: web::Path<String>,
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<ProductUpdateUpload>,
) -> Result<impl Responder, AppError> {
    let product_handler = &state.product_handler;

    let (primary, additional) = read_uploads(form.image, form.images).await?;
    let updated = product_handler
        .update_product(&product_id, form.metadata.into_inner(), primary, additional)
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

#[instrument(skip(state))]
pub async fn delete_product(
    product_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    state.product_handler.delete_product(&product_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
