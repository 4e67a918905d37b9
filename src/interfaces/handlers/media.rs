use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::instrument;

use crate::{entities::image::Resolution, errors::AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub reference: String,
    pub size: Option<Resolution>,
}

/// Public URL for a stored reference. Without `size`, every resolution is returned.
#[instrument(skip(state))]
pub async fn resolve_image(
    state: web::Data<AppState>,
    query: web::Query<ResolveQuery>,
) -> Result<impl Responder, AppError> {
    let media = &state.media;

    let body = match query.size {
        Some(resolution) => serde_json::json!({
            "reference": query.reference,
            "size": resolution,
            "url": media.resolve(&query.reference, resolution),
        }),
        None => serde_json::to_value(media.resolve_all(&query.reference))
            .map_err(|e| AppError::InternalError(e.to_string()))?,
    };

    Ok(HttpResponse::Ok().json(body))
}
