use actix_web::{get, HttpResponse, Responder};
use std::env;

#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Welcome to the Storefront API!",
        "status": "Ok",
        "version": env!("CARGO_PKG_VERSION"),
        "products": "/api/v1/products",
        "health": "/api/v1/admin/health"
    }))
}
