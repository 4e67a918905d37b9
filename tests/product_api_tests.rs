
use actix_web::{
    http::{header, StatusCode},
    test, App,
};
use serde_json::{json, Value};
use storefront_backend::{
    routes::{configure_routes, upload_limits},
    settings::MediaSettings,
};
use test_utils::*;

macro_rules! service {
    ($app:expr) => {
        test::init_service(
            App::new()
                .app_data($app.state.clone())
                .app_data(upload_limits(&MediaSettings::default()))
                .configure(configure_routes),
        )
        .await
    };
}

macro_rules! multipart {
    ($request:expr, $uri:expr, $body:expr) => {
        $request
            .uri($uri)
            .insert_header((header::CONTENT_TYPE, MultipartBody::content_type()))
            .set_payload($body.finish())
            .to_request()
    };
}

fn earrings() -> Value {
    json!({
        "name": "Gold Hoop Earrings",
        "description": "14k gold hoops",
        "price": 49.5,
        "stock": 3
    })
}

fn key_of(locator: &str) -> &str {
    locator.trim_start_matches("/images/")
}

#[actix_rt::test]
async fn create_product_stores_variants_and_returns_resolved_urls() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "hoops.png", "image/png", &png(300, 200))
        .file("images", "side.png", "image/png", &png(100, 100));

    let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let product: Value = test::read_body_json(response).await;
    assert_eq!(product["slug"], "gold-hoop-earrings");
    assert!(product["image_url"].as_str().unwrap().ends_with("_1080.jpg"));
    assert_eq!(product["additional_images"].as_array().unwrap().len(), 1);

    let medium = product["image"]["medium"].as_str().unwrap();
    assert!(medium.starts_with("/images/") && medium.ends_with("_400.jpg"));
    assert!(app.storage.exists(key_of(medium)));
    assert_eq!(product["gallery"].as_array().unwrap().len(), 1);

    assert_eq!(app.storage.file_count(), 6);
    assert_eq!(app.repo.len(), 1);
}

#[actix_rt::test]
async fn product_can_be_fetched_by_id_or_slug() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "hoops.png", "image/png", &png(80, 80));
    let created: Value = test::read_body_json(
        test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    for path in [format!("/api/v1/products/{id}"), "/api/v1/products/gold-hoop-earrings".to_string()] {
        let response = test::call_service(&service, test::TestRequest::get().uri(&path).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let product: Value = test::read_body_json(response).await;
        assert_eq!(product["id"], created["id"]);
    }

    let missing = test::TestRequest::get().uri("/api/v1/products/no-such-product").to_request();
    assert_eq!(test::call_service(&service, missing).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn create_without_an_image_is_rejected() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let body = MultipartBody::new().json("metadata", &earrings());
    let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.repo.len(), 0);
}

#[actix_rt::test]
async fn corrupt_upload_writes_nothing() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let mut broken = png(64, 64);
    broken.truncate(40);

    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "hoops.png", "image/png", &png(120, 120))
        .file("images", "broken.png", "image/png", &broken);
    let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(response).await;
    assert!(error["error"].as_str().unwrap().contains("broken.png"));

    assert_eq!(app.storage.file_count(), 0);
    assert_eq!(app.repo.len(), 0);
}

#[actix_rt::test]
async fn invalid_metadata_is_rejected_before_any_upload() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let body = MultipartBody::new()
        .json("metadata", &json!({"name": "Ring", "price": -1.0, "stock": 1}))
        .file("image", "ring.png", "image/png", &png(50, 50));
    let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(response).await;
    assert_eq!(error["error"], "Validation failed");
    assert_eq!(app.storage.file_count(), 0);
}

#[actix_rt::test]
async fn failed_insert_discards_the_new_images() {
    let app = TestApp::spawn().await;
    let service = service!(app);
    app.repo.fail_writes(true);

    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "hoops.png", "image/png", &png(90, 90));
    let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.storage.file_count(), 0);
}

async fn create_with_gallery(app: &TestApp) -> Value {
    let service = service!(app);
    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "hoops.png", "image/png", &png(200, 200))
        .file("images", "side.png", "image/png", &png(100, 100));

    test::read_body_json(
        test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await,
    )
    .await
}

#[actix_rt::test]
async fn new_primary_replaces_and_removes_the_old_one() {
    let app = TestApp::spawn().await;
    let created = create_with_gallery(&app).await;
    let service = service!(app);

    let id = created["id"].as_str().unwrap();
    let old_primary = created["image_url"].as_str().unwrap().to_string();

    let body = MultipartBody::new()
        .json("metadata", &json!({"name": "Gold Hoop Earrings", "price": 55.0, "stock": 2}))
        .file("image", "new.png", "image/png", &png(150, 150));
    let response = test::call_service(
        &service,
        multipart!(test::TestRequest::put(), &format!("/api/v1/products/{id}"), body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated: Value = test::read_body_json(response).await;
    let new_primary = updated["image_url"].as_str().unwrap();

    assert_ne!(new_primary, old_primary);
    assert_eq!(updated["price"], 55.0);
    assert_eq!(updated["additional_images"], created["additional_images"]);
    assert!(app.storage.exists(new_primary));
    assert!(!app.storage.exists(&old_primary));
    assert_eq!(app.storage.file_count(), 6);
}

#[actix_rt::test]
async fn dropping_gallery_images_removes_their_variants() {
    let app = TestApp::spawn().await;
    let created = create_with_gallery(&app).await;
    let service = service!(app);
    let id = created["id"].as_str().unwrap();

    let mut metadata = earrings();
    metadata["additional_images"] = json!([]);

    let body = MultipartBody::new()
        .json("metadata", &metadata)
        .file("images", "back.png", "image/png", &png(60, 60));
    let response = test::call_service(
        &service,
        multipart!(test::TestRequest::put(), &format!("/api/v1/products/{id}"), body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated: Value = test::read_body_json(response).await;
    let gallery = updated["additional_images"].as_array().unwrap();

    assert_eq!(updated["image_url"], created["image_url"]);
    assert_eq!(gallery.len(), 1);
    assert_ne!(gallery[0], created["additional_images"][0]);
    assert!(!app.storage.exists(created["additional_images"][0].as_str().unwrap()));
    assert_eq!(app.storage.file_count(), 6);
}

#[actix_rt::test]
async fn keeping_an_unknown_reference_is_rejected() {
    let app = TestApp::spawn().await;
    let created = create_with_gallery(&app).await;
    let service = service!(app);
    let id = created["id"].as_str().unwrap();

    let mut metadata = earrings();
    metadata["additional_images"] = json!(["https://elsewhere.example.com/x.jpg"]);

    let body = MultipartBody::new().json("metadata", &metadata);
    let response = test::call_service(
        &service,
        multipart!(test::TestRequest::put(), &format!("/api/v1/products/{id}"), body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.file_count(), 6);
}

#[actix_rt::test]
async fn failed_update_keeps_the_old_images_and_drops_the_new() {
    let app = TestApp::spawn().await;
    let created = create_with_gallery(&app).await;
    let service = service!(app);
    let id = created["id"].as_str().unwrap();
    app.repo.fail_writes(true);

    let body = MultipartBody::new()
        .json("metadata", &earrings())
        .file("image", "new.png", "image/png", &png(70, 70));
    let response = test::call_service(
        &service,
        multipart!(test::TestRequest::put(), &format!("/api/v1/products/{id}"), body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.storage.exists(created["image_url"].as_str().unwrap()));
    assert_eq!(app.storage.file_count(), 6);
}

#[actix_rt::test]
async fn delete_removes_the_row_and_its_images() {
    let app = TestApp::spawn().await;
    let created = create_with_gallery(&app).await;
    let service = service!(app);
    let id = created["id"].as_str().unwrap();

    let response = test::call_service(
        &service,
        test::TestRequest::delete().uri(&format!("/api/v1/products/{id}")).to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.storage.file_count(), 0);

    let again = test::TestRequest::get().uri(&format!("/api/v1/products/{id}")).to_request();
    assert_eq!(test::call_service(&service, again).await.status(), StatusCode::NOT_FOUND);

    let bad_id = test::TestRequest::delete().uri("/api/v1/products/not-a-uuid").to_request();
    assert_eq!(test::call_service(&service, bad_id).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn list_hides_inactive_products_by_default() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    for (name, active) in [("Silver Ring", true), ("Old Ring", false)] {
        let body = MultipartBody::new()
            .json("metadata", &json!({"name": name, "price": 20.0, "stock": 1, "is_active": active}))
            .file("image", "ring.png", "image/png", &png(40, 40));
        let response = test::call_service(&service, multipart!(test::TestRequest::post(), "/api/v1/products", body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let listed: Value = test::read_body_json(
        test::call_service(&service, test::TestRequest::get().uri("/api/v1/products").to_request()).await,
    )
    .await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["products"][0]["slug"], "silver-ring");

    let all: Value = test::read_body_json(
        test::call_service(
            &service,
            test::TestRequest::get()
                .uri("/api/v1/products?include_inactive=true&per_page=1")
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(all["total"], 2);
    assert_eq!(all["products"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
async fn resolve_endpoint_returns_public_urls() {
    let app = TestApp::spawn().await;
    let service = service!(app);
    let id = "0b6f1c2e-3d4a-4b5c-9d8e-7f6a5b4c3d2e";

    let sized: Value = test::read_body_json(
        test::call_service(
            &service,
            test::TestRequest::get()
                .uri(&format!("/api/v1/media/resolve?reference={id}_1080.jpg&size=48"))
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(sized["url"], format!("/images/{id}_48.jpg"));

    let all: Value = test::read_body_json(
        test::call_service(&service, test::TestRequest::get().uri("/api/v1/media/resolve").to_request()).await,
    )
    .await;
    assert_eq!(all["large"], "/placeholder.svg");
    assert_eq!(all["thumbnail"], "/placeholder.svg");

    let bad_size = test::TestRequest::get()
        .uri(&format!("/api/v1/media/resolve?reference={id}.jpg&size=500"))
        .to_request();
    assert_eq!(test::call_service(&service, bad_size).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn health_reports_database_and_storage() {
    let app = TestApp::spawn().await;
    let service = service!(app);

    let response = test::call_service(
        &service,
        test::TestRequest::get().uri("/api/v1/admin/health").to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let health: Value = test::read_body_json(response).await;
    assert_eq!(health["database"], "OK");
    assert_eq!(health["storage"]["backend"], "local");
}
