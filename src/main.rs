use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::NormalizePath, web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use storefront_backend::{
    db::postgres::{create_pool, run_migrations},
    media::MediaPipeline,
    routes::{configure_routes, upload_limits},
    settings::AppConfig,
    shutdown::shutdown_signal,
    storage::{build_storage, RetryPolicy},
    AppState,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storefront_backend=info,actix_web=info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_cors(config: &AppConfig) -> Cors {
    let origins = config.cors_origins();

    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }

    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new().context("Configuration error")?;

    init_tracing(config.is_production());
    tracing::info!("Loaded configuration: {:?}", config);

    let pool = create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database connection pool")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let storage = build_storage(&config.storage)
        .await
        .context("Failed to initialise image storage")?;

    if let Err(e) = storage.check().await {
        tracing::warn!(backend = %storage.kind(), error = %e, "Image storage is not reachable yet");
    }

    let media = Arc::new(MediaPipeline::new(
        storage,
        config.media.clone(),
        RetryPolicy::from_settings(&config.storage),
    ));

    let app_state = web::Data::new(AppState::with_pool(pool, media));

    let server_addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        backend = %config.storage.backend,
        "Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server_config = config.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(upload_limits(&server_config.media))
            .wrap(build_cors(&server_config))
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .disable_signals()
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run();

    let handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        res = server_task => {
            res.context("HTTP server task panicked")?.context("HTTP server error")?;
        }
        _ = shutdown_signal() => {
            handle.stop(true).await;
            tracing::info!("Server stopped gracefully");
        }
    }

    Ok(())
}
