use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod shutdown;

pub use domain::{entities, media, use_cases};
pub use interfaces::{handlers, repositories, routes};
pub use infrastructure::{db, storage, utils};

use media::MediaPipeline;
use repositories::{product::ProductRepository, sqlx_repo::SqlxProductRepo};
use use_cases::products::ProductHandler;

pub struct AppState {
    pub product_handler: AppProductHandler,
    pub media: Arc<MediaPipeline>,
}

pub type AppProductHandler = ProductHandler<Arc<dyn ProductRepository>>;

impl AppState {
    pub fn new(product_repo: Arc<dyn ProductRepository>, media: Arc<MediaPipeline>) -> Self {
        let product_handler = ProductHandler::new(product_repo, media.clone());

        AppState {
            product_handler,
            media,
        }
    }

    pub fn with_pool(pool: sqlx::PgPool, media: Arc<MediaPipeline>) -> Self {
        Self::new(Arc::new(SqlxProductRepo::new(pool)), media)
    }
}
