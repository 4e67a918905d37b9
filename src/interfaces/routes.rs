use actix_web::web;

use crate::handlers::home::home;

mod admin;
mod media;
mod products;
mod json_error;

pub use json_error::upload_limits;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);

    cfg.service(
        web::scope("/api/v1")
            .configure(admin::config_routes)
            .configure(media::config_routes)
            .configure(products::config_routes)
    );

    cfg.configure(json_error::config_routes);
}
