use actix_web::web;

use crate::handlers::media;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/media")
            .service(
                web::resource("/resolve")
                    .route(web::get().to(media::resolve_image))
            )
    );
}
