use actix_web::web;

use crate::handlers::products;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .service(
                web::resource("")
                    .route(web::post().to(products::create_product))
                    .route(web::get().to(products::get_all_products))
            )
            .service(
                web::resource("/{product_id}")
                    .route(web::get().to(products::get_product))
                    .route(web::put().to(products::update_product))
                    .route(web::delete().to(products::delete_product))
            )
    );
}
