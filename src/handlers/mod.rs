use actix_web::web;

use crate::middleware::Authentication;

pub mod auth;
pub mod chat;
pub mod offers;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(chat::start_ws_connection))
        .service(
            web::scope("/api")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .service(
                    web::resource("/pending-offers/{buyer_id}")
                        .wrap(Authentication)
                        .route(web::get().to(offers::pending_offers)),
                )
                .service(
                    web::resource("/make-offer")
                        .wrap(Authentication)
                        .route(web::post().to(offers::make_offer)),
                )
                .service(
                    web::resource("/all-offers/{seller_id}")
                        .wrap(Authentication)
                        .route(web::get().to(offers::seller_offers)),
                )
                .service(
                    web::resource("/product-offers/{product_id}")
                        .wrap(Authentication)
                        .route(web::get().to(offers::product_offers)),
                )
                .service(
                    web::resource("/update-offer-status")
                        .wrap(Authentication)
                        .route(web::post().to(offers::update_offer_status)),
                )
                .service(
                    web::resource("/messages")
                        .wrap(Authentication)
                        .route(web::get().to(chat::get_messages)),
                ),
        );
}
