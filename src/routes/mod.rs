use actix_web::web;

use crate::handlers;

pub mod admin;
pub mod auth;
pub mod sessions;
pub mod users;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health))
            .configure(auth::configure)
            .configure(users::configure)
            .configure(sessions::configure)
            .configure(admin::configure),
    );
}
