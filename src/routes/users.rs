use actix_web::web;

use crate::handlers::users;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users/me")
            .route("", web::get().to(users::me))
            .route("/notifications", web::get().to(users::get_preferences))
            .route("/notifications", web::put().to(users::update_preferences))
            .route(
                "/notifications/history",
                web::get().to(users::notification_history),
            )
            .route("/push-tokens", web::post().to(users::register_push_token))
            .route("/push-tokens", web::delete().to(users::unregister_push_token)),
    )
    .route(
        "/notifications/{id}/read",
        web::post().to(users::mark_notification_read),
    );
}
