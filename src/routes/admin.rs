use actix_web::web;

use crate::handlers::admin;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/sessions", web::post().to(admin::create_session))
            .route(
                "/sessions/refresh-recurring",
                web::post().to(admin::refresh_recurring),
            )
            .route("/sessions/{id}", web::put().to(admin::update_session))
            .route("/sessions/{id}", web::delete().to(admin::delete_session))
            .route("/sessions/{id}/cancel", web::post().to(admin::cancel_session))
            .route(
                "/sessions/{id}/rsvp/{user_id}",
                web::post().to(admin::set_member_rsvp),
            )
            .route(
                "/sessions/{id}/rsvp/{user_id}",
                web::delete().to(admin::remove_member_rsvp),
            )
            .route("/join-requests", web::get().to(admin::join_requests))
            .route(
                "/join-requests/{id}/approve",
                web::post().to(admin::approve_member),
            )
            .route(
                "/join-requests/{id}/reject",
                web::post().to(admin::reject_member),
            )
            .route("/announcements", web::post().to(admin::announce)),
    );
}
