use actix_web::web;

use crate::handlers::{rsvp, sessions};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sessions")
            .route("", web::get().to(sessions::list_sessions))
            // before "/{id}" so the literal segment wins
            .route("/cancelled", web::get().to(sessions::list_cancelled_sessions))
            .route("/{id}", web::get().to(sessions::get_session))
            .route("/{id}/summary", web::get().to(sessions::get_summary))
            .route("/{id}/rsvp", web::post().to(rsvp::upsert_rsvp))
            .route("/{id}/rsvp", web::put().to(rsvp::upsert_rsvp))
            .route("/{id}/rsvp", web::delete().to(rsvp::remove_rsvp))
            .route("/{id}/rsvp/me", web::get().to(rsvp::my_rsvp)),
    );
}
