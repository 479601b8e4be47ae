use actix_web::{HttpResponse, Responder, web};

use crate::AppState;

pub mod admin;
pub mod auth;
pub mod rsvp;
pub mod sessions;
pub mod shared;
pub mod users;

pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": state.clock.now(),
        "notifications": state.notifications.is_enabled(),
    }))
}
