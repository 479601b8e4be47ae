use actix_web::{HttpRequest, HttpResponse, web};
use uuid::Uuid;

use crate::AppState;
use crate::database::models::RsvpInput;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::middleware::RequestIdExt;
use crate::services::{MemberContext, auth::Claims};

// Members RSVP for themselves under the deadline rules, admins included.
// The admin bypass is only available through the admin routes.

/// Serves both POST and PUT; the engine decides between create and update.
pub async fn upsert_rsvp(
    req: HttpRequest,
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    input: web::Json<RsvpInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::approved(&claims, &state.members).await?;
    let rsvp = state
        .rsvps
        .upsert(path.into_inner(), ctx.member_id(), input.status, false)
        .await?;
    log::info!(
        "[{}] Member {} RSVP'd {} for session {}",
        req.correlation_id().unwrap_or_default(),
        rsvp.user_id,
        rsvp.status,
        rsvp.session_id
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success(rsvp)))
}

pub async fn remove_rsvp(
    req: HttpRequest,
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::approved(&claims, &state.members).await?;
    let removal = state
        .rsvps
        .remove(path.into_inner(), ctx.member_id(), false)
        .await?;
    log::info!(
        "[{}] Member {} removed RSVP for session {} ({} waiting member(s) notified)",
        req.correlation_id().unwrap_or_default(),
        removal.rsvp.user_id,
        removal.rsvp.session_id,
        removal.waitlist_notified
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        Some(removal),
        "RSVP removed",
    )))
}

pub async fn my_rsvp(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::approved(&claims, &state.members).await?;
    let rsvp = state
        .rsvps
        .get_for_user(path.into_inner(), ctx.member_id())
        .await?
        .ok_or_else(|| AppError::not_found("RSVP"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rsvp)))
}
