use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::database::models::{AnnouncementInput, RsvpInput, SessionInput, SessionPatch};
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::{MemberContext, auth::Claims, sessions::DeleteOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct CancelSessionRequest {
    pub reason: Option<String>,
}

// Sessions

pub async fn create_session(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<SessionInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::admin(&claims, &state.members).await?;
    let created = state
        .sessions
        .create(input.into_inner(), ctx.member_id())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

pub async fn update_session(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    input: web::Json<SessionPatch>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let session = state
        .sessions
        .update(path.into_inner(), input.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(session)))
}

pub async fn delete_session(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let outcome = state.sessions.delete(path.into_inner()).await?;
    let message = match outcome {
        DeleteOutcome::Cancelled(_) => "Session has RSVPs and was cancelled",
        DeleteOutcome::Deleted => "Session deleted",
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(Some(outcome), message)))
}

pub async fn cancel_session(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    input: Option<web::Json<CancelSessionRequest>>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let reason = input.and_then(|body| body.into_inner().reason);
    let session = state.sessions.cancel(path.into_inner(), reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(session)))
}

pub async fn refresh_recurring(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let report = state.recurrence.refresh_all().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

// RSVPs on behalf of members; deadline rules do not apply

pub async fn set_member_rsvp(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
    input: web::Json<RsvpInput>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let (session_id, user_id) = path.into_inner();
    state.members.get(user_id).await?;
    let rsvp = state
        .rsvps
        .upsert(session_id, user_id, input.status, true)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(rsvp)))
}

pub async fn remove_member_rsvp(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let (session_id, user_id) = path.into_inner();
    let removal = state.rsvps.remove(session_id, user_id, true).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        Some(removal),
        "RSVP removed",
    )))
}

// Membership

pub async fn join_requests(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let members = state.members.join_requests().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(members)))
}

pub async fn approve_member(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::admin(&claims, &state.members).await?;
    let member = state.members.approve(path.into_inner()).await?;
    log::info!("Member {} approved by {}", member.id, ctx.member_id());
    Ok(HttpResponse::Ok().json(ApiResponse::success(member)))
}

pub async fn reject_member(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::admin(&claims, &state.members).await?;
    let member = state.members.reject(path.into_inner()).await?;
    log::info!("Member {} rejected by {}", member.id, ctx.member_id());
    Ok(HttpResponse::Ok().json(ApiResponse::success(member)))
}

pub async fn announce(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<AnnouncementInput>,
) -> Result<HttpResponse, AppError> {
    MemberContext::admin(&claims, &state.members).await?;
    let report = state
        .notifications
        .announce(&input.title, &input.body)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}
