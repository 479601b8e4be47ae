use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::{MemberContext, auth::Claims};

pub async fn list_sessions(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    MemberContext::approved(&claims, &state.members).await?;
    let sessions = state.sessions.list_upcoming(state.clock.now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(sessions)))
}

pub async fn list_cancelled_sessions(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    MemberContext::approved(&claims, &state.members).await?;
    let sessions = state
        .sessions
        .list_cancelled_upcoming(state.clock.now())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(sessions)))
}

pub async fn get_session(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MemberContext::approved(&claims, &state.members).await?;
    let detail = state.sessions.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(detail)))
}

pub async fn get_summary(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MemberContext::approved(&claims, &state.members).await?;
    let summary = state.rsvps.summarize(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}
