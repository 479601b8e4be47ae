use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::AppState;
use crate::database::models::{PreferencesPatch, PushTokenInput, PushTokenRemoval};
use crate::error::AppError;
use crate::handlers::shared::{ApiResponse, PageQuery};
use crate::services::{MemberContext, auth::Claims};

pub async fn me(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ctx.member)))
}

pub async fn get_preferences(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    let prefs = state.notifications.preferences(ctx.member_id()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(prefs)))
}

pub async fn update_preferences(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<PreferencesPatch>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    let prefs = state
        .notifications
        .update_preferences(ctx.member_id(), &input)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(prefs)))
}

pub async fn notification_history(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    let notifications = state
        .notifications
        .history(ctx.member_id(), query.limit, query.offset)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

pub async fn register_push_token(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<PushTokenInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    let token = state
        .notifications
        .register_push_token(ctx.member_id(), &input.token, input.device_name.as_deref())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(token)))
}

/// Without a body every token of the member is removed.
pub async fn unregister_push_token(
    claims: Claims,
    state: web::Data<AppState>,
    input: Option<web::Json<PushTokenRemoval>>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    let removal = input.map(web::Json::into_inner).unwrap_or_default();
    let removed = state
        .notifications
        .unregister_push_token(ctx.member_id(), removal.token.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        Some(serde_json::json!({ "removed": removed })),
        "Push token removed",
    )))
}

pub async fn mark_notification_read(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let ctx = MemberContext::from_claims(&claims, &state.members).await?;
    state
        .notifications
        .mark_read(path.into_inner(), ctx.member_id())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        None,
        "Notification marked as read",
    )))
}
