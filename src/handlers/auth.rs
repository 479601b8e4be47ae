use actix_web::{HttpResponse, web};

use crate::AppState;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::auth::Claims;

/// Creates the member on first sign-in or refreshes the profile from the
/// identity token. New members start pending approval.
pub async fn sync(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let member = state.members.sync_identity(&claims.identity()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(member)))
}
