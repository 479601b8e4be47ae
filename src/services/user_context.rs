use uuid::Uuid;

use crate::database::models::Member;
use crate::error::AppError;
use crate::services::auth::Claims;
use crate::services::members::{MemberService, require_admin, require_approved};

/// The member behind the current request.
///
/// Handlers build it from the token claims; extraction is not a `FromRequest`
/// impl because resolving the member needs the store.
#[derive(Debug, Clone)]
pub struct MemberContext {
    pub member: Member,
}

impl MemberContext {
    pub async fn from_claims(claims: &Claims, members: &MemberService) -> Result<Self, AppError> {
        let member = members.resolve(&claims.identity()).await?;
        Ok(Self { member })
    }

    /// Approved members only.
    pub async fn approved(claims: &Claims, members: &MemberService) -> Result<Self, AppError> {
        let ctx = Self::from_claims(claims, members).await?;
        require_approved(&ctx.member)?;
        Ok(ctx)
    }

    /// Approved admins only.
    pub async fn admin(claims: &Claims, members: &MemberService) -> Result<Self, AppError> {
        let ctx = Self::from_claims(claims, members).await?;
        require_admin(&ctx.member)?;
        Ok(ctx)
    }

    pub fn member_id(&self) -> Uuid {
        self.member.id
    }

    pub fn is_admin(&self) -> bool {
        self.member.is_admin()
    }
}
