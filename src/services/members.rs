use std::sync::Arc;

use uuid::Uuid;

use crate::database::{
    models::{Identity, Member, MemberRole, MembershipStatus, NewMember},
    store::MemberStore,
};
use crate::error::AppError;

pub struct MemberService {
    members: Arc<dyn MemberStore>,
    admin_email: Option<String>,
}

impl MemberService {
    pub fn new(members: Arc<dyn MemberStore>, admin_email: Option<String>) -> Self {
        Self {
            members,
            admin_email,
        }
    }

    fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }

    /// Creates the member on first sign-in, otherwise refreshes the profile
    /// fields from the identity provider. Role and membership are untouched
    /// for existing members.
    pub async fn sync_identity(&self, identity: &Identity) -> Result<Member, AppError> {
        if let Some(mut member) = self.members.find_by_subject(&identity.subject).await? {
            if member.email == identity.email
                && member.name == identity.name
                && member.avatar_url == identity.avatar_url
            {
                return Ok(member);
            }
            member.email = identity.email.clone();
            member.name = identity.name.clone();
            member.avatar_url = identity.avatar_url.clone();
            return self.members.update(&member).await;
        }

        let (role, membership_status) = if self.is_bootstrap_admin(&identity.email) {
            (MemberRole::Admin, MembershipStatus::Approved)
        } else {
            (MemberRole::Pending, MembershipStatus::Pending)
        };

        let member = self
            .members
            .insert(NewMember {
                subject: identity.subject.clone(),
                email: identity.email.clone(),
                name: identity.name.clone(),
                avatar_url: identity.avatar_url.clone(),
                role,
                membership_status,
            })
            .await?;

        log::info!(
            "Registered member {} ({}) as {}/{}",
            member.id,
            member.email,
            member.role,
            member.membership_status
        );

        Ok(member)
    }

    /// Member behind a verified identity, registering it if unseen.
    pub async fn resolve(&self, identity: &Identity) -> Result<Member, AppError> {
        match self.members.find_by_subject(&identity.subject).await? {
            Some(member) => Ok(member),
            None => self.sync_identity(identity).await,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Member, AppError> {
        self.members
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Member"))
    }

    pub async fn join_requests(&self) -> Result<Vec<Member>, AppError> {
        self.members
            .list_by_membership(MembershipStatus::Pending)
            .await
    }

    pub async fn approve(&self, id: Uuid) -> Result<Member, AppError> {
        let mut member = self.pending(id).await?;
        member.membership_status = MembershipStatus::Approved;
        if member.role == MemberRole::Pending {
            member.role = MemberRole::Player;
        }
        self.members.update(&member).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<Member, AppError> {
        let mut member = self.pending(id).await?;
        member.membership_status = MembershipStatus::Rejected;
        self.members.update(&member).await
    }

    async fn pending(&self, id: Uuid) -> Result<Member, AppError> {
        let member = self.get(id).await?;
        if member.membership_status != MembershipStatus::Pending {
            return Err(AppError::validation("Member is not pending approval"));
        }
        Ok(member)
    }
}

pub fn require_approved(member: &Member) -> Result<(), AppError> {
    if member.is_approved() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Membership is not approved".to_string()))
    }
}

pub fn require_admin(member: &Member) -> Result<(), AppError> {
    if member.is_admin() && member.is_approved() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}
