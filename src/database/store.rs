//! Storage seams.
//!
//! Services talk to these traits only. `repositories` holds the Postgres
//! implementations and `memory` an in-process one used by tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::models::{
    AppliedRsvp, Member, MembershipStatus, NewMember, NewNotification, NewSession, Notification,
    NotificationPreferences, PushToken, Rsvp, RsvpChange, RsvpCounts, RsvpStatus, Session,
    SessionFilter,
};
use crate::error::AppError;

/// Decides the write for one (session, member) pair from a consistent read of
/// the session and the member's current record.
pub type RsvpPolicy<'a> =
    dyn Fn(&Session, Option<&Rsvp>) -> Result<RsvpChange, AppError> + Send + Sync + 'a;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: NewSession) -> Result<Session, AppError>;

    /// Inserts a recurring child unless one already exists for the same
    /// parent and date, in which case `None` is returned.
    async fn insert_occurrence(&self, session: NewSession) -> Result<Option<Session>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError>;

    /// Matching sessions ordered by date then start time.
    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, AppError>;

    /// Persists the mutable columns of `session` and returns the stored row.
    async fn update(&self, session: &Session) -> Result<Session, AppError>;

    /// Hard delete. RSVPs go with the session; children keep their rows with
    /// the parent link cleared. Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn child_exists(&self, parent_id: Uuid, date: NaiveDate) -> Result<bool, AppError>;
}

#[async_trait]
pub trait RsvpStore: Send + Sync {
    /// Reads the session and the member's RSVP under a row lock, asks `policy`
    /// what to do and applies the change before releasing the lock.
    async fn apply_rsvp(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        policy: &RsvpPolicy<'_>,
    ) -> Result<AppliedRsvp, AppError>;

    /// All RSVPs for a session in first-come order.
    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Rsvp>, AppError>;

    async fn find(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Rsvp>, AppError>;

    async fn list_by_status(
        &self,
        session_id: Uuid,
        status: RsvpStatus,
    ) -> Result<Vec<Rsvp>, AppError>;

    async fn count_by_status(&self, session_id: Uuid) -> Result<RsvpCounts, AppError>;

    async fn exists_for_session(&self, session_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>, AppError>;
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Member>, AppError>;
    async fn insert(&self, member: NewMember) -> Result<Member, AppError>;
    async fn update(&self, member: &Member) -> Result<Member, AppError>;
    async fn list_by_membership(&self, status: MembershipStatus)
    -> Result<Vec<Member>, AppError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Returns the member's preferences, creating the all-enabled default row
    /// on first access.
    async fn get_or_create_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<NotificationPreferences, AppError>;

    async fn save_preferences(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<NotificationPreferences, AppError>;

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, AppError>;

    async fn record_delivery(
        &self,
        notification_id: Uuid,
        push_sent_at: Option<DateTime<Utc>>,
        email_sent_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError>;

    async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn list_push_tokens(&self, user_id: Uuid) -> Result<Vec<PushToken>, AppError>;

    /// Registers a device token. A token already held by another member moves
    /// to `user_id`.
    async fn upsert_push_token(
        &self,
        user_id: Uuid,
        token: &str,
        device_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PushToken, AppError>;

    async fn delete_push_token(&self, token: &str) -> Result<(), AppError>;

    /// Deletes one of the member's tokens, or all of them when `token` is `None`.
    async fn delete_user_push_tokens(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<u64, AppError>;
}

/// Ledger of reminders already handed to the dispatcher.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Records `(session_id, key)` and returns true if this call made the
    /// record; false if it was already present.
    async fn claim(
        &self,
        session_id: Uuid,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Forgets every claim for the session so its reminders can fire again.
    async fn release(&self, session_id: Uuid) -> Result<u64, AppError>;
}
