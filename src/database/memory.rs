//! In-process store backing every storage trait.
//!
//! One mutex guards the whole state, so `apply_rsvp` is serialized the same
//! way the row lock serializes it in Postgres.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::models::{
    AppliedRsvp, Member, MembershipStatus, NewMember, NewNotification, NewSession, Notification,
    NotificationPreferences, PushToken, Rsvp, RsvpChange, RsvpCounts, RsvpStatus, Session,
    SessionFilter, SessionStatus,
};
use crate::database::store::{
    MemberStore, NotificationStore, ReminderStore, RsvpPolicy, RsvpStore, SessionStore,
};
use crate::error::AppError;

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Uuid, Session>,
    // insertion order doubles as the tie-breaker for equal timestamps
    rsvps: Vec<Rsvp>,
    members: HashMap<Uuid, Member>,
    preferences: HashMap<Uuid, NotificationPreferences>,
    notifications: Vec<Notification>,
    push_tokens: Vec<PushToken>,
    reminders: HashSet<(Uuid, String)>,
}

impl MemoryState {
    fn sorted_sessions(&self, filter: &SessionFilter) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            (a.session_date, a.start_time, a.created_at).cmp(&(
                b.session_date,
                b.start_time,
                b.created_at,
            ))
        });
        sessions
    }

    fn rsvps_for(&self, session_id: Uuid) -> Vec<Rsvp> {
        let mut rsvps: Vec<Rsvp> = self
            .rsvps
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        rsvps.sort_by_key(|r| r.rsvp_timestamp);
        rsvps
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn build_session(new: NewSession) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        title: new.title,
        description: new.description,
        session_date: new.session_date,
        start_time: new.start_time,
        end_time: new.end_time,
        courts: new.courts,
        max_players: new.max_players,
        rsvp_deadline: new.rsvp_deadline,
        is_recurring: new.is_recurring,
        recurring_day_of_week: new.recurring_day_of_week,
        recurring_parent_id: new.recurring_parent_id,
        status: SessionStatus::Open,
        cancellation_reason: None,
        created_by: new.created_by,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert(&self, session: NewSession) -> Result<Session, AppError> {
        let session = build_session(session);
        self.state
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn insert_occurrence(&self, session: NewSession) -> Result<Option<Session>, AppError> {
        let mut state = self.state.lock().await;
        let duplicate = state.sessions.values().any(|s| {
            s.recurring_parent_id.is_some()
                && s.recurring_parent_id == session.recurring_parent_id
                && s.session_date == session.session_date
        });
        if duplicate {
            return Ok(None);
        }
        let session = build_session(session);
        state.sessions.insert(session.id, session.clone());
        Ok(Some(session))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, AppError> {
        Ok(self.state.lock().await.sorted_sessions(filter))
    }

    async fn update(&self, session: &Session) -> Result<Session, AppError> {
        let mut state = self.state.lock().await;
        let stored = state
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| AppError::not_found("Session"))?;
        let created_at = stored.created_at;
        *stored = Session {
            created_at,
            ..session.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        if state.sessions.remove(&id).is_none() {
            return Ok(false);
        }
        state.rsvps.retain(|r| r.session_id != id);
        state.reminders.retain(|(session_id, _)| *session_id != id);
        for child in state.sessions.values_mut() {
            if child.recurring_parent_id == Some(id) {
                child.recurring_parent_id = None;
            }
        }
        Ok(true)
    }

    async fn child_exists(&self, parent_id: Uuid, date: NaiveDate) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .sessions
            .values()
            .any(|s| s.recurring_parent_id == Some(parent_id) && s.session_date == date))
    }
}

#[async_trait]
impl RsvpStore for InMemoryStore {
    async fn apply_rsvp(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        policy: &RsvpPolicy<'_>,
    ) -> Result<AppliedRsvp, AppError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Session"))?;
        let position = state
            .rsvps
            .iter()
            .position(|r| r.session_id == session_id && r.user_id == user_id);
        let existing = position.map(|i| &state.rsvps[i]);

        let rsvp = match (policy(&session, existing)?, position) {
            (
                RsvpChange::Create {
                    status,
                    is_late,
                    added_by_admin,
                    at,
                },
                None,
            ) => {
                let rsvp = Rsvp {
                    id: Uuid::new_v4(),
                    session_id,
                    user_id,
                    status,
                    rsvp_timestamp: at,
                    is_late_rsvp: is_late,
                    added_by_admin,
                    created_at: at,
                    updated_at: at,
                };
                state.rsvps.push(rsvp.clone());
                rsvp
            }
            (
                RsvpChange::Update {
                    status,
                    added_by_admin,
                    at,
                },
                Some(i),
            ) => {
                let rsvp = &mut state.rsvps[i];
                rsvp.status = status;
                rsvp.added_by_admin = rsvp.added_by_admin || added_by_admin;
                rsvp.updated_at = at;
                rsvp.clone()
            }
            (RsvpChange::Delete, Some(i)) => state.rsvps.remove(i),
            (RsvpChange::Create { .. }, Some(_)) => {
                return Err(AppError::internal_server_error_message(
                    "RSVP already exists",
                ));
            }
            (_, None) => return Err(AppError::not_found("RSVP")),
        };

        Ok(AppliedRsvp { session, rsvp })
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Rsvp>, AppError> {
        Ok(self.state.lock().await.rsvps_for(session_id))
    }

    async fn find(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Rsvp>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .rsvps
            .iter()
            .find(|r| r.session_id == session_id && r.user_id == user_id)
            .cloned())
    }

    async fn list_by_status(
        &self,
        session_id: Uuid,
        status: RsvpStatus,
    ) -> Result<Vec<Rsvp>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rsvps_for(session_id)
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    async fn count_by_status(&self, session_id: Uuid) -> Result<RsvpCounts, AppError> {
        let state = self.state.lock().await;
        Ok(RsvpCounts::tally(
            state.rsvps.iter().filter(|r| r.session_id == session_id),
        ))
    }

    async fn exists_for_session(&self, session_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .rsvps
            .iter()
            .any(|r| r.session_id == session_id))
    }
}

#[async_trait]
impl MemberStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>, AppError> {
        Ok(self.state.lock().await.members.get(&id).cloned())
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<Member>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .values()
            .find(|m| m.subject == subject)
            .cloned())
    }

    async fn insert(&self, member: NewMember) -> Result<Member, AppError> {
        let mut state = self.state.lock().await;
        if state.members.values().any(|m| m.subject == member.subject) {
            return Err(AppError::validation("Member already exists"));
        }
        let now = Utc::now();
        let member = Member {
            id: Uuid::new_v4(),
            subject: member.subject,
            email: member.email,
            name: member.name,
            avatar_url: member.avatar_url,
            role: member.role,
            membership_status: member.membership_status,
            created_at: now,
            updated_at: now,
        };
        state.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn update(&self, member: &Member) -> Result<Member, AppError> {
        let mut state = self.state.lock().await;
        let stored = state
            .members
            .get_mut(&member.id)
            .ok_or_else(|| AppError::not_found("Member"))?;
        *stored = Member {
            updated_at: Utc::now(),
            created_at: stored.created_at,
            ..member.clone()
        };
        Ok(stored.clone())
    }

    async fn list_by_membership(
        &self,
        status: MembershipStatus,
    ) -> Result<Vec<Member>, AppError> {
        let mut members: Vec<Member> = self
            .state
            .lock()
            .await
            .members
            .values()
            .filter(|m| m.membership_status == status)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn get_or_create_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<NotificationPreferences, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .preferences
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults_for(user_id, Utc::now()))
            .clone())
    }

    async fn save_preferences(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<NotificationPreferences, AppError> {
        let mut saved = prefs.clone();
        saved.updated_at = Utc::now();
        self.state
            .lock()
            .await
            .preferences
            .insert(prefs.user_id, saved.clone());
        Ok(saved)
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, AppError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            body: notification.body,
            data: notification.data,
            push_sent: false,
            push_sent_at: None,
            email_sent: false,
            email_sent_at: None,
            read_at: None,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(notification)
    }

    async fn record_delivery(
        &self,
        notification_id: Uuid,
        push_sent_at: Option<DateTime<Utc>>,
        email_sent_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| AppError::not_found("Notification"))?;
        if let Some(at) = push_sent_at {
            notification.push_sent = true;
            notification.push_sent_at = Some(at);
        }
        if let Some(at) = email_sent_at {
            notification.email_sent = true;
            notification.email_sent_at = Some(at);
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.read_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_push_tokens(&self, user_id: Uuid) -> Result<Vec<PushToken>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .push_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_push_token(
        &self,
        user_id: Uuid,
        token: &str,
        device_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PushToken, AppError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.push_tokens.iter_mut().find(|t| t.token == token) {
            existing.user_id = user_id;
            existing.device_name = device_name.map(str::to_string);
            existing.last_used_at = at;
            return Ok(existing.clone());
        }
        let push_token = PushToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            device_name: device_name.map(str::to_string),
            last_used_at: at,
            created_at: at,
        };
        state.push_tokens.push(push_token.clone());
        Ok(push_token)
    }

    async fn delete_push_token(&self, token: &str) -> Result<(), AppError> {
        self.state
            .lock()
            .await
            .push_tokens
            .retain(|t| t.token != token);
        Ok(())
    }

    async fn delete_user_push_tokens(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let before = state.push_tokens.len();
        state
            .push_tokens
            .retain(|t| t.user_id != user_id || token.is_some_and(|tok| t.token != tok));
        Ok((before - state.push_tokens.len()) as u64)
    }
}

#[async_trait]
impl ReminderStore for InMemoryStore {
    async fn claim(
        &self,
        session_id: Uuid,
        key: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .reminders
            .insert((session_id, key.to_string())))
    }

    async fn release(&self, session_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let before = state.reminders.len();
        state.reminders.retain(|(id, _)| *id != session_id);
        Ok((before - state.reminders.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn new_session(parent: Option<Uuid>, date: NaiveDate) -> NewSession {
        NewSession {
            title: "Evening".into(),
            description: String::new(),
            session_date: date,
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            courts: 1,
            max_players: 6,
            rsvp_deadline: Utc::now(),
            is_recurring: parent.is_none(),
            recurring_day_of_week: Some(1),
            recurring_parent_id: parent,
            created_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn occurrence_insert_ignores_duplicates() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let parent = SessionStore::insert(&store, new_session(None, date)).await.unwrap();
        let child_date = NaiveDate::from_ymd_opt(2025, 6, 23).unwrap();

        let first = store
            .insert_occurrence(new_session(Some(parent.id), child_date))
            .await
            .unwrap();
        let second = store
            .insert_occurrence(new_session(Some(parent.id), child_date))
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(store.child_exists(parent.id, child_date).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_parent_detaches_children() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let parent = SessionStore::insert(&store, new_session(None, date)).await.unwrap();
        let child = store
            .insert_occurrence(new_session(
                Some(parent.id),
                NaiveDate::from_ymd_opt(2025, 6, 23).unwrap(),
            ))
            .await
            .unwrap()
            .unwrap();

        assert!(SessionStore::delete(&store, parent.id).await.unwrap());
        let child = SessionStore::find_by_id(&store, child.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child.recurring_parent_id, None);
        assert!(!SessionStore::delete(&store, parent.id).await.unwrap());
    }

    #[tokio::test]
    async fn claim_is_first_writer_wins() {
        let store = InMemoryStore::new();
        let session_id = Uuid::new_v4();
        let now = Utc::now();

        assert!(store.claim(session_id, "rsvp_deadline", now).await.unwrap());
        assert!(!store.claim(session_id, "rsvp_deadline", now).await.unwrap());
        assert!(
            store
                .claim(session_id, "session_reminder_24h", now)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn release_forgets_only_that_session() {
        let store = InMemoryStore::new();
        let moved = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();
        store.claim(moved, "session_reminder_24h", now).await.unwrap();
        store.claim(moved, "session_reminder_12h", now).await.unwrap();
        store.claim(other, "session_reminder_24h", now).await.unwrap();

        assert_eq!(store.release(moved).await.unwrap(), 2);
        assert!(store.claim(moved, "session_reminder_24h", now).await.unwrap());
        assert!(!store.claim(other, "session_reminder_24h", now).await.unwrap());
    }

    #[tokio::test]
    async fn removing_one_token_keeps_the_rest() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        store.upsert_push_token(user, "a", None, now).await.unwrap();
        store.upsert_push_token(user, "b", Some("phone"), now).await.unwrap();

        assert_eq!(store.delete_user_push_tokens(user, Some("a")).await.unwrap(), 1);
        let left = store.list_push_tokens(user).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].token, "b");

        assert_eq!(store.delete_user_push_tokens(user, None).await.unwrap(), 1);
        assert!(store.list_push_tokens(user).await.unwrap().is_empty());
    }
}
