use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{
    models::{
        NewSession, Rsvp, RsvpCounts, RsvpSummary, Session, SessionFilter, SessionInput,
        SessionPatch, SessionStatus, validate_courts, validate_day_of_week,
    },
    store::{ReminderStore, RsvpStore, SessionStore},
};
use crate::error::AppError;
use crate::services::clock::{Clock, ClubTime};
use crate::services::recurrence::{DEFAULT_OCCURRENCES, RecurrenceGenerator};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub rsvps: Vec<Rsvp>,
    pub summary: RsvpSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    #[serde(flatten)]
    pub session: Session,
    pub occurrences: Vec<Session>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "session", rename_all = "lowercase")]
pub enum DeleteOutcome {
    /// The session had RSVPs and was kept as cancelled.
    Cancelled(Session),
    Deleted,
}

fn require_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(title.to_string())
}

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    rsvps: Arc<dyn RsvpStore>,
    reminders: Arc<dyn ReminderStore>,
    recurrence: Arc<RecurrenceGenerator>,
    club_time: ClubTime,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rsvps: Arc<dyn RsvpStore>,
        reminders: Arc<dyn ReminderStore>,
        recurrence: Arc<RecurrenceGenerator>,
        club_time: ClubTime,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            rsvps,
            reminders,
            recurrence,
            club_time,
            clock,
        }
    }

    pub async fn create(
        &self,
        input: SessionInput,
        creator: Uuid,
    ) -> Result<CreatedSession, AppError> {
        let title = require_title(&input.title)?;
        let max_players = validate_courts(input.courts)?;
        let day_of_week = input
            .recurring_day_of_week
            .map(validate_day_of_week)
            .transpose()?;

        let session = self
            .sessions
            .insert(NewSession {
                title,
                description: input.description,
                session_date: input.session_date,
                start_time: input.start_time,
                end_time: input.end_time,
                courts: input.courts,
                max_players,
                rsvp_deadline: self.club_time.rsvp_deadline(input.session_date),
                is_recurring: input.is_recurring,
                recurring_day_of_week: day_of_week,
                recurring_parent_id: None,
                created_by: creator,
            })
            .await?;

        log::info!(
            "Created session {} '{}' on {} ({} courts, {} players)",
            session.id,
            session.title,
            session.session_date,
            session.courts,
            session.max_players
        );

        let occurrences = if session.is_recurring && session.recurring_day_of_week.is_some() {
            let total = input
                .occurrences
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_OCCURRENCES);
            self.recurrence
                .materialize_occurrences(&session, total)
                .await?
        } else {
            Vec::new()
        };

        Ok(CreatedSession {
            session,
            occurrences,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Session"))
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionDetail, AppError> {
        let session = self.load(id).await?;
        let rsvps = self.rsvps.list_for_session(id).await?;
        let summary = RsvpSummary::new(session.max_players, RsvpCounts::tally(&rsvps));
        Ok(SessionDetail {
            session,
            rsvps,
            summary,
        })
    }

    /// Sessions from today (club-local) onward that are not cancelled.
    pub async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Session>, AppError> {
        self.sessions
            .find(&SessionFilter {
                from_date: Some(self.club_time.today(now)),
                exclude_status: Some(SessionStatus::Cancelled),
                ..Default::default()
            })
            .await
    }

    pub async fn list_cancelled_upcoming(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, AppError> {
        self.sessions
            .find(&SessionFilter {
                from_date: Some(self.club_time.today(now)),
                status: Some(SessionStatus::Cancelled),
                ..Default::default()
            })
            .await
    }

    pub async fn update(&self, id: Uuid, patch: SessionPatch) -> Result<Session, AppError> {
        let mut session = self.load(id).await?;

        if let Some(courts) = patch.courts {
            session.max_players = validate_courts(courts)?;
            session.courts = courts;
        }
        if let Some(title) = patch.title {
            session.title = require_title(&title)?;
        }
        if let Some(description) = patch.description {
            session.description = description;
        }
        let previous_start = (session.session_date, session.start_time);
        if let Some(date) = patch.session_date {
            session.session_date = date;
            session.rsvp_deadline = self.club_time.rsvp_deadline(date);
        }
        if let Some(start) = patch.start_time {
            session.start_time = start;
        }
        if let Some(end) = patch.end_time {
            session.end_time = end;
        }
        if let Some(status) = patch.status {
            session.status = status;
        }
        if session.status != SessionStatus::Cancelled {
            session.cancellation_reason = None;
        }
        session.updated_at = self.clock.now();

        let session = self.sessions.update(&session).await?;
        log::info!("Updated session {}", session.id);

        if previous_start != (session.session_date, session.start_time) {
            // reminders already sent were for the old start
            let released = self.reminders.release(session.id).await?;
            if released > 0 {
                log::info!(
                    "Session {} rescheduled, cleared {} sent reminder(s)",
                    session.id,
                    released
                );
            }
        }

        Ok(session)
    }

    /// Marks the session cancelled. RSVPs are kept so members can see who
    /// was affected.
    pub async fn cancel(&self, id: Uuid, reason: Option<String>) -> Result<Session, AppError> {
        let mut session = self.load(id).await?;
        session.status = SessionStatus::Cancelled;
        session.cancellation_reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        session.updated_at = self.clock.now();

        let session = self.sessions.update(&session).await?;
        log::info!(
            "Cancelled session {}{}",
            session.id,
            session
                .cancellation_reason
                .as_deref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        );
        Ok(session)
    }

    /// Cancels a session that has RSVPs, removes one that has none.
    pub async fn delete(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        self.load(id).await?;
        if self.rsvps.exists_for_session(id).await? {
            self.soft_cancel(id).await.map(DeleteOutcome::Cancelled)
        } else {
            self.hard_delete(id).await.map(|_| DeleteOutcome::Deleted)
        }
    }

    pub async fn soft_cancel(&self, id: Uuid) -> Result<Session, AppError> {
        let mut session = self.load(id).await?;
        session.status = SessionStatus::Cancelled;
        session.updated_at = self.clock.now();
        let session = self.sessions.update(&session).await?;
        log::info!("Session {} has RSVPs, marked cancelled instead of deleting", id);
        Ok(session)
    }

    pub async fn hard_delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.sessions.delete(id).await? {
            return Err(AppError::not_found("Session"));
        }
        log::info!("Deleted session {}", id);
        Ok(())
    }
}
