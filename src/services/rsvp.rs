use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{
    models::{Rsvp, RsvpChange, RsvpCounts, RsvpStatus, RsvpSummary, Session},
    store::{RsvpStore, SessionStore},
};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::scheduler::WaitlistNotifier;

/// Decides an RSVP create or update against the locked session and record.
///
/// Past the deadline a regular member may only re-confirm an existing `in`;
/// admins are never restricted by the deadline.
pub fn decide_upsert(
    session: &Session,
    existing: Option<&Rsvp>,
    status: RsvpStatus,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<RsvpChange, AppError> {
    if !session.is_open() {
        return Err(AppError::SessionNotOpen);
    }

    let late = session.is_past_deadline(now);
    let restricted = late && !is_admin;

    match existing {
        None if restricted => Err(AppError::DeadlinePassed),
        None => Ok(RsvpChange::Create {
            status,
            is_late: late,
            added_by_admin: is_admin,
            at: now,
        }),
        Some(current) if restricted && current.status == RsvpStatus::In && status != RsvpStatus::In => {
            Err(AppError::LockedIn)
        }
        Some(current) if restricted && current.status != RsvpStatus::In => {
            Err(AppError::DeadlinePassed)
        }
        Some(_) => Ok(RsvpChange::Update {
            status,
            added_by_admin: is_admin,
            at: now,
        }),
    }
}

pub fn decide_removal(
    session: &Session,
    existing: Option<&Rsvp>,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<RsvpChange, AppError> {
    let Some(current) = existing else {
        return Err(AppError::not_found("RSVP"));
    };

    if current.status == RsvpStatus::In && !is_admin && session.is_past_deadline(now) {
        return Err(AppError::LockedIn);
    }

    Ok(RsvpChange::Delete)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpRemoval {
    pub rsvp: Rsvp,
    /// Waiting members told about the freed spot.
    pub waitlist_notified: usize,
}

pub struct RsvpService {
    rsvps: Arc<dyn RsvpStore>,
    sessions: Arc<dyn SessionStore>,
    waitlist: Arc<WaitlistNotifier>,
    clock: Arc<dyn Clock>,
}

impl RsvpService {
    pub fn new(
        rsvps: Arc<dyn RsvpStore>,
        sessions: Arc<dyn SessionStore>,
        waitlist: Arc<WaitlistNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rsvps,
            sessions,
            waitlist,
            clock,
        }
    }

    pub async fn upsert(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        status: RsvpStatus,
        is_admin: bool,
    ) -> Result<Rsvp, AppError> {
        let clock = self.clock.clone();
        let policy = move |session: &Session, existing: Option<&Rsvp>| {
            decide_upsert(session, existing, status, is_admin, clock.now())
        };

        let applied = self.rsvps.apply_rsvp(session_id, user_id, &policy).await?;

        log::info!(
            "RSVP {} for member {} on session {}{}{}",
            applied.rsvp.status,
            user_id,
            session_id,
            if applied.rsvp.is_late_rsvp { " (late)" } else { "" },
            if is_admin { " by admin" } else { "" }
        );

        Ok(applied.rsvp)
    }

    /// Deletes the member's RSVP. Giving up an `in` place notifies the
    /// waitlist; a failure there is logged and does not undo the removal.
    pub async fn remove(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<RsvpRemoval, AppError> {
        let clock = self.clock.clone();
        let policy = move |session: &Session, existing: Option<&Rsvp>| {
            decide_removal(session, existing, is_admin, clock.now())
        };

        let applied = self.rsvps.apply_rsvp(session_id, user_id, &policy).await?;
        log::info!(
            "Removed {} RSVP of member {} from session {}",
            applied.rsvp.status,
            user_id,
            session_id
        );

        let mut waitlist_notified = 0;
        if applied.rsvp.status == RsvpStatus::In {
            match self.waitlist.notify(&applied.session).await {
                Ok(report) => waitlist_notified = report.delivered,
                Err(e) => log::warn!(
                    "Waitlist notification failed for session {}: {}",
                    session_id,
                    e
                ),
            }
        }

        Ok(RsvpRemoval {
            rsvp: applied.rsvp,
            waitlist_notified,
        })
    }

    async fn session(&self, session_id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session"))
    }

    pub async fn summarize(&self, session_id: Uuid) -> Result<RsvpSummary, AppError> {
        let session = self.session(session_id).await?;
        let counts: RsvpCounts = self.rsvps.count_by_status(session_id).await?;
        Ok(RsvpSummary::new(session.max_players, counts))
    }

    pub async fn list(&self, session_id: Uuid) -> Result<Vec<Rsvp>, AppError> {
        self.session(session_id).await?;
        self.rsvps.list_for_session(session_id).await
    }

    pub async fn get_for_user(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Rsvp>, AppError> {
        self.session(session_id).await?;
        self.rsvps.find(session_id, user_id).await
    }

    /// Confirmed players in first-come order.
    pub async fn confirmed_players(&self, session_id: Uuid) -> Result<Vec<Rsvp>, AppError> {
        self.session(session_id).await?;
        self.rsvps.list_by_status(session_id, RsvpStatus::In).await
    }
}
