use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::database::{
    models::{NewSession, Session, SessionFilter, SessionStatus},
    store::SessionStore,
};
use crate::error::AppError;
use crate::services::clock::ClubTime;

/// Horizon used by the maintenance sweep, parent included.
pub const DEFAULT_OCCURRENCES: i32 = 4;

const WEEK: u64 = 7;

/// "Sunday - 22 Jun 2025"
pub fn occurrence_title(date: NaiveDate) -> String {
    date.format("%A - %d %b %Y").to_string()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub parents: usize,
    pub created: usize,
    pub failed: usize,
}

pub struct RecurrenceGenerator {
    sessions: Arc<dyn SessionStore>,
    club_time: ClubTime,
}

impl RecurrenceGenerator {
    pub fn new(sessions: Arc<dyn SessionStore>, club_time: ClubTime) -> Self {
        Self {
            sessions,
            club_time,
        }
    }

    /// Creates the weekly children of `parent` that do not exist yet, up to
    /// `total_occurrences` instances counting the parent. Returns only the
    /// children created by this call.
    pub async fn materialize_occurrences(
        &self,
        parent: &Session,
        total_occurrences: i32,
    ) -> Result<Vec<Session>, AppError> {
        if parent.recurring_day_of_week.is_none() {
            log::debug!(
                "Session {} has no recurring weekday, skipping generation",
                parent.id
            );
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for step in 1..total_occurrences.max(1) {
            let Some(date) = parent
                .session_date
                .checked_add_days(Days::new(WEEK * step as u64))
            else {
                break;
            };

            if self.sessions.child_exists(parent.id, date).await? {
                continue;
            }

            let child = NewSession {
                title: occurrence_title(date),
                description: parent.description.clone(),
                session_date: date,
                start_time: parent.start_time,
                end_time: parent.end_time,
                courts: parent.courts,
                max_players: parent.max_players,
                rsvp_deadline: self.club_time.rsvp_deadline(date),
                is_recurring: false,
                recurring_day_of_week: None,
                recurring_parent_id: Some(parent.id),
                created_by: parent.created_by,
            };

            // A concurrent sweep may have inserted the same date in between.
            if let Some(child) = self.sessions.insert_occurrence(child).await? {
                created.push(child);
            }
        }

        if !created.is_empty() {
            log::info!(
                "Generated {} occurrence(s) for recurring session {}",
                created.len(),
                parent.id
            );
        }

        Ok(created)
    }

    /// Re-runs generation for every open recurring parent so gaps left by
    /// downtime fill themselves in. One parent failing does not stop the sweep.
    pub async fn refresh_all(&self) -> Result<RefreshReport, AppError> {
        let parents = self
            .sessions
            .find(&SessionFilter {
                status: Some(SessionStatus::Open),
                is_recurring: Some(true),
                ..Default::default()
            })
            .await?;

        let mut report = RefreshReport {
            parents: parents.len(),
            ..Default::default()
        };

        for parent in &parents {
            match self
                .materialize_occurrences(parent, DEFAULT_OCCURRENCES)
                .await
            {
                Ok(created) => report.created += created.len(),
                Err(e) => {
                    log::warn!(
                        "Failed to refresh occurrences for session {}: {}",
                        parent.id,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Recurring refresh: {} parent(s), {} created, {} failed",
            report.parents,
            report.created,
            report.failed
        );

        Ok(report)
    }
}
