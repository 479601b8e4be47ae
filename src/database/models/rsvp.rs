use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "lowercase")]
    pub enum RsvpStatus {
        In => "in",
        Out => "out",
        Maybe => "maybe",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub status: RsvpStatus,
    pub rsvp_timestamp: DateTime<Utc>, // first write, FCFS key
    pub is_late_rsvp: bool,
    pub added_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write decided by the RSVP policy against a locked read of the record.
#[derive(Debug, Clone, PartialEq)]
pub enum RsvpChange {
    Create {
        status: RsvpStatus,
        is_late: bool,
        added_by_admin: bool,
        at: DateTime<Utc>,
    },
    Update {
        status: RsvpStatus,
        added_by_admin: bool,
        at: DateTime<Utc>,
    },
    Delete,
}

/// Result of an atomic RSVP write. For deletions `rsvp` is the removed record.
#[derive(Debug, Clone)]
pub struct AppliedRsvp {
    pub session: super::Session,
    pub rsvp: Rsvp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RsvpCounts {
    pub total_in: i64,
    pub total_out: i64,
    pub total_maybe: i64,
}

impl RsvpCounts {
    pub fn tally<'a>(rsvps: impl IntoIterator<Item = &'a Rsvp>) -> Self {
        rsvps.into_iter().fold(Self::default(), |mut counts, rsvp| {
            match rsvp.status {
                RsvpStatus::In => counts.total_in += 1,
                RsvpStatus::Out => counts.total_out += 1,
                RsvpStatus::Maybe => counts.total_maybe += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RsvpSummary {
    pub total_in: i64,
    pub total_out: i64,
    pub total_maybe: i64,
    pub max_players: i32,
    pub spots_left: i64,
    /// More confirmed players than capacity; resolved manually by an admin.
    pub over_capacity: bool,
}

impl RsvpSummary {
    pub fn new(max_players: i32, counts: RsvpCounts) -> Self {
        let max = i64::from(max_players);
        Self {
            total_in: counts.total_in,
            total_out: counts.total_out,
            total_maybe: counts.total_maybe,
            max_players,
            spots_left: (max - counts.total_in).max(0),
            over_capacity: counts.total_in > max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpInput {
    pub status: RsvpStatus,
}
