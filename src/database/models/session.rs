use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;
use crate::error::AppError;

pub const MIN_COURTS: i32 = 1;
pub const MAX_COURTS: i32 = 3;

/// Player capacity for a court count, or `None` outside 1..=3.
pub fn max_players_for_courts(courts: i32) -> Option<i32> {
    match courts {
        1 => Some(6),
        2 => Some(10),
        3 => Some(16),
        _ => None,
    }
}

pub fn validate_courts(courts: i32) -> Result<i32, AppError> {
    max_players_for_courts(courts).ok_or_else(|| {
        AppError::validation(format!(
            "courts must be between {} and {}",
            MIN_COURTS, MAX_COURTS
        ))
    })
}

pub fn validate_day_of_week(day: i32) -> Result<i32, AppError> {
    if (0..=6).contains(&day) {
        Ok(day)
    } else {
        Err(AppError::validation(
            "recurring_day_of_week must be between 0 (Sunday) and 6 (Saturday)",
        ))
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "lowercase")]
    pub enum SessionStatus {
        Open => "open",
        Closed => "closed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub session_date: NaiveDate, // DATE, club-local calendar day
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    pub courts: i32,
    pub max_players: i32,
    pub rsvp_deadline: DateTime<Utc>,
    pub is_recurring: bool,
    pub recurring_day_of_week: Option<i32>, // 0 = Sunday
    pub recurring_parent_id: Option<Uuid>,
    pub status: SessionStatus,
    pub cancellation_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// True once `now` is strictly after the RSVP deadline.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.rsvp_deadline
    }
}

/// Fully derived row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub title: String,
    pub description: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub courts: i32,
    pub max_players: i32,
    pub rsvp_deadline: DateTime<Utc>,
    pub is_recurring: bool,
    pub recurring_day_of_week: Option<i32>,
    pub recurring_parent_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub session_date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end_time: NaiveTime,
    pub courts: i32,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurring_day_of_week: Option<i32>,
    /// Total instances including the first; defaults to 4 for recurring sessions.
    pub occurrences: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub session_date: Option<NaiveDate>,
    #[serde(default, with = "time_of_day::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "time_of_day::option")]
    pub end_time: Option<NaiveTime>,
    pub courts: Option<i32>,
    pub status: Option<SessionStatus>,
}

/// Filtered lookup over sessions. Every set field narrows the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
    pub exclude_status: Option<SessionStatus>,
    pub is_recurring: Option<bool>,
    pub recurring_parent_id: Option<Uuid>,
    /// Exclusive lower bound on `rsvp_deadline`.
    pub deadline_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `rsvp_deadline`.
    pub deadline_until: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.from_date.is_none_or(|d| session.session_date >= d)
            && self.to_date.is_none_or(|d| session.session_date <= d)
            && self.status.is_none_or(|s| session.status == s)
            && self.exclude_status.is_none_or(|s| session.status != s)
            && self.is_recurring.is_none_or(|r| session.is_recurring == r)
            && self
                .recurring_parent_id
                .is_none_or(|p| session.recurring_parent_id == Some(p))
            && self.deadline_after.is_none_or(|t| session.rsvp_deadline > t)
            && self.deadline_until.is_none_or(|t| session.rsvp_deadline <= t)
    }
}

/// "HH:MM" on the wire; "HH:MM:SS" is accepted on input.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capacity_follows_court_count() {
        assert_eq!(max_players_for_courts(1), Some(6));
        assert_eq!(max_players_for_courts(2), Some(10));
        assert_eq!(max_players_for_courts(3), Some(16));
    }

    #[test]
    fn courts_outside_range_are_rejected() {
        for courts in [-1, 0, 4, 12] {
            assert!(matches!(validate_courts(courts), Err(AppError::Validation(_))));
        }
        assert_eq!(validate_courts(2).unwrap(), 10);
    }

    #[test]
    fn day_of_week_bounds() {
        assert!(validate_day_of_week(0).is_ok());
        assert!(validate_day_of_week(6).is_ok());
        assert!(validate_day_of_week(7).is_err());
        assert!(validate_day_of_week(-1).is_err());
    }

    #[test]
    fn time_of_day_accepts_short_and_long_forms() {
        assert_eq!(
            time_of_day::parse("18:30").unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
        assert_eq!(
            time_of_day::parse("07:05:00").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap()
        );
        assert!(time_of_day::parse("25:00").is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("Cancelled".parse::<SessionStatus>().unwrap(), SessionStatus::Cancelled);
        assert_eq!(SessionStatus::Open.to_string(), "open");
        assert!("archived".parse::<SessionStatus>().is_err());
    }
}
