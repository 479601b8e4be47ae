use std::sync::Mutex;

use chrono::{
    DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::AppError;

/// Source of the current instant. Services never call `Utc::now()` directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replaying scans.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

const DEADLINE_DAYS_BEFORE: u64 = 3;

/// The club's civil timezone. Every date boundary, deadline and reminder
/// window is computed here rather than in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClubTime {
    tz: Tz,
}

impl ClubTime {
    pub fn new(name: &str) -> Result<Self, AppError> {
        let tz = name
            .trim()
            .parse::<Tz>()
            .map_err(|e| AppError::Configuration(format!("unknown timezone {}: {}", name, e)))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Club-local wall time to an instant. Ambiguous times take the earlier
    /// instant; times inside a spring-forward gap are pushed past the gap.
    pub fn resolve(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => self
                .tz
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local)),
        }
    }

    /// `date` minus three days at 23:59:59 club-local.
    pub fn rsvp_deadline(&self, date: NaiveDate) -> DateTime<Utc> {
        let day = date
            .checked_sub_days(Days::new(DEADLINE_DAYS_BEFORE))
            .unwrap_or(date);
        self.resolve(day.and_time(last_second()))
    }

    pub fn session_start(&self, date: NaiveDate, start_time: NaiveTime) -> DateTime<Utc> {
        self.resolve(date.and_time(start_time))
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    pub fn start_of_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.resolve(self.today(instant).and_time(NaiveTime::default()))
    }

    pub fn end_of_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.resolve(self.today(instant).and_time(last_second()))
    }

    /// "Sunday, 15 June 2025"
    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format("%A, %-d %B %Y").to_string()
    }

    /// "6:30 PM"
    pub fn format_time(&self, time: NaiveTime) -> String {
        time.format("%-I:%M %p").to_string()
    }

    /// "Thursday 11:59 PM", in club-local time.
    pub fn format_deadline(&self, deadline: DateTime<Utc>) -> String {
        self.local(deadline).format("%A %-I:%M %p").to_string()
    }
}

fn last_second() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}
