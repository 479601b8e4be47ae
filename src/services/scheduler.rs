//! Background reminder scans and waitlist notifications.
//!
//! The scheduler only reads sessions and RSVPs. Its sole writes are claims in
//! the reminder ledger, which keep overlapping or repeated ticks from sending
//! the same reminder twice.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use uuid::Uuid;

use crate::database::{
    models::{MembershipStatus, NotificationKind, Rsvp, RsvpStatus, Session, SessionFilter, SessionStatus},
    store::{MemberStore, ReminderStore, RsvpStore, SessionStore},
};
use crate::error::AppError;
use crate::services::clock::{Clock, ClubTime};
use crate::services::notifications::{DispatchReport, NotificationDispatcher};
use crate::services::recurrence::RecurrenceGenerator;

pub fn session_reminder_key(lead_hours: i64) -> String {
    format!("session_reminder_{}h", lead_hours)
}

/// Deadline reminders are claimed per member, so someone who loses their
/// RSVP after the first scan is still reached once.
pub fn deadline_reminder_key(user_id: Uuid) -> String {
    format!("rsvp_deadline:{}", user_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub reminder_lead_hours: Vec<i64>,
    pub deadline_lead_hours: i64,
    /// Period of the recurring-session sweep; `None` runs it only at startup.
    pub recurrence_refresh: Option<Duration>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3600),
            reminder_lead_hours: vec![24, 12],
            deadline_lead_hours: 6,
            recurrence_refresh: None,
        }
    }
}

/// Half-open `[now + lead, now + lead + 1h)`.
pub fn reminder_window(now: DateTime<Utc>, lead_hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now + TimeDelta::hours(lead_hours);
    (start, start + TimeDelta::hours(1))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub session_reminders: usize,
    pub deadline_reminders: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
    pub dispatch: DispatchReport,
}

pub struct ReminderScheduler {
    sessions: Arc<dyn SessionStore>,
    rsvps: Arc<dyn RsvpStore>,
    members: Arc<dyn MemberStore>,
    ledger: Arc<dyn ReminderStore>,
    dispatcher: Arc<NotificationDispatcher>,
    recurrence: Arc<RecurrenceGenerator>,
    club_time: ClubTime,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl ReminderScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rsvps: Arc<dyn RsvpStore>,
        members: Arc<dyn MemberStore>,
        ledger: Arc<dyn ReminderStore>,
        dispatcher: Arc<NotificationDispatcher>,
        recurrence: Arc<RecurrenceGenerator>,
        club_time: ClubTime,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            sessions,
            rsvps,
            members,
            ledger,
            dispatcher,
            recurrence,
            club_time,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// One pass of every timed scan. Per-session failures are logged and
    /// counted in the report, never returned.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();

        if !self.dispatcher.is_enabled() {
            log::debug!("No notification channel configured, skipping reminder scans");
            return report;
        }

        let now = self.clock.now();
        for &lead in &self.settings.reminder_lead_hours {
            self.scan_session_reminders(now, lead, &mut report).await;
        }
        self.scan_deadline_reminders(now, &mut report).await;

        log::info!(
            "Reminder tick: {} session reminder(s), {} deadline reminder(s), {} duplicate(s) skipped, {} error(s); {} delivered, {} failed",
            report.session_reminders,
            report.deadline_reminders,
            report.duplicates_skipped,
            report.errors,
            report.dispatch.delivered,
            report.dispatch.failed
        );

        report
    }

    async fn scan_session_reminders(&self, now: DateTime<Utc>, lead: i64, report: &mut TickReport) {
        let (window_start, window_end) = reminder_window(now, lead);
        let filter = SessionFilter {
            from_date: Some(self.club_time.today(window_start)),
            to_date: Some(self.club_time.today(window_end)),
            status: Some(SessionStatus::Open),
            ..Default::default()
        };

        let sessions = match self.sessions.find(&filter).await {
            Ok(sessions) => sessions,
            Err(e) => {
                log::error!("Failed to load sessions for {}h reminders: {}", lead, e);
                report.errors += 1;
                return;
            }
        };

        let key = session_reminder_key(lead);
        for session in sessions.iter().filter(|s| {
            let start = self.club_time.session_start(s.session_date, s.start_time);
            start >= window_start && start < window_end
        }) {
            match self.remind_confirmed(session, lead, &key, now).await {
                Ok(Some(dispatch)) => {
                    report.session_reminders += 1;
                    report.dispatch.merge(dispatch);
                }
                Ok(None) => report.duplicates_skipped += 1,
                Err(e) => {
                    log::warn!("Failed {}h reminder for session {}: {}", lead, session.id, e);
                    report.errors += 1;
                }
            }
        }
    }

    async fn remind_confirmed(
        &self,
        session: &Session,
        lead: i64,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DispatchReport>, AppError> {
        let recipients: Vec<Uuid> = self
            .rsvps
            .list_by_status(session.id, RsvpStatus::In)
            .await?
            .into_iter()
            .map(|r| r.user_id)
            .collect();

        if !self.ledger.claim(session.id, key, now).await? {
            log::debug!("{} already sent for session {}", key, session.id);
            return Ok(None);
        }

        let title = format!("Session Reminder ({}h)", lead);
        let body = format!(
            "Don't forget! {} is on {} at {}",
            session.title,
            self.club_time.format_date(session.session_date),
            self.club_time.format_time(session.start_time)
        );
        let dispatch = self
            .dispatcher
            .send_bulk(
                &recipients,
                NotificationKind::SessionReminder,
                &title,
                &body,
                reminder_data(NotificationKind::SessionReminder, session.id),
            )
            .await;

        log::info!(
            "Sent {}h session reminders to {} member(s) for session {}",
            lead,
            recipients.len(),
            session.title
        );

        Ok(Some(dispatch))
    }

    async fn scan_deadline_reminders(&self, now: DateTime<Utc>, report: &mut TickReport) {
        let filter = SessionFilter {
            status: Some(SessionStatus::Open),
            deadline_after: Some(now),
            deadline_until: Some(now + TimeDelta::hours(self.settings.deadline_lead_hours)),
            ..Default::default()
        };

        let sessions = match self.sessions.find(&filter).await {
            Ok(sessions) => sessions,
            Err(e) => {
                log::error!("Failed to load sessions for deadline reminders: {}", e);
                report.errors += 1;
                return;
            }
        };

        for session in &sessions {
            match self.remind_unresponsive(session, now).await {
                Ok((dispatch, already_reminded)) => {
                    report.duplicates_skipped += already_reminded;
                    if let Some(dispatch) = dispatch {
                        report.deadline_reminders += 1;
                        report.dispatch.merge(dispatch);
                    }
                }
                Err(e) => {
                    log::warn!("Failed deadline reminder for session {}: {}", session.id, e);
                    report.errors += 1;
                }
            }
        }
    }

    /// Returns the dispatch for members not reminded before, if any, and how
    /// many undecided members already had their reminder.
    async fn remind_unresponsive(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<(Option<DispatchReport>, usize), AppError> {
        let responded: HashSet<Uuid> = self
            .rsvps
            .list_for_session(session.id)
            .await?
            .into_iter()
            .map(|r| r.user_id)
            .collect();
        let undecided: Vec<Uuid> = self
            .members
            .list_by_membership(MembershipStatus::Approved)
            .await?
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !responded.contains(id))
            .collect();

        let undecided_len = undecided.len();
        let mut recipients = Vec::with_capacity(undecided_len);
        for user_id in undecided {
            if self
                .ledger
                .claim(session.id, &deadline_reminder_key(user_id), now)
                .await?
            {
                recipients.push(user_id);
            }
        }
        let already_reminded = undecided_len - recipients.len();
        if recipients.is_empty() {
            if already_reminded > 0 {
                log::debug!(
                    "Deadline reminder already sent to every undecided member of session {}",
                    session.id
                );
            }
            return Ok((None, already_reminded));
        }

        let body = format!(
            "The RSVP deadline for {} ({}) is {}. Don't miss out!",
            session.title,
            self.club_time.format_date(session.session_date),
            self.club_time.format_deadline(session.rsvp_deadline)
        );
        let dispatch = self
            .dispatcher
            .send_bulk(
                &recipients,
                NotificationKind::RsvpDeadline,
                "RSVP Deadline Approaching",
                &body,
                reminder_data(NotificationKind::RsvpDeadline, session.id),
            )
            .await;

        log::info!(
            "Sent RSVP deadline reminders to {} member(s) for session {}",
            recipients.len(),
            session.title
        );

        Ok((Some(dispatch), already_reminded))
    }

    /// Spawns the tick loop. A recurrence sweep also runs on its own period
    /// when configured.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let tick_interval = self.settings.tick_interval;

        let task = tokio::spawn(async move {
            log::info!(
                "Scheduler started: tick every {:?}, session reminders at {:?}h, deadline alerts at {}h",
                tick_interval,
                self.settings.reminder_lead_hours,
                self.settings.deadline_lead_hours
            );

            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut refresh = self.settings.recurrence_refresh.map(|period| {
                let mut refresh =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
                refresh
            });

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        self.run_tick().await;
                        let elapsed = started.elapsed();
                        if elapsed > tick_interval {
                            log::warn!(
                                "Reminder tick took {:?}, longer than the {:?} interval; missed ticks are skipped",
                                elapsed,
                                tick_interval
                            );
                        }
                    }
                    _ = next_refresh(&mut refresh) => {
                        if let Err(e) = self.recurrence.refresh_all().await {
                            log::error!("Recurring session refresh failed: {}", e);
                        }
                    }
                }
            }

            log::info!("Scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn reminder_data(kind: NotificationKind, session_id: Uuid) -> serde_json::Value {
    serde_json::json!({
        "type": kind.as_str(),
        "session_id": session_id.to_string(),
    })
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop and waits for it to exit. A tick already running is
    /// allowed to finish first.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            log::error!("Scheduler task ended abnormally: {}", e);
        }
    }
}

/// Members currently `maybe` who should hear about a freed spot: the earliest
/// responders first, at most as many as there are open places.
pub fn select_waitlist(maybes: &[Rsvp], confirmed: i64, max_players: i32) -> Vec<&Rsvp> {
    let spots = i64::from(max_players) - confirmed;
    if spots <= 0 {
        return Vec::new();
    }

    let mut waiting: Vec<&Rsvp> = maybes
        .iter()
        .filter(|r| r.status == RsvpStatus::Maybe)
        .collect();
    waiting.sort_by_key(|r| r.rsvp_timestamp);
    waiting.truncate(usize::try_from(spots).unwrap_or(usize::MAX));
    waiting
}

/// Tells waiting members that a confirmed place was given up.
pub struct WaitlistNotifier {
    rsvps: Arc<dyn RsvpStore>,
    dispatcher: Arc<NotificationDispatcher>,
    club_time: ClubTime,
}

impl WaitlistNotifier {
    pub fn new(
        rsvps: Arc<dyn RsvpStore>,
        dispatcher: Arc<NotificationDispatcher>,
        club_time: ClubTime,
    ) -> Self {
        Self {
            rsvps,
            dispatcher,
            club_time,
        }
    }

    pub async fn notify(&self, session: &Session) -> Result<DispatchReport, AppError> {
        if !self.dispatcher.is_enabled() {
            return Ok(DispatchReport::default());
        }

        let counts = self.rsvps.count_by_status(session.id).await?;
        if counts.total_in >= i64::from(session.max_players) {
            return Ok(DispatchReport::default());
        }

        let maybes = self
            .rsvps
            .list_by_status(session.id, RsvpStatus::Maybe)
            .await?;
        let recipients: Vec<Uuid> = select_waitlist(&maybes, counts.total_in, session.max_players)
            .into_iter()
            .map(|r| r.user_id)
            .collect();
        if recipients.is_empty() {
            return Ok(DispatchReport::default());
        }

        let body = format!(
            "A spot has opened up for {} on {}. RSVP now to confirm your place!",
            session.title,
            self.club_time.format_date(session.session_date)
        );
        let report = self
            .dispatcher
            .send_bulk(
                &recipients,
                NotificationKind::WaitlistUpdate,
                "Spot Available!",
                &body,
                reminder_data(NotificationKind::WaitlistUpdate, session.id),
            )
            .await;

        log::info!(
            "Notified {} waiting member(s) of an open spot in session {}",
            recipients.len(),
            session.title
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rsvp(status: RsvpStatus, minute: u32) -> Rsvp {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, minute, 0).unwrap();
        Rsvp {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            status,
            rsvp_timestamp: at,
            is_late_rsvp: false,
            added_by_admin: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn window_is_one_hour_after_lead() {
        let now = Utc.with_ymd_and_hms(2025, 6, 14, 8, 0, 0).unwrap();
        let (start, end) = reminder_window(now, 24);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn waitlist_takes_earliest_maybes_up_to_free_spots() {
        let later = rsvp(RsvpStatus::Maybe, 30);
        let earliest = rsvp(RsvpStatus::Maybe, 5);
        let middle = rsvp(RsvpStatus::Maybe, 10);
        let maybes = vec![later.clone(), earliest.clone(), middle.clone()];

        let picked = select_waitlist(&maybes, 9, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, earliest.id);

        let picked = select_waitlist(&maybes, 8, 10);
        assert_eq!(
            picked.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![earliest.id, middle.id]
        );
    }

    #[test]
    fn waitlist_is_empty_when_full_or_over() {
        let maybes = vec![rsvp(RsvpStatus::Maybe, 1)];
        assert!(select_waitlist(&maybes, 10, 10).is_empty());
        assert!(select_waitlist(&maybes, 12, 10).is_empty());
    }

    #[test]
    fn reminder_keys_are_per_lead() {
        assert_eq!(session_reminder_key(24), "session_reminder_24h");
        assert_eq!(session_reminder_key(12), "session_reminder_12h");
        let user = Uuid::new_v4();
        assert_eq!(deadline_reminder_key(user), format!("rsvp_deadline:{}", user));
        assert_ne!(deadline_reminder_key(user), deadline_reminder_key(Uuid::new_v4()));
    }
}
