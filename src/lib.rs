pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

pub use config::Config;
pub use error::AppError;

use database::{
    InMemoryStore,
    repositories::PostgresStore,
    store::{MemberStore, NotificationStore, ReminderStore, RsvpStore, SessionStore},
};
use services::{
    Channels, Clock, ClubTime, MemberService, NotificationDispatcher, RecurrenceGenerator,
    ReminderScheduler, RsvpService, SessionService, WaitlistNotifier,
};

/// One handle per storage seam. Both backends implement every trait, so the
/// fields normally point at the same object.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub rsvps: Arc<dyn RsvpStore>,
    pub members: Arc<dyn MemberStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub reminders: Arc<dyn ReminderStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self::shared(Arc::new(PostgresStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::shared(Arc::new(InMemoryStore::new()))
    }

    fn shared<S>(store: Arc<S>) -> Self
    where
        S: SessionStore + RsvpStore + MemberStore + NotificationStore + ReminderStore + 'static,
    {
        Self {
            sessions: store.clone(),
            rsvps: store.clone(),
            members: store.clone(),
            notifications: store.clone(),
            reminders: store,
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub club_time: ClubTime,
    pub clock: Arc<dyn Clock>,
    pub members: MemberService,
    pub sessions: SessionService,
    pub rsvps: RsvpService,
    pub recurrence: Arc<RecurrenceGenerator>,
    pub notifications: Arc<NotificationDispatcher>,
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppState {
    /// Wires every service over `stores`. Fails only when the configured
    /// timezone is unknown.
    pub fn build(
        config: Config,
        stores: Stores,
        channels: Channels,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let club_time = ClubTime::new(&config.timezone)?;

        let notifications = Arc::new(
            NotificationDispatcher::new(
                stores.members.clone(),
                stores.notifications.clone(),
                channels,
                clock.clone(),
                config.dispatch_settings(),
            )
            .with_branding(config.email_from_name.clone(), config.frontend_url.clone()),
        );
        let recurrence = Arc::new(RecurrenceGenerator::new(
            stores.sessions.clone(),
            club_time,
        ));
        let waitlist = Arc::new(WaitlistNotifier::new(
            stores.rsvps.clone(),
            notifications.clone(),
            club_time,
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            stores.sessions.clone(),
            stores.rsvps.clone(),
            stores.members.clone(),
            stores.reminders.clone(),
            notifications.clone(),
            recurrence.clone(),
            club_time,
            clock.clone(),
            config.scheduler_settings(),
        ));

        Ok(Self {
            members: MemberService::new(stores.members.clone(), config.admin_email.clone()),
            sessions: SessionService::new(
                stores.sessions.clone(),
                stores.rsvps.clone(),
                stores.reminders.clone(),
                recurrence.clone(),
                club_time,
                clock.clone(),
            ),
            rsvps: RsvpService::new(stores.rsvps, stores.sessions, waitlist, clock.clone()),
            config,
            club_time,
            clock,
            recurrence,
            notifications,
            scheduler,
        })
    }
}
