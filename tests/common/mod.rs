#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use uuid::Uuid;

use club_sessions::database::models::{
    Member, MemberRole, MembershipStatus, NewMember, Session, SessionInput,
};
use club_sessions::services::ManualClock;
use club_sessions::services::channels::{
    ChannelError, Channels, EmailChannel, EmailMessage, PushChannel, PushOutcome,
};
use club_sessions::{AppState, Config, Stores};

pub const TEST_TIMEZONE: &str = "Australia/Sydney";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-key-that-is-long-enough";

#[derive(Debug, Clone)]
pub struct PushCall {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Push channel double that records every call. Tokens listed in
/// `unregistered` come back as invalid.
#[derive(Default)]
pub struct RecordingPush {
    pub calls: Mutex<Vec<PushCall>>,
    pub unregistered: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingPush {
    pub fn calls(&self) -> Vec<PushCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.title).collect()
    }

    pub fn mark_unregistered(&self, token: &str) {
        self.unregistered.lock().unwrap().push(token.to_string());
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn send(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<Vec<PushOutcome>, ChannelError> {
        self.calls.lock().unwrap().push(PushCall {
            tokens: tokens.to_vec(),
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Rejected {
                status: 502,
                body: "gateway down".into(),
            });
        }

        let unregistered = self.unregistered.lock().unwrap().clone();
        Ok(tokens
            .iter()
            .map(|token| {
                let invalid = unregistered.contains(token);
                PushOutcome {
                    token: token.clone(),
                    success: !invalid,
                    invalid_token: invalid,
                    error: invalid.then(|| "unregistered".to_string()),
                }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: AtomicBool,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl EmailChannel for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Rejected {
                status: 500,
                body: "smtp relay unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_env_only().expect("config from defaults");
    config.timezone = TEST_TIMEZONE.to_string();
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config.admin_email = Some("captain@club.test".to_string());
    config.environment = "test".to_string();
    config
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Services over the in-memory store with a manual clock and recording
/// channels.
pub struct TestApp {
    pub state: AppState,
    pub stores: Stores,
    pub clock: Arc<ManualClock>,
    pub push: Arc<RecordingPush>,
    pub email: Arc<RecordingEmail>,
}

impl TestApp {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::build(now, test_config(), true)
    }

    /// No outbound channel configured.
    pub fn without_channels(now: DateTime<Utc>) -> Self {
        Self::build(now, test_config(), false)
    }

    pub fn with_config(now: DateTime<Utc>, config: Config) -> Self {
        Self::build(now, config, true)
    }

    fn build(now: DateTime<Utc>, config: Config, with_channels: bool) -> Self {
        let stores = Stores::in_memory();
        let clock = Arc::new(ManualClock::new(now));
        let push = Arc::new(RecordingPush::default());
        let email = Arc::new(RecordingEmail::default());
        let channels = if with_channels {
            Channels {
                push: Some(push.clone() as Arc<dyn PushChannel>),
                email: Some(email.clone() as Arc<dyn EmailChannel>),
            }
        } else {
            Channels::none()
        };

        let state = AppState::build(config, stores.clone(), channels, clock.clone())
            .expect("test state builds");

        Self {
            state,
            stores,
            clock,
            push,
            email,
        }
    }

    pub async fn member(&self, role: MemberRole, status: MembershipStatus) -> Member {
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        self.stores
            .members
            .insert(NewMember {
                subject: format!("test|{}", Uuid::new_v4()),
                email,
                name,
                avatar_url: None,
                role,
                membership_status: status,
            })
            .await
            .expect("member inserted")
    }

    pub async fn player(&self) -> Member {
        self.member(MemberRole::Player, MembershipStatus::Approved)
            .await
    }

    pub async fn admin(&self) -> Member {
        self.member(MemberRole::Admin, MembershipStatus::Approved)
            .await
    }

    pub async fn players(&self, count: usize) -> Vec<Member> {
        let mut players = Vec::with_capacity(count);
        for _ in 0..count {
            players.push(self.player().await);
        }
        players
    }

    pub async fn push_token(&self, member: &Member) -> String {
        let token = format!("device-{}", Uuid::new_v4());
        self.state
            .notifications
            .register_push_token(member.id, &token, Some("test phone"))
            .await
            .expect("token registered");
        token
    }

    pub async fn session(&self, session_date: NaiveDate, start: NaiveTime, courts: i32) -> Session {
        // creator is not registered so it never shows up as a recipient
        self.state
            .sessions
            .create(session_input(session_date, start, courts), Uuid::new_v4())
            .await
            .expect("session created")
            .session
    }

    /// Sunday 2025-06-15, 18:00-20:00 club time, two courts.
    pub async fn sunday_session(&self) -> Session {
        self.session(date(2025, 6, 15), time(18, 0), 2).await
    }
}

pub fn session_input(session_date: NaiveDate, start: NaiveTime, courts: i32) -> SessionInput {
    SessionInput {
        title: "Sunday Social".to_string(),
        description: "Social doubles".to_string(),
        session_date,
        start_time: start,
        end_time: start + chrono::Duration::hours(2),
        courts,
        is_recurring: false,
        recurring_day_of_week: None,
        occurrences: None,
    }
}
