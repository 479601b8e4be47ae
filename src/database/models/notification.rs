use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "snake_case")]
    pub enum NotificationKind {
        SessionReminder => "session_reminder",
        RsvpDeadline => "rsvp_deadline",
        WaitlistUpdate => "waitlist_update",
        AdminAnnouncement => "admin_announcement",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Push,
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub id: Uuid,
    pub user_id: Uuid,

    pub push_enabled: bool,
    pub push_session_reminders: bool,
    pub push_rsvp_deadlines: bool,
    pub push_waitlist_updates: bool,
    pub push_admin_announcements: bool,

    pub email_enabled: bool,
    pub email_session_reminders: bool,
    pub email_rsvp_deadlines: bool,
    pub email_waitlist_updates: bool,
    pub email_admin_announcements: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    /// Everything enabled, as created lazily on first access.
    pub fn defaults_for(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            push_enabled: true,
            push_session_reminders: true,
            push_rsvp_deadlines: true,
            push_waitlist_updates: true,
            push_admin_announcements: true,
            email_enabled: true,
            email_session_reminders: true,
            email_rsvp_deadlines: true,
            email_waitlist_updates: true,
            email_admin_announcements: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The channel master switch gates every kind-level switch for that channel.
    pub fn allows(&self, channel: Channel, kind: NotificationKind) -> bool {
        match channel {
            Channel::Push => {
                self.push_enabled
                    && match kind {
                        NotificationKind::SessionReminder => self.push_session_reminders,
                        NotificationKind::RsvpDeadline => self.push_rsvp_deadlines,
                        NotificationKind::WaitlistUpdate => self.push_waitlist_updates,
                        NotificationKind::AdminAnnouncement => self.push_admin_announcements,
                    }
            }
            Channel::Email => {
                self.email_enabled
                    && match kind {
                        NotificationKind::SessionReminder => self.email_session_reminders,
                        NotificationKind::RsvpDeadline => self.email_rsvp_deadlines,
                        NotificationKind::WaitlistUpdate => self.email_waitlist_updates,
                        NotificationKind::AdminAnnouncement => self.email_admin_announcements,
                    }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub push_enabled: Option<bool>,
    pub push_session_reminders: Option<bool>,
    pub push_rsvp_deadlines: Option<bool>,
    pub push_waitlist_updates: Option<bool>,
    pub push_admin_announcements: Option<bool>,
    pub email_enabled: Option<bool>,
    pub email_session_reminders: Option<bool>,
    pub email_rsvp_deadlines: Option<bool>,
    pub email_waitlist_updates: Option<bool>,
    pub email_admin_announcements: Option<bool>,
}

impl PreferencesPatch {
    pub fn apply_to(&self, prefs: &mut NotificationPreferences) {
        let pairs = [
            (self.push_enabled, &mut prefs.push_enabled),
            (self.push_session_reminders, &mut prefs.push_session_reminders),
            (self.push_rsvp_deadlines, &mut prefs.push_rsvp_deadlines),
            (self.push_waitlist_updates, &mut prefs.push_waitlist_updates),
            (self.push_admin_announcements, &mut prefs.push_admin_announcements),
            (self.email_enabled, &mut prefs.email_enabled),
            (self.email_session_reminders, &mut prefs.email_session_reminders),
            (self.email_rsvp_deadlines, &mut prefs.email_rsvp_deadlines),
            (self.email_waitlist_updates, &mut prefs.email_waitlist_updates),
            (self.email_admin_announcements, &mut prefs.email_admin_announcements),
        ];
        for (value, field) in pairs {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value, // JSONB
    pub push_sent: bool,
    pub push_sent_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub device_name: Option<String>,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenInput {
    pub token: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRemoval {
    /// Removes every device token for the user when absent.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    pub title: String,
    pub body: String,
}
