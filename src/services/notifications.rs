use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{
    models::{
        Channel, Member, MembershipStatus, NewNotification, Notification,
        NotificationKind, NotificationPreferences, PreferencesPatch, PushToken,
    },
    store::{MemberStore, NotificationStore},
};
use crate::error::AppError;
use crate::services::channels::{ChannelError, Channels, EmailMessage, render_email_html};
use crate::services::clock::Clock;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Upper bound on a single provider call.
    pub channel_timeout: Duration,
    /// Recipients dispatched at once by `send_bulk`.
    pub concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            channel_timeout: Duration::from_secs(10),
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    /// Disabled by preferences, not configured, or nothing to deliver to.
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    pub push: ChannelOutcome,
    pub email: ChannelOutcome,
}

impl Delivery {
    pub fn delivered(&self) -> bool {
        self.push == ChannelOutcome::Sent || self.email == ChannelOutcome::Sent
    }

    pub fn failed(&self) -> bool {
        !self.delivered()
            && (self.push == ChannelOutcome::Failed || self.email == ChannelOutcome::Failed)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.delivered + self.skipped + self.failed
    }
}

pub struct NotificationDispatcher {
    members: Arc<dyn MemberStore>,
    store: Arc<dyn NotificationStore>,
    channels: Channels,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
    club_name: String,
    frontend_url: String,
}

impl NotificationDispatcher {
    pub fn new(
        members: Arc<dyn MemberStore>,
        store: Arc<dyn NotificationStore>,
        channels: Channels,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            members,
            store,
            channels,
            clock,
            settings,
            club_name: "Club Sessions".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
        }
    }

    /// Name and web client address used in email bodies.
    pub fn with_branding(
        mut self,
        club_name: impl Into<String>,
        frontend_url: impl Into<String>,
    ) -> Self {
        self.club_name = club_name.into();
        self.frontend_url = frontend_url.into();
        self
    }

    /// False when no outbound channel is configured.
    pub fn is_enabled(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Records the notification, then tries push and email independently.
    /// Channel failures are reported in the returned `Delivery`, not as errors.
    pub async fn send(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<Delivery, AppError> {
        let member = self
            .members
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Member"))?;
        let prefs = self.store.get_or_create_preferences(user_id).await?;

        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id,
                kind,
                title: title.to_string(),
                body: body.to_string(),
                data: data.clone(),
            })
            .await?;

        let (push, email) = tokio::join!(
            self.deliver_push(&member, &prefs, kind, title, body, &data),
            self.deliver_email(&member, &prefs, kind, title, body),
        );

        let push_at = (push == ChannelOutcome::Sent).then(|| self.clock.now());
        let email_at = (email == ChannelOutcome::Sent).then(|| self.clock.now());
        let mut notification = notification;
        if push_at.is_some() || email_at.is_some() {
            match self
                .store
                .record_delivery(notification.id, push_at, email_at)
                .await
            {
                Ok(()) => {
                    if let Some(at) = push_at {
                        notification.push_sent = true;
                        notification.push_sent_at = Some(at);
                    }
                    if let Some(at) = email_at {
                        notification.email_sent = true;
                        notification.email_sent_at = Some(at);
                    }
                }
                Err(e) => log::error!(
                    "Failed to record delivery of notification {}: {}",
                    notification.id,
                    e
                ),
            }
        }

        Ok(Delivery {
            notification,
            push,
            email,
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ChannelError>
    where
        F: Future<Output = Result<T, ChannelError>>,
    {
        tokio::time::timeout(self.settings.channel_timeout, call)
            .await
            .unwrap_or(Err(ChannelError::Timeout(self.settings.channel_timeout)))
    }

    async fn deliver_push(
        &self,
        member: &Member,
        prefs: &NotificationPreferences,
        kind: NotificationKind,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> ChannelOutcome {
        let Some(channel) = &self.channels.push else {
            return ChannelOutcome::Skipped;
        };
        if !prefs.allows(Channel::Push, kind) {
            return ChannelOutcome::Skipped;
        }

        let tokens: Vec<String> = match self.store.list_push_tokens(member.id).await {
            Ok(tokens) => tokens.into_iter().map(|t| t.token).collect(),
            Err(e) => {
                log::warn!("Failed to load push tokens for member {}: {}", member.id, e);
                return ChannelOutcome::Failed;
            }
        };
        if tokens.is_empty() {
            return ChannelOutcome::Skipped;
        }

        match self.bounded(channel.send(&tokens, title, body, data)).await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| o.invalid_token) {
                    match self.store.delete_push_token(&outcome.token).await {
                        Ok(()) => log::info!("Removed invalid push token for member {}", member.id),
                        Err(e) => log::warn!(
                            "Failed to remove invalid push token for member {}: {}",
                            member.id,
                            e
                        ),
                    }
                }
                let sent = outcomes.iter().filter(|o| o.success).count();
                log::debug!(
                    "Push sent to {}/{} devices for member {}",
                    sent,
                    tokens.len(),
                    member.id
                );
                if sent > 0 {
                    ChannelOutcome::Sent
                } else {
                    ChannelOutcome::Failed
                }
            }
            Err(e) => {
                log::warn!("Failed to send push to member {}: {}", member.id, e);
                ChannelOutcome::Failed
            }
        }
    }

    async fn deliver_email(
        &self,
        member: &Member,
        prefs: &NotificationPreferences,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> ChannelOutcome {
        let Some(channel) = &self.channels.email else {
            return ChannelOutcome::Skipped;
        };
        if !prefs.allows(Channel::Email, kind) || member.email.trim().is_empty() {
            return ChannelOutcome::Skipped;
        }

        let message = EmailMessage {
            to: member.email.clone(),
            to_name: member.name.clone(),
            subject: title.to_string(),
            html: render_email_html(&self.club_name, &self.frontend_url, kind, title, body),
            text: body.to_string(),
        };

        match self.bounded(channel.send(&message)).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => {
                log::warn!("Failed to send email to member {}: {}", member.id, e);
                ChannelOutcome::Failed
            }
        }
    }

    /// Sends the same notification to every recipient concurrently. One
    /// recipient failing never holds up or aborts the others.
    pub async fn send_bulk(
        &self,
        user_ids: &[Uuid],
        kind: NotificationKind,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> DispatchReport {
        let data = &data;
        let results: Vec<(Uuid, Result<Delivery, AppError>)> = stream::iter(user_ids.iter().copied())
            .map(|user_id| async move {
                (
                    user_id,
                    self.send(user_id, kind, title, body, data.clone()).await,
                )
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut report = DispatchReport::default();
        for (user_id, result) in results {
            match result {
                Ok(delivery) if delivery.delivered() => report.delivered += 1,
                Ok(delivery) if delivery.failed() => report.failed += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    log::warn!("Failed to notify member {}: {}", user_id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Admin announcement to every approved member.
    pub async fn announce(&self, title: &str, body: &str) -> Result<DispatchReport, AppError> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() || body.is_empty() {
            return Err(AppError::validation("Announcement title and body are required"));
        }

        let recipients: Vec<Uuid> = self
            .members
            .list_by_membership(MembershipStatus::Approved)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let report = self
            .send_bulk(
                &recipients,
                NotificationKind::AdminAnnouncement,
                title,
                body,
                serde_json::json!({ "type": NotificationKind::AdminAnnouncement.as_str() }),
            )
            .await;

        log::info!(
            "Announcement '{}' sent: {} delivered, {} skipped, {} failed",
            title,
            report.delivered,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    pub async fn preferences(&self, user_id: Uuid) -> Result<NotificationPreferences, AppError> {
        self.store.get_or_create_preferences(user_id).await
    }

    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        patch: &PreferencesPatch,
    ) -> Result<NotificationPreferences, AppError> {
        let mut prefs = self.store.get_or_create_preferences(user_id).await?;
        patch.apply_to(&mut prefs);
        self.store.save_preferences(&prefs).await
    }

    pub async fn register_push_token(
        &self,
        user_id: Uuid,
        token: &str,
        device_name: Option<&str>,
    ) -> Result<PushToken, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("Push token is required"));
        }
        self.store
            .upsert_push_token(user_id, token, device_name, self.clock.now())
            .await
    }

    /// Forgets one device token, or every token of the member when `token` is `None`.
    pub async fn unregister_push_token(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<u64, AppError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        self.store.delete_user_push_tokens(user_id, token).await
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Notification>, AppError> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        self.store.list_notifications(user_id, limit, offset).await
    }

    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let at: DateTime<Utc> = self.clock.now();
        if self.store.mark_read(user_id, notification_id, at).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Notification"))
        }
    }
}
