//! Outbound delivery channels.
//!
//! The dispatcher only sees the `PushChannel` / `EmailChannel` traits. The
//! HTTP implementations talk to a push gateway and a transactional email API
//! with JSON bodies and bearer keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::database::models::NotificationKind;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Per-token result reported by the push provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub token: String,
    pub success: bool,
    /// The provider no longer accepts this token; the caller should forget it.
    pub invalid_token: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<Vec<PushOutcome>, ChannelError>;
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError>;
}

const INVALID_TOKEN_ERRORS: &[&str] = &["unregistered", "invalid_token"];

#[derive(Serialize)]
struct PushRequest<'a> {
    tokens: &'a [String],
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct PushResponse {
    #[serde(default)]
    results: Vec<PushResult>,
}

#[derive(Deserialize)]
struct PushResult {
    token: String,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpPushChannel {
    client: Client,
    url: String,
    key: Option<String>,
}

impl HttpPushChannel {
    pub fn new(client: Client, url: impl Into<String>, key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            key,
        }
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn send(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<Vec<PushOutcome>, ChannelError> {
        let mut request = self.client.post(&self.url).json(&PushRequest {
            tokens,
            title,
            body,
            data,
        });
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<PushResponse>().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|result| PushOutcome {
                invalid_token: result
                    .error
                    .as_deref()
                    .is_some_and(|e| INVALID_TOKEN_ERRORS.contains(&e)),
                token: result.token,
                success: result.success,
                error: result.error,
            })
            .collect())
    }
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    to_name: &'a str,
    from: &'a str,
    from_name: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

pub struct HttpEmailChannel {
    client: Client,
    url: String,
    key: Option<String>,
    from: String,
    from_name: String,
}

impl HttpEmailChannel {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        key: Option<String>,
        from: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            key,
            from: from.into(),
            from_name: from_name.into(),
        }
    }
}

#[async_trait]
impl EmailChannel for HttpEmailChannel {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        let mut request = self.client.post(&self.url).json(&EmailRequest {
            to: &message.to,
            to_name: &message.to_name,
            from: &self.from,
            from_name: &self.from_name,
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        });
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChannelError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Channels built from configuration. A channel without a URL is absent.
#[derive(Default, Clone)]
pub struct Channels {
    pub push: Option<Arc<dyn PushChannel>>,
    pub email: Option<Arc<dyn EmailChannel>>,
}

impl Channels {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(config.channel_timeout()).build()?;

        let push = config.push_gateway_url.as_ref().map(|url| {
            Arc::new(HttpPushChannel::new(
                client.clone(),
                url.clone(),
                config.push_gateway_key.clone(),
            )) as Arc<dyn PushChannel>
        });

        let email = config.email_api_url.as_ref().map(|url| {
            Arc::new(HttpEmailChannel::new(
                client.clone(),
                url.clone(),
                config.email_api_key.clone(),
                config.email_from.clone(),
                config.email_from_name.clone(),
            )) as Arc<dyn EmailChannel>
        });

        Ok(Self { push, email })
    }

    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.email.is_none()
    }
}

fn kind_icon(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::SessionReminder => "⏰",
        NotificationKind::RsvpDeadline => "📅",
        NotificationKind::WaitlistUpdate => "🎉",
        NotificationKind::AdminAnnouncement => "📢",
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// HTML body for notification emails, linking back to the dashboard and the
/// preferences page of the web client.
pub fn render_email_html(
    club_name: &str,
    frontend_url: &str,
    kind: NotificationKind,
    title: &str,
    body: &str,
) -> String {
    let base = frontend_url.trim_end_matches('/');
    let club_name = escape_html(club_name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 0; background-color: #f8fafc;">
    <div style="background-color: #0891b2; color: white; padding: 24px; text-align: center;">
        <h1 style="margin: 0; font-size: 24px;">🏸 {club_name}</h1>
    </div>
    <div style="padding: 24px; background-color: white;">
        <div style="font-size: 32px; text-align: center; margin-bottom: 16px;">{icon}</div>
        <h2 style="color: #1e293b; margin-top: 0;">{title}</h2>
        <p style="color: #475569; font-size: 16px; line-height: 1.6;">{body}</p>
        <div style="text-align: center; margin-top: 24px;">
            <a href="{base}/dashboard" style="display: inline-block; background-color: #0891b2; color: white; padding: 12px 24px; text-decoration: none; border-radius: 8px; font-weight: 600;">View Dashboard</a>
        </div>
    </div>
    <div style="background-color: #f1f5f9; padding: 16px; text-align: center; font-size: 12px; color: #64748b;">
        <p style="margin: 0 0 8px 0;">You received this email because you have notifications enabled for {club_name}.</p>
        <p style="margin: 0;"><a href="{base}/profile" style="color: #0891b2;">Manage your notification preferences</a></p>
    </div>
</body>
</html>"#,
        icon = kind_icon(kind),
        title = escape_html(title),
        body = escape_html(body),
    )
}
