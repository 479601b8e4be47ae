use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PostgresStore;
use crate::database::{
    models::{NewNotification, Notification, NotificationPreferences, PushToken},
    store::NotificationStore,
    transaction::DatabaseTransaction,
    utils::sql,
};
use crate::error::AppError;

const PREFERENCE_COLUMNS: &str = r#"
    id,
    user_id,
    push_enabled,
    push_session_reminders,
    push_rsvp_deadlines,
    push_waitlist_updates,
    push_admin_announcements,
    email_enabled,
    email_session_reminders,
    email_rsvp_deadlines,
    email_waitlist_updates,
    email_admin_announcements,
    created_at,
    updated_at
"#;

const NOTIFICATION_COLUMNS: &str = r#"
    id,
    user_id,
    kind,
    title,
    body,
    data,
    push_sent,
    push_sent_at,
    email_sent,
    email_sent_at,
    read_at,
    created_at
"#;

const PUSH_TOKEN_COLUMNS: &str = "id, user_id, token, device_name, last_used_at, created_at";

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn get_or_create_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<NotificationPreferences, AppError> {
        DatabaseTransaction::run(&self.pool, move |tx| {
            Box::pin(async move {
                let now = Utc::now();
                // Concurrent first reads race on the unique user_id; losers fall through to the SELECT.
                sqlx::query(&sql(r#"
                    INSERT INTO
                        notification_preferences (user_id, created_at, updated_at)
                    VALUES
                        (?, ?, ?)
                    ON CONFLICT (user_id) DO NOTHING
                    "#))
                .bind(user_id)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await?;

                let prefs = sqlx::query_as::<_, NotificationPreferences>(&sql(&format!(
                    "SELECT {PREFERENCE_COLUMNS} FROM notification_preferences WHERE user_id = ?"
                )))
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

                Ok(prefs)
            })
        })
        .await
    }

    async fn save_preferences(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<NotificationPreferences, AppError> {
        let saved = sqlx::query_as::<_, NotificationPreferences>(&sql(&format!(
            r#"
            UPDATE
                notification_preferences
            SET
                push_enabled = ?,
                push_session_reminders = ?,
                push_rsvp_deadlines = ?,
                push_waitlist_updates = ?,
                push_admin_announcements = ?,
                email_enabled = ?,
                email_session_reminders = ?,
                email_rsvp_deadlines = ?,
                email_waitlist_updates = ?,
                email_admin_announcements = ?,
                updated_at = ?
            WHERE
                user_id = ?
            RETURNING
                {PREFERENCE_COLUMNS}
            "#
        )))
        .bind(prefs.push_enabled)
        .bind(prefs.push_session_reminders)
        .bind(prefs.push_rsvp_deadlines)
        .bind(prefs.push_waitlist_updates)
        .bind(prefs.push_admin_announcements)
        .bind(prefs.email_enabled)
        .bind(prefs.email_session_reminders)
        .bind(prefs.email_rsvp_deadlines)
        .bind(prefs.email_waitlist_updates)
        .bind(prefs.email_admin_announcements)
        .bind(Utc::now())
        .bind(prefs.user_id)
        .fetch_optional(&self.pool)
        .await?;

        saved.ok_or_else(|| AppError::not_found("Notification preferences"))
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(&sql(&format!(
            r#"
            INSERT INTO
                notifications (user_id, kind, title, body, data, created_at)
            VALUES
                (?, ?, ?, ?, ?, ?)
            RETURNING
                {NOTIFICATION_COLUMNS}
            "#
        )))
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(notification.title)
        .bind(notification.body)
        .bind(notification.data)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn record_delivery(
        &self,
        notification_id: Uuid,
        push_sent_at: Option<DateTime<Utc>>,
        email_sent_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(&sql(r#"
            UPDATE
                notifications
            SET
                push_sent = push_sent OR ?,
                push_sent_at = COALESCE(?, push_sent_at),
                email_sent = email_sent OR ?,
                email_sent_at = COALESCE(?, email_sent_at)
            WHERE
                id = ?
            "#))
        .bind(push_sent_at.is_some())
        .bind(push_sent_at)
        .bind(email_sent_at.is_some())
        .bind(email_sent_at)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(&sql(&format!(
            r#"
            SELECT
                {NOTIFICATION_COLUMNS}
            FROM
                notifications
            WHERE
                user_id = ?
            ORDER BY
                created_at DESC
            LIMIT ? OFFSET ?
            "#
        )))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(&sql(r#"
            UPDATE
                notifications
            SET
                read_at = COALESCE(read_at, ?)
            WHERE
                id = ?
                AND user_id = ?
            "#))
        .bind(at)
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_push_tokens(&self, user_id: Uuid) -> Result<Vec<PushToken>, AppError> {
        let tokens = sqlx::query_as::<_, PushToken>(&sql(&format!(
            "SELECT {PUSH_TOKEN_COLUMNS} FROM push_tokens WHERE user_id = ? ORDER BY created_at"
        )))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn upsert_push_token(
        &self,
        user_id: Uuid,
        token: &str,
        device_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PushToken, AppError> {
        let push_token = sqlx::query_as::<_, PushToken>(&sql(&format!(
            r#"
            INSERT INTO
                push_tokens (user_id, token, device_name, last_used_at, created_at)
            VALUES
                (?, ?, ?, ?, ?)
            ON CONFLICT (token) DO UPDATE
            SET
                user_id = EXCLUDED.user_id,
                device_name = EXCLUDED.device_name,
                last_used_at = EXCLUDED.last_used_at
            RETURNING
                {PUSH_TOKEN_COLUMNS}
            "#
        )))
        .bind(user_id)
        .bind(token)
        .bind(device_name)
        .bind(at)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(push_token)
    }

    async fn delete_push_token(&self, token: &str) -> Result<(), AppError> {
        sqlx::query(&sql("DELETE FROM push_tokens WHERE token = ?"))
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_user_push_tokens(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<u64, AppError> {
        let result = match token {
            Some(token) => {
                sqlx::query(&sql("DELETE FROM push_tokens WHERE user_id = ? AND token = ?"))
                    .bind(user_id)
                    .bind(token)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&sql("DELETE FROM push_tokens WHERE user_id = ?"))
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected())
    }
}
