use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PostgresStore;
use crate::database::{store::ReminderStore, utils::sql};
use crate::error::AppError;

#[async_trait]
impl ReminderStore for PostgresStore {
    async fn claim(
        &self,
        session_id: Uuid,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(&sql(r#"
            INSERT INTO
                reminder_dispatches (session_id, reminder_key, dispatched_at)
            VALUES
                (?, ?, ?)
            ON CONFLICT (session_id, reminder_key) DO NOTHING
            "#))
        .bind(session_id)
        .bind(key)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, session_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(&sql(
            "DELETE FROM reminder_dispatches WHERE session_id = ?",
        ))
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
