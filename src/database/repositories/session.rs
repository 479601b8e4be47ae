use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::PostgresStore;
use crate::database::{
    models::{NewSession, Session, SessionFilter},
    store::SessionStore,
    utils::sql,
};
use crate::error::AppError;

pub(crate) const SESSION_COLUMNS: &str = r#"
    id,
    title,
    description,
    session_date,
    start_time,
    end_time,
    courts,
    max_players,
    rsvp_deadline,
    is_recurring,
    recurring_day_of_week,
    recurring_parent_id,
    status,
    cancellation_reason,
    created_by,
    created_at,
    updated_at
"#;

#[async_trait]
impl SessionStore for PostgresStore {
    async fn insert(&self, session: NewSession) -> Result<Session, AppError> {
        let now = Utc::now();
        let session = sqlx::query_as::<_, Session>(&sql(&format!(
            r#"
            INSERT INTO
                sessions (
                    title,
                    description,
                    session_date,
                    start_time,
                    end_time,
                    courts,
                    max_players,
                    rsvp_deadline,
                    is_recurring,
                    recurring_day_of_week,
                    recurring_parent_id,
                    created_by,
                    created_at,
                    updated_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                {SESSION_COLUMNS}
            "#
        )))
        .bind(session.title)
        .bind(session.description)
        .bind(session.session_date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.courts)
        .bind(session.max_players)
        .bind(session.rsvp_deadline)
        .bind(session.is_recurring)
        .bind(session.recurring_day_of_week)
        .bind(session.recurring_parent_id)
        .bind(session.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn insert_occurrence(&self, session: NewSession) -> Result<Option<Session>, AppError> {
        let now = Utc::now();
        let session = sqlx::query_as::<_, Session>(&sql(&format!(
            r#"
            INSERT INTO
                sessions (
                    title,
                    description,
                    session_date,
                    start_time,
                    end_time,
                    courts,
                    max_players,
                    rsvp_deadline,
                    is_recurring,
                    recurring_day_of_week,
                    recurring_parent_id,
                    created_by,
                    created_at,
                    updated_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (recurring_parent_id, session_date) DO NOTHING
            RETURNING
                {SESSION_COLUMNS}
            "#
        )))
        .bind(session.title)
        .bind(session.description)
        .bind(session.session_date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.courts)
        .bind(session.max_players)
        .bind(session.rsvp_deadline)
        .bind(session.is_recurring)
        .bind(session.recurring_day_of_week)
        .bind(session.recurring_parent_id)
        .bind(session.created_by)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(&sql(&format!(
            r#"
            SELECT
                {SESSION_COLUMNS}
            FROM
                sessions
            WHERE
                id = ?
            "#
        )))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, AppError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE TRUE"));

        if let Some(from) = filter.from_date {
            query.push(" AND session_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to_date {
            query.push(" AND session_date <= ").push_bind(to);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(status) = filter.exclude_status {
            query.push(" AND status <> ").push_bind(status);
        }
        if let Some(recurring) = filter.is_recurring {
            query.push(" AND is_recurring = ").push_bind(recurring);
        }
        if let Some(parent_id) = filter.recurring_parent_id {
            query.push(" AND recurring_parent_id = ").push_bind(parent_id);
        }
        if let Some(after) = filter.deadline_after {
            query.push(" AND rsvp_deadline > ").push_bind(after);
        }
        if let Some(until) = filter.deadline_until {
            query.push(" AND rsvp_deadline <= ").push_bind(until);
        }
        query.push(" ORDER BY session_date, start_time, created_at");

        let sessions = query
            .build_query_as::<Session>()
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    async fn update(&self, session: &Session) -> Result<Session, AppError> {
        let updated = sqlx::query_as::<_, Session>(&sql(&format!(
            r#"
            UPDATE
                sessions
            SET
                title = ?,
                description = ?,
                session_date = ?,
                start_time = ?,
                end_time = ?,
                courts = ?,
                max_players = ?,
                rsvp_deadline = ?,
                status = ?,
                cancellation_reason = ?,
                updated_at = ?
            WHERE
                id = ?
            RETURNING
                {SESSION_COLUMNS}
            "#
        )))
        .bind(&session.title)
        .bind(&session.description)
        .bind(session.session_date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.courts)
        .bind(session.max_players)
        .bind(session.rsvp_deadline)
        .bind(session.status)
        .bind(&session.cancellation_reason)
        .bind(session.updated_at)
        .bind(session.id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::not_found("Session"))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(&sql("DELETE FROM sessions WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn child_exists(&self, parent_id: Uuid, date: NaiveDate) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(&sql(r#"
            SELECT
                EXISTS (
                    SELECT
                        1
                    FROM
                        sessions
                    WHERE
                        recurring_parent_id = ?
                        AND session_date = ?
                )
            "#))
        .bind(parent_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
