use async_trait::async_trait;
use uuid::Uuid;

use super::{PostgresStore, session::SESSION_COLUMNS};
use crate::database::{
    models::{AppliedRsvp, Rsvp, RsvpChange, RsvpCounts, RsvpStatus, Session},
    store::{RsvpPolicy, RsvpStore},
    utils::sql,
};
use crate::error::AppError;

const RSVP_COLUMNS: &str = r#"
    id,
    session_id,
    user_id,
    status,
    rsvp_timestamp,
    is_late_rsvp,
    added_by_admin,
    created_at,
    updated_at
"#;

#[async_trait]
impl RsvpStore for PostgresStore {
    async fn apply_rsvp(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        policy: &RsvpPolicy<'_>,
    ) -> Result<AppliedRsvp, AppError> {
        // Dropping `tx` on any early return rolls back and releases the locks.
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, Session>(&sql(&format!(
            r#"
            SELECT
                {SESSION_COLUMNS}
            FROM
                sessions
            WHERE
                id = ?
            FOR UPDATE
            "#
        )))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Session"))?;

        let existing = sqlx::query_as::<_, Rsvp>(&sql(&format!(
            r#"
            SELECT
                {RSVP_COLUMNS}
            FROM
                rsvps
            WHERE
                session_id = ?
                AND user_id = ?
            FOR UPDATE
            "#
        )))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let change = policy(&session, existing.as_ref())?;

        let rsvp = match (change, existing) {
            (
                RsvpChange::Create {
                    status,
                    is_late,
                    added_by_admin,
                    at,
                },
                None,
            ) => {
                sqlx::query_as::<_, Rsvp>(&sql(&format!(
                    r#"
                    INSERT INTO
                        rsvps (
                            session_id,
                            user_id,
                            status,
                            rsvp_timestamp,
                            is_late_rsvp,
                            added_by_admin,
                            created_at,
                            updated_at
                        )
                    VALUES
                        (?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING
                        {RSVP_COLUMNS}
                    "#
                )))
                .bind(session_id)
                .bind(user_id)
                .bind(status)
                .bind(at)
                .bind(is_late)
                .bind(added_by_admin)
                .bind(at)
                .bind(at)
                .fetch_one(&mut *tx)
                .await?
            }
            (
                RsvpChange::Update {
                    status,
                    added_by_admin,
                    at,
                },
                Some(current),
            ) => {
                sqlx::query_as::<_, Rsvp>(&sql(&format!(
                    r#"
                    UPDATE
                        rsvps
                    SET
                        status = ?,
                        added_by_admin = added_by_admin OR ?,
                        updated_at = ?
                    WHERE
                        id = ?
                    RETURNING
                        {RSVP_COLUMNS}
                    "#
                )))
                .bind(status)
                .bind(added_by_admin)
                .bind(at)
                .bind(current.id)
                .fetch_one(&mut *tx)
                .await?
            }
            (RsvpChange::Delete, Some(current)) => {
                sqlx::query(&sql("DELETE FROM rsvps WHERE id = ?"))
                    .bind(current.id)
                    .execute(&mut *tx)
                    .await?;
                current
            }
            (RsvpChange::Create { .. }, Some(_)) => {
                return Err(AppError::internal_server_error_message(
                    "RSVP already exists",
                ));
            }
            (_, None) => return Err(AppError::not_found("RSVP")),
        };

        tx.commit().await?;

        Ok(AppliedRsvp { session, rsvp })
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Rsvp>, AppError> {
        let rsvps = sqlx::query_as::<_, Rsvp>(&sql(&format!(
            r#"
            SELECT
                {RSVP_COLUMNS}
            FROM
                rsvps
            WHERE
                session_id = ?
            ORDER BY
                rsvp_timestamp,
                created_at,
                id
            "#
        )))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rsvps)
    }

    async fn find(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Rsvp>, AppError> {
        let rsvp = sqlx::query_as::<_, Rsvp>(&sql(&format!(
            r#"
            SELECT
                {RSVP_COLUMNS}
            FROM
                rsvps
            WHERE
                session_id = ?
                AND user_id = ?
            "#
        )))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rsvp)
    }

    async fn list_by_status(
        &self,
        session_id: Uuid,
        status: RsvpStatus,
    ) -> Result<Vec<Rsvp>, AppError> {
        let rsvps = sqlx::query_as::<_, Rsvp>(&sql(&format!(
            r#"
            SELECT
                {RSVP_COLUMNS}
            FROM
                rsvps
            WHERE
                session_id = ?
                AND status = ?
            ORDER BY
                rsvp_timestamp,
                created_at,
                id
            "#
        )))
        .bind(session_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rsvps)
    }

    async fn count_by_status(&self, session_id: Uuid) -> Result<RsvpCounts, AppError> {
        let (total_in, total_out, total_maybe) = sqlx::query_as::<_, (i64, i64, i64)>(&sql(r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'in'),
                COUNT(*) FILTER (WHERE status = 'out'),
                COUNT(*) FILTER (WHERE status = 'maybe')
            FROM
                rsvps
            WHERE
                session_id = ?
            "#))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RsvpCounts {
            total_in,
            total_out,
            total_maybe,
        })
    }

    async fn exists_for_session(&self, session_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(&sql(
            "SELECT EXISTS (SELECT 1 FROM rsvps WHERE session_id = ?)",
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
