use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::PostgresStore;
use crate::database::{
    models::{Member, MembershipStatus, NewMember},
    store::MemberStore,
    utils::sql,
};
use crate::error::AppError;

const MEMBER_COLUMNS: &str = r#"
    id,
    subject,
    email,
    name,
    avatar_url,
    role,
    membership_status,
    created_at,
    updated_at
"#;

#[async_trait]
impl MemberStore for PostgresStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<_, Member>(&sql(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"
        )))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<_, Member>(&sql(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE subject = ?"
        )))
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    async fn insert(&self, member: NewMember) -> Result<Member, AppError> {
        let now = Utc::now();
        let member = sqlx::query_as::<_, Member>(&sql(&format!(
            r#"
            INSERT INTO
                members (
                    subject,
                    email,
                    name,
                    avatar_url,
                    role,
                    membership_status,
                    created_at,
                    updated_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                {MEMBER_COLUMNS}
            "#
        )))
        .bind(member.subject)
        .bind(member.email)
        .bind(member.name)
        .bind(member.avatar_url)
        .bind(member.role)
        .bind(member.membership_status)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    async fn update(&self, member: &Member) -> Result<Member, AppError> {
        let updated = sqlx::query_as::<_, Member>(&sql(&format!(
            r#"
            UPDATE
                members
            SET
                email = ?,
                name = ?,
                avatar_url = ?,
                role = ?,
                membership_status = ?,
                updated_at = ?
            WHERE
                id = ?
            RETURNING
                {MEMBER_COLUMNS}
            "#
        )))
        .bind(&member.email)
        .bind(&member.name)
        .bind(&member.avatar_url)
        .bind(member.role)
        .bind(member.membership_status)
        .bind(Utc::now())
        .bind(member.id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::not_found("Member"))
    }

    async fn list_by_membership(
        &self,
        status: MembershipStatus,
    ) -> Result<Vec<Member>, AppError> {
        let members = sqlx::query_as::<_, Member>(&sql(&format!(
            r#"
            SELECT
                {MEMBER_COLUMNS}
            FROM
                members
            WHERE
                membership_status = ?
            ORDER BY
                created_at
            "#
        )))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
