//! Postgres implementations of the storage traits.

use sqlx::PgPool;

pub mod member;
pub mod notification;
pub mod reminder;
pub mod rsvp;
pub mod session;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
