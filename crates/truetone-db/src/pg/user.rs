//! PostgreSQL user repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::DbResult;
use crate::models::UserRow;
use crate::repo::{CreateUser, UserRepository};

/// PostgreSQL user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, tier, subscription_status, monthly_generation_limit,
                   generation_reset_date, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn ensure_exists(&self, user: CreateUser) -> DbResult<UserRow> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
                SET email = COALESCE(users.email, EXCLUDED.email)
            RETURNING id, email, tier, subscription_status, monthly_generation_limit,
                      generation_reset_date, created_at, updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_generation_reset_date(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "UPDATE users SET generation_reset_date = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
