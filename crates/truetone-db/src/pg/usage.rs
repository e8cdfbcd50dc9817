//! PostgreSQL usage store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::DbResult;
use crate::models::UsageRow;
use crate::repo::{ConsumeOutcome, UsageStore};

/// PostgreSQL usage store
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    /// Create a new usage store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn find(&self, key: &str) -> DbResult<Option<UsageRow>> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT counting_key, used, usage_limit, reset_at, updated_at
            FROM generation_usage
            WHERE counting_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        reset_at: Option<DateTime<Utc>>,
    ) -> DbResult<ConsumeOutcome> {
        if limit == 0 {
            let current = self.find(key).await?;
            return Ok(ConsumeOutcome::Rejected(current.map(|row| row.record())));
        }

        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        // Single statement: the row lock taken by ON CONFLICT serializes
        // concurrent increments, and the WHERE clause turns an exhausted
        // counter into an empty RETURNING set.
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO generation_usage (counting_key, used, usage_limit, reset_at)
            VALUES ($1, 1, $2, $3)
            ON CONFLICT (counting_key) DO UPDATE
                SET used = generation_usage.used + 1,
                    usage_limit = EXCLUDED.usage_limit,
                    updated_at = NOW()
                WHERE generation_usage.used < EXCLUDED.usage_limit
            RETURNING counting_key, used, usage_limit, reset_at, updated_at
            "#,
        )
        .bind(key)
        .bind(limit)
        .bind(reset_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(ConsumeOutcome::Consumed(row.record())),
            None => {
                let current = self.find(key).await?;
                Ok(ConsumeOutcome::Rejected(current.map(|row| row.record())))
            }
        }
    }

    async fn reset_period(
        &self,
        key: &str,
        expected: Option<DateTime<Utc>>,
        next: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE generation_usage
            SET used = 0, reset_at = $3, updated_at = NOW()
            WHERE counting_key = $1 AND reset_at IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(key)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
