//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use truetone_types::UsageRecord;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by identity provider subject
    async fn find_by_id(&self, id: &str) -> DbResult<Option<UserRow>>;

    /// Insert the user with free-tier defaults unless a row already exists.
    /// Returns the stored row either way.
    async fn ensure_exists(&self, user: CreateUser) -> DbResult<UserRow>;

    /// Record the next monthly reset date
    async fn update_generation_reset_date(&self, id: &str, at: DateTime<Utc>) -> DbResult<()>;
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub email: Option<String>,
}

/// Result of an atomic test-and-increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The counter was incremented; carries the post-increment record
    Consumed(UsageRecord),
    /// The ceiling was reached and nothing was written; carries the current
    /// record when one exists
    Rejected(Option<UsageRecord>),
}

/// Per counting key generation counters.
///
/// Every mutation is a single atomic store operation. Implementations never
/// hold a lock across calls.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current record for a key
    async fn find(&self, key: &str) -> DbResult<Option<UsageRow>>;

    /// Increment `used` by one if and only if `used < limit`, creating the
    /// record on first use. `reset_at` seeds the period end of new records.
    /// A zero limit rejects without touching the store.
    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        reset_at: Option<DateTime<Utc>>,
    ) -> DbResult<ConsumeOutcome>;

    /// Compare-and-swap period reset: sets `used = 0` and `reset_at = next`
    /// only while the stored `reset_at` still equals `expected`. Returns
    /// whether this call performed the reset.
    async fn reset_period(
        &self,
        key: &str,
        expected: Option<DateTime<Utc>>,
        next: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Find a published article by ID
    async fn find_published(&self, id: Uuid) -> DbResult<Option<ArticleRow>>;

    /// Published articles, newest first
    async fn list_published(&self, limit: i64) -> DbResult<Vec<ArticleRow>>;
}

/// Generation artifact repository trait
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Insert or replace the artifact for (user, article, content type)
    async fn upsert(&self, artifact: UpsertArtifact) -> DbResult<ArtifactRow>;

    /// Find the artifact for (user, article, content type)
    async fn find(
        &self,
        user_id: &str,
        article_id: Uuid,
        content_type: &str,
    ) -> DbResult<Option<ArtifactRow>>;

    /// All of a user's artifacts for an article
    async fn list_for_article(&self, user_id: &str, article_id: Uuid) -> DbResult<Vec<ArtifactRow>>;
}

/// Upsert artifact input
#[derive(Debug, Clone)]
pub struct UpsertArtifact {
    pub user_id: String,
    pub article_id: Uuid,
    pub content_type: String,
    pub content: serde_json::Value,
}
