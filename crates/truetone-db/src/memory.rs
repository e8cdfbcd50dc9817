//! In-memory repository implementations
//!
//! Backed by `DashMap`. Used with `STORAGE_BACKEND=memory` and in tests.
//! The usage store's atomic primitive is the map entry: the shard write lock
//! is held for the whole test-and-increment of one key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;
use crate::repo::*;

/// In-memory user repository
#[derive(Default, Clone)]
pub struct MemoryUserRepository {
    users: Arc<DashMap<String, UserRow>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user row directly
    pub fn insert(&self, user: UserRow) {
        self.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        Ok(self.users.get(id).map(|r| r.value().clone()))
    }

    async fn ensure_exists(&self, user: CreateUser) -> DbResult<UserRow> {
        let mut row = self
            .users
            .entry(user.id.clone())
            .or_insert_with(|| UserRow::new(user.id.clone(), user.email.clone()));
        if row.email.is_none() && user.email.is_some() {
            row.email = user.email;
        }
        Ok(row.value().clone())
    }

    async fn update_generation_reset_date(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        if let Some(mut row) = self.users.get_mut(id) {
            row.generation_reset_date = Some(at);
            row.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory usage store
#[derive(Default, Clone)]
pub struct MemoryUsageStore {
    rows: Arc<DashMap<String, UsageRow>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter directly
    pub fn insert(&self, row: UsageRow) {
        self.rows.insert(row.counting_key.clone(), row);
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn find(&self, key: &str) -> DbResult<Option<UsageRow>> {
        Ok(self.rows.get(key).map(|r| r.value().clone()))
    }

    async fn try_consume(
        &self,
        key: &str,
        limit: u32,
        reset_at: Option<DateTime<Utc>>,
    ) -> DbResult<ConsumeOutcome> {
        if limit == 0 {
            return Ok(ConsumeOutcome::Rejected(
                self.rows.get(key).map(|r| r.record()),
            ));
        }

        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        match self.rows.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                if row.used >= limit {
                    return Ok(ConsumeOutcome::Rejected(Some(row.record())));
                }
                row.used += 1;
                row.usage_limit = limit;
                row.updated_at = Utc::now();
                Ok(ConsumeOutcome::Consumed(row.record()))
            }
            Entry::Vacant(entry) => {
                let row = entry.insert(UsageRow {
                    counting_key: key.to_string(),
                    used: 1,
                    usage_limit: limit,
                    reset_at,
                    updated_at: Utc::now(),
                });
                Ok(ConsumeOutcome::Consumed(row.record()))
            }
        }
    }

    async fn reset_period(
        &self,
        key: &str,
        expected: Option<DateTime<Utc>>,
        next: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(mut row) = self.rows.get_mut(key) else {
            return Ok(false);
        };
        if row.reset_at != expected {
            return Ok(false);
        }
        row.used = 0;
        row.reset_at = Some(next);
        row.updated_at = Utc::now();
        Ok(true)
    }
}

/// In-memory article repository
#[derive(Default, Clone)]
pub struct MemoryArticleRepository {
    articles: Arc<DashMap<Uuid, ArticleRow>>,
}

impl MemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an article directly
    pub fn insert(&self, article: ArticleRow) {
        self.articles.insert(article.id, article);
    }

    /// A published article with the given title and body
    pub fn published(title: &str, content: &str) -> ArticleRow {
        let now = Utc::now();
        ArticleRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            summary: None,
            content: content.to_string(),
            source_url: None,
            published: true,
            published_at: Some(now),
            created_at: now,
        }
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticleRepository {
    async fn find_published(&self, id: Uuid) -> DbResult<Option<ArticleRow>> {
        Ok(self
            .articles
            .get(&id)
            .filter(|r| r.published)
            .map(|r| r.value().clone()))
    }

    async fn list_published(&self, limit: i64) -> DbResult<Vec<ArticleRow>> {
        let mut rows: Vec<ArticleRow> = self
            .articles
            .iter()
            .filter(|r| r.published)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

type ArtifactKey = (String, Uuid, String);

/// In-memory artifact repository
#[derive(Default, Clone)]
pub struct MemoryArtifactRepository {
    artifacts: Arc<DashMap<ArtifactKey, ArtifactRow>>,
}

impl MemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactRepository for MemoryArtifactRepository {
    async fn upsert(&self, artifact: UpsertArtifact) -> DbResult<ArtifactRow> {
        let key = (
            artifact.user_id.clone(),
            artifact.article_id,
            artifact.content_type.clone(),
        );
        let now = Utc::now();
        let mut row = self.artifacts.entry(key).or_insert_with(|| ArtifactRow {
            id: Uuid::new_v4(),
            user_id: artifact.user_id.clone(),
            article_id: artifact.article_id,
            content_type: artifact.content_type.clone(),
            content: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        });
        row.content = artifact.content;
        row.updated_at = now;
        Ok(row.value().clone())
    }

    async fn find(
        &self,
        user_id: &str,
        article_id: Uuid,
        content_type: &str,
    ) -> DbResult<Option<ArtifactRow>> {
        let key = (user_id.to_string(), article_id, content_type.to_string());
        Ok(self.artifacts.get(&key).map(|r| r.value().clone()))
    }

    async fn list_for_article(&self, user_id: &str, article_id: Uuid) -> DbResult<Vec<ArtifactRow>> {
        let mut rows: Vec<ArtifactRow> = self
            .artifacts
            .iter()
            .filter(|r| r.user_id == user_id && r.article_id == article_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| a.content_type.cmp(&b.content_type));
        Ok(rows)
    }
}
