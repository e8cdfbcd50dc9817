//! PostgreSQL article repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::ArticleRow;
use crate::repo::ArticleRepository;

/// PostgreSQL article repository
#[derive(Clone)]
pub struct PgArticleRepository {
    pool: PgPool,
}

impl PgArticleRepository {
    /// Create a new article repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn find_published(&self, id: Uuid) -> DbResult<Option<ArticleRow>> {
        let article = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, summary, content, source_url, published,
                   published_at, created_at
            FROM articles
            WHERE id = $1 AND published
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    async fn list_published(&self, limit: i64) -> DbResult<Vec<ArticleRow>> {
        let articles = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, summary, content, source_url, published,
                   published_at, created_at
            FROM articles
            WHERE published
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }
}
