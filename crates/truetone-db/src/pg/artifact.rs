//! PostgreSQL generation artifact repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::ArtifactRow;
use crate::repo::{ArtifactRepository, UpsertArtifact};

/// PostgreSQL artifact repository
#[derive(Clone)]
pub struct PgArtifactRepository {
    pool: PgPool,
}

impl PgArtifactRepository {
    /// Create a new artifact repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepository for PgArtifactRepository {
    async fn upsert(&self, artifact: UpsertArtifact) -> DbResult<ArtifactRow> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            r#"
            INSERT INTO generation_artifacts (id, user_id, article_id, content_type, content)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, article_id, content_type) DO UPDATE
                SET content = EXCLUDED.content, updated_at = NOW()
            RETURNING id, user_id, article_id, content_type, content, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&artifact.user_id)
        .bind(artifact.article_id)
        .bind(&artifact.content_type)
        .bind(&artifact.content)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find(
        &self,
        user_id: &str,
        article_id: Uuid,
        content_type: &str,
    ) -> DbResult<Option<ArtifactRow>> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT id, user_id, article_id, content_type, content, created_at, updated_at
            FROM generation_artifacts
            WHERE user_id = $1 AND article_id = $2 AND content_type = $3
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .bind(content_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_for_article(&self, user_id: &str, article_id: Uuid) -> DbResult<Vec<ArtifactRow>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT id, user_id, article_id, content_type, content, created_at, updated_at
            FROM generation_artifacts
            WHERE user_id = $1 AND article_id = $2
            ORDER BY content_type
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
