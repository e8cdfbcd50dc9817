//! Article and artifact handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;
use truetone_types::{Article, GenerationArtifact, Product};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extractors::RequireUser;
use crate::handlers::shared::{require_product_access, MAX_ARTICLE_PAGE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    pub limit: Option<i64>,
}

/// GET /api/articles
#[instrument(skip_all)]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_ARTICLE_PAGE);
    let rows = state.articles.list_published(limit).await?;
    Ok(Json(rows.into_iter().map(Article::from).collect()))
}

/// GET /api/articles/{id}/artifacts
#[instrument(skip_all, fields(user_id = %user.id, article_id = %article_id))]
pub async fn list_artifacts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(article_id): Path<Uuid>,
) -> ApiResult<Json<Vec<GenerationArtifact>>> {
    require_product_access(&state, &user, Product::Newsletter).await?;

    state
        .articles
        .find_published(article_id)
        .await?
        .ok_or(ApiError::ArticleNotFound)?;

    let artifacts = state
        .artifacts
        .list_for_article(user.id.as_str(), article_id)
        .await?
        .iter()
        .map(|row| row.artifact())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(artifacts))
}
