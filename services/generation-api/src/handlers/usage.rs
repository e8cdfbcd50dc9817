//! Quota snapshot handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::instrument;
use truetone_types::QuotaTier;

use crate::error::ApiResult;
use crate::extractors::RequestPrincipal;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub tier: QuotaTier,
    pub can_generate: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/usage
///
/// Advisory only: the number may be stale by the time the next generation
/// is attempted.
#[instrument(skip_all)]
pub async fn get_usage(
    State(state): State<AppState>,
    RequestPrincipal(principal): RequestPrincipal,
) -> ApiResult<Json<UsageResponse>> {
    let snapshot = state.gate.status(&principal).await?;

    Ok(Json(UsageResponse {
        used: snapshot.used,
        limit: snapshot.limit,
        remaining: snapshot.remaining,
        tier: snapshot.tier,
        can_generate: snapshot.allowed,
        authenticated: principal.is_authenticated(),
        message: snapshot.message,
    }))
}
