//! Subscription handlers

use axum::extract::State;
use axum::Json;
use tracing::instrument;
use truetone_types::SubscriptionSnapshot;

use crate::error::ApiResult;
use crate::extractors::RequireUser;
use crate::state::AppState;

/// GET /api/subscription
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_subscription(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> ApiResult<Json<SubscriptionSnapshot>> {
    let snapshot = state.gate.resolver().resolve(&user.id).await?;
    Ok(Json(snapshot))
}
