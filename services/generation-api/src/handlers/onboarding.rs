//! Onboarding completion

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use truetone_db::CreateUser;
use truetone_types::{Entitlements, Product};

use crate::error::{ApiError, ApiResult};
use crate::extractors::RequireUser;
use crate::handlers::shared::require_product_access;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompleteOnboardingRequest {
    pub product: Product,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOnboardingResponse {
    pub product: Product,
    /// False when the entitlement was already held
    pub newly_granted: bool,
    pub entitlements: Entitlements,
}

/// POST /api/onboarding/complete
///
/// Creates the local user record on first contact and grants the product
/// entitlement. Safe to repeat. Accounts tied to another product are
/// redirected to the cross-sell page instead.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: Result<Json<CompleteOnboardingRequest>, JsonRejection>,
) -> ApiResult<Json<CompleteOnboardingResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // Onboarding into one product must not grant a second one.
    require_product_access(&state, &user, request.product).await?;

    state
        .users
        .ensure_exists(CreateUser {
            id: user.id.to_string(),
            email: user.email.clone(),
        })
        .await?;

    let newly_granted = state.access.grant(&user.id, request.product).await?;
    let entitlements = state.access.entitlements(&user.id).await?;

    if newly_granted {
        info!(product = %request.product, "Onboarding completed");
    }

    Ok(Json(CompleteOnboardingResponse {
        product: request.product,
        newly_granted,
        entitlements,
    }))
}
