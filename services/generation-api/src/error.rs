//! Error types for the Generation API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use truetone_core::GateError;
use truetone_types::{QuotaDecision, QuotaTier};

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Body of a 429 response. Flat, as the web client reads these fields
/// directly.
#[derive(Debug, Serialize)]
pub struct QuotaExceededResponse {
    pub error: String,
    pub remaining: u32,
    pub limit: u32,
    pub used: u32,
    pub tier: QuotaTier,
}

impl From<QuotaDecision> for QuotaExceededResponse {
    fn from(decision: QuotaDecision) -> Self {
        Self {
            error: decision
                .message
                .unwrap_or_else(|| "Generation limit reached".to_string()),
            remaining: decision.remaining,
            limit: decision.limit,
            used: decision.used,
            tier: decision.tier,
        }
    }
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Generation quota exceeded")]
    QuotaExceeded(QuotaDecision),

    #[error("This account belongs to another product")]
    CrossProductRedirect(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Article not found")]
    ArticleNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error")]
    Database(#[from] truetone_db::DbError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::CrossProductRedirect(_) => StatusCode::SEE_OTHER,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::ArticleNotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::CrossProductRedirect(_) => "CROSS_PRODUCT_ACCESS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::ArticleNotFound => "ARTICLE_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::GenerationFailed(_) => "GENERATION_FAILED",
            Self::Internal(_) | Self::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::QuotaExceeded(decision) => Self::QuotaExceeded(decision),
            GateError::UserNotFound(_) => Self::UserNotFound,
            // Redirects need the configured target; handlers map these
            // through `shared::require_product_access`.
            GateError::CrossProductAccess { source_product, .. } => {
                Self::Forbidden(format!("account belongs to {source_product}"))
            }
            GateError::InvalidToken | GateError::TokenExpired => Self::Unauthorized,
            GateError::GenerationStreamFailure(message) => Self::GenerationFailed(message),
            GateError::StoreUnavailable(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::QuotaExceeded(decision) => {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(QuotaExceededResponse::from(decision)),
                )
                    .into_response();
            }
            Self::CrossProductRedirect(location) => return Redirect::to(&location).into_response(),
            other => other,
        };

        // Log internal errors
        if matches!(
            err,
            Self::Internal(_) | Self::Database(_) | Self::GenerationFailed(_)
        ) {
            tracing::error!(error = ?err, "Internal API error");
        }

        // Store and database detail stays in the log.
        let message = match &err {
            Self::Internal(_) | Self::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: err.error_code().to_string(),
                message,
            },
        };

        (err.status_code(), Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
