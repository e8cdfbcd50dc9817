//! Gate errors

use thiserror::Error;
use truetone_types::{Product, QuotaDecision, UserId};

/// Errors raised while gating and serving generations.
///
/// Quota, identity and product-access variants are typed signals for the
/// HTTP layer. Only `StoreUnavailable` is an infrastructure failure.
#[derive(Error, Debug)]
pub enum GateError {
    /// The principal has no generations left
    #[error("generation quota exceeded ({}/{} used)", .0.used, .0.limit)]
    QuotaExceeded(QuotaDecision),

    /// Authenticated subject has no user record
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// User belongs to another product and must be redirected
    #[error("user belongs to {source_product}")]
    CrossProductAccess {
        source_product: Product,
        email: Option<String>,
    },

    /// A backing store could not be reached or returned garbage
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The LLM provider failed to produce a stream
    #[error("generation stream failed: {0}")]
    GenerationStreamFailure(String),

    /// Invalid token (malformed, bad signature, wrong issuer, etc.)
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,
}

impl GateError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::QuotaExceeded(_) => 429,
            Self::CrossProductAccess { .. } => 303,
            Self::InvalidToken | Self::TokenExpired => 401,
            Self::UserNotFound(_) => 404,
            Self::GenerationStreamFailure(_) => 502,
            Self::StoreUnavailable(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CrossProductAccess { .. } => "CROSS_PRODUCT_ACCESS",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::GenerationStreamFailure(_) => "GENERATION_FAILED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
        }
    }
}

impl From<truetone_db::DbError> for GateError {
    fn from(err: truetone_db::DbError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truetone_types::QuotaTier;

    #[test]
    fn test_status_codes() {
        let decision = QuotaDecision::deny(3, 3, QuotaTier::Anonymous, None);
        assert_eq!(GateError::QuotaExceeded(decision).status_code(), 429);
        let redirect = GateError::CrossProductAccess {
            source_product: Product::TrueTone,
            email: None,
        };
        assert_eq!(redirect.status_code(), 303);
        assert_eq!(redirect.to_string(), "user belongs to truetone");
        assert_eq!(GateError::StoreUnavailable("down".into()).status_code(), 500);
        assert_eq!(GateError::GenerationStreamFailure("x".into()).status_code(), 502);
    }

    #[test]
    fn test_db_error_maps_to_store_unavailable() {
        let err: GateError = truetone_db::DbError::NotFound.into();
        assert!(matches!(err, GateError::StoreUnavailable(_)));
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }
}
