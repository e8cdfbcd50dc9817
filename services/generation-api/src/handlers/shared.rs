//! Shared handler utilities

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use truetone_core::GateError;
use truetone_types::{AuthenticatedUser, Product, QuotaDecision};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const GENERATIONS_USED: HeaderName = HeaderName::from_static("x-generations-used");
pub const GENERATIONS_LIMIT: HeaderName = HeaderName::from_static("x-generations-limit");
pub const GENERATIONS_REMAINING: HeaderName = HeaderName::from_static("x-generations-remaining");
pub const GENERATION_TIER: HeaderName = HeaderName::from_static("x-generation-tier");

/// Maximum articles returned by a listing
pub const MAX_ARTICLE_PAGE: i64 = 100;

/// Assert the user may use `product`, turning a cross-product hit into a
/// redirect to the configured cross-sell page.
pub async fn require_product_access(
    state: &AppState,
    user: &AuthenticatedUser,
    product: Product,
) -> ApiResult<()> {
    match state.access.assert_product_access(user, product).await {
        Ok(()) => Ok(()),
        Err(GateError::CrossProductAccess {
            source_product,
            email,
        }) => Err(ApiError::CrossProductRedirect(cross_product_location(
            &state.config.cross_product_redirect_url,
            source_product,
            email.as_deref(),
        ))),
        Err(e) => Err(e.into()),
    }
}

/// `{base}?source=<product>&email=<email>`, appending to an existing query
pub fn cross_product_location(base: &str, source: Product, email: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("source", source.as_str());
    if let Some(email) = email {
        query.append_pair("email", email);
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{}", query.finish())
}

/// Quota snapshot headers for a successful generation
pub fn quota_headers(decision: &QuotaDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(GENERATIONS_USED, HeaderValue::from(decision.used));
    headers.insert(GENERATIONS_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(GENERATIONS_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        GENERATION_TIER,
        HeaderValue::from_static(decision.tier.as_str()),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use truetone_types::QuotaTier;

    #[test]
    fn test_cross_product_location() {
        assert_eq!(
            cross_product_location("/cross-product", Product::TrueTone, Some("a+b@example.com")),
            "/cross-product?source=truetone&email=a%2Bb%40example.com"
        );
        assert_eq!(
            cross_product_location("https://truetone.app/welcome?ref=nl", Product::Newsletter, None),
            "https://truetone.app/welcome?ref=nl&source=newsletter"
        );
    }

    #[test]
    fn test_quota_headers() {
        let headers = quota_headers(&QuotaDecision::allow(2, 5, QuotaTier::Free));
        assert_eq!(headers[GENERATIONS_USED], "2");
        assert_eq!(headers[GENERATIONS_LIMIT], "5");
        assert_eq!(headers[GENERATIONS_REMAINING], "3");
        assert_eq!(headers[GENERATION_TIER], "free");
    }
}
