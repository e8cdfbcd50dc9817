//! Axum extractors for the acting principal

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use truetone_core::RequestCredentials;
use truetone_types::{AuthenticatedUser, Principal};

use crate::error::ApiError;
use crate::state::AppState;

/// The principal behind a request, authenticated or anonymous. Never
/// rejects: bad or missing tokens resolve to an anonymous visitor.
#[derive(Debug, Clone)]
pub struct RequestPrincipal(pub Principal);

impl<S> FromRequestParts<S> for RequestPrincipal
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let credentials = extract_credentials(parts, &app_state);
        Ok(Self(app_state.identity.resolve(&credentials).await))
    }
}

/// An authenticated user; rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = match RequestPrincipal::from_request_parts(parts, state).await {
            Ok(RequestPrincipal(principal)) => principal,
            Err(never) => match never {},
        };
        match principal {
            Principal::Authenticated(user) => Ok(Self(user)),
            Principal::Anonymous(_) => Err(ApiError::Unauthorized),
        }
    }
}

/// Collect identity inputs from headers, cookies and the connection
fn extract_credentials(parts: &Parts, state: &AppState) -> RequestCredentials {
    let peer_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip());

    let mut credentials = RequestCredentials::new(peer_ip);

    if let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        credentials = credentials.with_bearer_token(token.trim());
    }

    if let Some(token) = cookie_value(&parts.headers, &state.config.auth_cookie_name) {
        credentials = credentials.with_auth_cookie(token);
    }

    if let Some(session) = cookie_value(&parts.headers, &state.config.anon_session_cookie_name) {
        credentials = credentials.with_session_cookie(session);
    }

    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        credentials = credentials.with_forwarded_for(forwarded);
    }

    credentials
}

/// Value of the named cookie across all Cookie headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.trim().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; tt_session=abc123"));
        headers.append(header::COOKIE, HeaderValue::from_static("kinde_access_token=jwt.value.sig"));

        assert_eq!(cookie_value(&headers, "tt_session").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "kinde_access_token").as_deref(), Some("jwt.value.sig"));
        assert_eq!(cookie_value(&headers, "session").as_deref(), None);
    }
}
