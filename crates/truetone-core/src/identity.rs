//! Identity resolution
//!
//! Turns the raw credentials of a request into exactly one [`Principal`].
//! Resolution never fails: when no candidate token verifies, the request is
//! anonymous.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use truetone_types::{AnonymousVisitor, AuthenticatedUser, Principal};

use crate::{GateError, TokenValidator};

/// Verifies an identity token and returns the user it identifies
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, GateError>;
}

#[async_trait]
impl TokenVerifier for TokenValidator {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, GateError> {
        let claims = self.validate(token).await?;
        let mut user = AuthenticatedUser::new(claims.sub);
        user.email = claims.email;
        Ok(user)
    }
}

/// Raw identity coordinates extracted from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCredentials {
    /// `Authorization: Bearer` token
    pub bearer_token: Option<String>,
    /// Auth cookie value
    pub auth_cookie: Option<String>,
    /// Anonymous session cookie value
    pub session_cookie: Option<String>,
    /// Raw `X-Forwarded-For` header
    pub forwarded_for: Option<String>,
    /// Connection peer address
    pub peer_ip: IpAddr,
}

impl RequestCredentials {
    /// Credentials for a bare connection
    pub fn new(peer_ip: IpAddr) -> Self {
        Self {
            bearer_token: None,
            auth_cookie: None,
            session_cookie: None,
            forwarded_for: None,
            peer_ip,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_auth_cookie(mut self, token: impl Into<String>) -> Self {
        self.auth_cookie = Some(token.into());
        self
    }

    pub fn with_session_cookie(mut self, session: impl Into<String>) -> Self {
        self.session_cookie = Some(session.into());
        self
    }

    pub fn with_forwarded_for(mut self, header: impl Into<String>) -> Self {
        self.forwarded_for = Some(header.into());
        self
    }

    /// Candidate identity tokens, bearer header first. A cookie repeating
    /// the bearer value is not tried twice.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        let bearer = self
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let cookie = self
            .auth_cookie
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && Some(*t) != bearer);
        bearer.into_iter().chain(cookie)
    }

    /// Client address: the first `X-Forwarded-For` hop when proxies are
    /// trusted and the hop parses, otherwise the peer address
    pub fn client_ip(&self, trust_forwarded_for: bool) -> IpAddr {
        if trust_forwarded_for {
            let forwarded = self
                .forwarded_for
                .as_deref()
                .and_then(|h| h.split(',').next())
                .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return ip;
            }
        }
        self.peer_ip
    }
}

/// Resolves the acting principal for a request
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    trust_forwarded_for: bool,
}

impl IdentityResolver {
    /// Create a resolver around a token verifier
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            trust_forwarded_for: false,
        }
    }

    /// Take the client address from `X-Forwarded-For`
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Resolve the principal. Never fails.
    #[instrument(skip_all)]
    pub async fn resolve(&self, credentials: &RequestCredentials) -> Principal {
        // A stale bearer header must not hide a valid auth cookie.
        for token in credentials.tokens() {
            match self.verifier.verify(token).await {
                Ok(user) => {
                    debug!(user_id = %user.id, "Resolved authenticated principal");
                    return Principal::Authenticated(user);
                }
                Err(e) => debug!(error = %e, "Token rejected"),
            }
        }

        let mut visitor = AnonymousVisitor::new(credentials.client_ip(self.trust_forwarded_for));
        visitor.session_id = credentials
            .session_cookie
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Principal::Anonymous(visitor)
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish_non_exhaustive()
    }
}
