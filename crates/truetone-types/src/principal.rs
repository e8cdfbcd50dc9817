//! Request principals and counting keys

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::UserId;

/// An authenticated user, as established by the identity provider token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Identity provider subject
    pub id: UserId,
    /// Email claim, if the token carried one
    pub email: Option<String>,
}

impl AuthenticatedUser {
    /// Create an authenticated user without an email claim
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    /// Attach the email claim
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A visitor without a valid identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousVisitor {
    /// Anonymous session cookie, once the client has one
    pub session_id: Option<String>,
    /// Client address
    pub ip_address: IpAddr,
}

impl AnonymousVisitor {
    /// Create a visitor known only by address
    pub fn new(ip_address: IpAddr) -> Self {
        Self {
            session_id: None,
            ip_address,
        }
    }

    /// Attach the anonymous session cookie value
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Usage is charged to the session when there is one, else to the address,
    /// so cookie-less requests from one client share a single counter.
    pub fn counting_key(&self) -> CountingKey {
        match self.session_id.as_deref().map(str::trim) {
            Some(session) if !session.is_empty() => CountingKey::Session(session.to_string()),
            _ => CountingKey::Ip(self.ip_address),
        }
    }
}

/// The acting identity for a request. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Valid identity token presented
    Authenticated(AuthenticatedUser),
    /// No valid identity token
    Anonymous(AnonymousVisitor),
}

impl Principal {
    /// The authenticated user, if any
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous(_) => None,
        }
    }

    /// Whether the request carried a valid identity token
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Key the request's usage is charged to
    pub fn counting_key(&self) -> CountingKey {
        match self {
            Self::Authenticated(user) => CountingKey::User(user.id.clone()),
            Self::Anonymous(visitor) => visitor.counting_key(),
        }
    }
}

/// Store key a request's generation usage is charged to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CountingKey {
    /// Authenticated user
    User(UserId),
    /// Anonymous session cookie
    Session(String),
    /// Anonymous client address
    Ip(IpAddr),
}

impl std::fmt::Display for CountingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(session) => write!(f, "session:{session}"),
            Self::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}
