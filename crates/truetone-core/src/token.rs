//! JWT token validation with JWKS caching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{GateError, IdentityConfig};

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// RSA signing key as published by Kinde
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

/// Audience claim, which Kinde issues as either a string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether the claim names the given audience
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims extracted from a Kinde access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindeClaims {
    /// Subject (Kinde user id, e.g. `kp_...`)
    pub sub: String,
    /// Email, when the email scope was granted
    pub email: Option<String>,
    /// Authorized party (application client id)
    pub azp: Option<String>,
    /// Audience
    pub aud: Option<Audience>,
    /// Organization code
    pub org_code: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl KindeClaims {
    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Decoding keys of one fetched JWKS, by key id
struct KeySet {
    keys: HashMap<String, Arc<DecodingKey>>,
}

impl KeySet {
    fn from_jwks(jwks: Jwks) -> Self {
        let keys = jwks
            .keys
            .into_iter()
            .filter(|jwk| jwk.kty == "RSA")
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, Arc::new(key))),
                Err(e) => {
                    tracing::warn!(kid = %jwk.kid, error = %e, "Skipping unusable JWK");
                    None
                }
            })
            .collect();
        Self { keys }
    }
}

/// Kinde access token validator.
///
/// The key set is fetched once per cache period and shared by concurrent
/// validations. A kid missing from the cached set is rejected without a
/// refetch, so forged headers cannot drive traffic to the JWKS endpoint.
#[derive(Clone)]
pub struct TokenValidator {
    config: IdentityConfig,
    http_client: reqwest::Client,
    key_set: Cache<(), Arc<KeySet>>,
}

impl TokenValidator {
    /// Create a new token validator with a client tuned for JWKS fetching
    pub fn new(config: IdentityConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(2)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::with_client(config, http_client)
    }

    /// Create a validator with a shared HTTP client
    pub fn with_client(config: IdentityConfig, http_client: reqwest::Client) -> Self {
        let key_set = Cache::builder()
            .time_to_live(config.jwks_cache_duration)
            .max_capacity(1)
            .build();
        Self {
            config,
            http_client,
            key_set,
        }
    }

    /// Verify signature, issuer, audience, authorized party and expiry
    pub async fn validate(&self, token: &str) -> Result<KindeClaims, GateError> {
        let kid = decode_header(token)
            .map_err(|e| {
                tracing::debug!(error = %e, "Undecodable token header");
                GateError::InvalidToken
            })?
            .kid
            .ok_or(GateError::InvalidToken)?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer()]);
        // `aud` may be a string or a list; checked against the config below
        validation.validate_aud = false;

        let claims = decode::<KindeClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => GateError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, "Token rejected");
                    GateError::InvalidToken
                }
            })?
            .claims;

        self.check_audience(&claims)?;
        self.check_authorized_party(&claims)?;

        if claims.is_expired() {
            return Err(GateError::TokenExpired);
        }
        Ok(claims)
    }

    fn check_audience(&self, claims: &KindeClaims) -> Result<(), GateError> {
        let Some(expected) = &self.config.audience else {
            return Ok(());
        };
        if claims.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
            Ok(())
        } else {
            tracing::debug!(expected = %expected, got = ?claims.aud, "Audience mismatch");
            Err(GateError::InvalidToken)
        }
    }

    fn check_authorized_party(&self, claims: &KindeClaims) -> Result<(), GateError> {
        let Some(expected) = &self.config.client_id else {
            return Ok(());
        };
        let matches = claims
            .azp
            .as_deref()
            .is_some_and(|azp| bool::from(azp.as_bytes().ct_eq(expected.as_bytes())));
        if matches {
            Ok(())
        } else {
            tracing::debug!(got = ?claims.azp, "Authorized party mismatch");
            Err(GateError::InvalidToken)
        }
    }

    async fn decoding_key(&self, kid: &str) -> Result<Arc<DecodingKey>, GateError> {
        let key_set = self
            .key_set
            .try_get_with((), self.fetch_key_set())
            .await
            .map_err(|_| GateError::InvalidToken)?;

        key_set.keys.get(kid).cloned().ok_or_else(|| {
            tracing::debug!(kid = %kid, "Key id not in JWKS");
            GateError::InvalidToken
        })
    }

    async fn fetch_key_set(&self) -> Result<Arc<KeySet>, GateError> {
        let url = self.config.jwks_url();
        tracing::debug!(url = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::error!(error = %e, "JWKS fetch failed");
                GateError::InvalidToken
            })?;

        let jwks = response.json::<Jwks>().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed JWKS");
            GateError::InvalidToken
        })?;

        let key_set = KeySet::from_jwks(jwks);
        tracing::info!(keys = key_set.keys.len(), "JWKS cached");
        Ok(Arc::new(key_set))
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
