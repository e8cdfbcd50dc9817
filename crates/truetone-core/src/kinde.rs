//! Kinde Management API property store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use reqwest::{Client, Method};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, instrument};
use truetone_types::UserId;
use url::Url;

use crate::{GateError, KindeConfig, PropertyStore};

const TOKEN_CACHE_KEY: &str = "m2m";

/// Refresh this long before the provider's stated expiry.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct M2mToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    #[serde(default)]
    properties: Vec<UserProperty>,
}

#[derive(Debug, Deserialize)]
struct UserProperty {
    key: String,
    #[serde(default)]
    value: Value,
}

/// Property store backed by the Kinde Management API.
///
/// Authenticates with an M2M client-credentials token, cached until shortly
/// before it expires.
#[derive(Clone)]
pub struct KindePropertyStore {
    client: Client,
    config: KindeConfig,
    token_cache: Cache<&'static str, Arc<M2mToken>>,
}

impl KindePropertyStore {
    /// Create a new Kinde property store
    pub fn new(config: KindeConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(config, client)
    }

    /// Create a store with a shared HTTP client
    pub fn with_client(config: KindeConfig, client: Client) -> Self {
        Self {
            client,
            config,
            token_cache: Cache::builder()
                .time_to_live(Duration::from_secs(60 * 60))
                .max_capacity(1)
                .build(),
        }
    }

    async fn access_token(&self) -> Result<String, GateError> {
        let token = self.cached_token().await?;
        if token.expires_at > Utc::now() {
            return Ok(token.access_token.clone());
        }

        self.token_cache.invalidate(TOKEN_CACHE_KEY).await;
        Ok(self.cached_token().await?.access_token.clone())
    }

    /// Concurrent callers on a cold cache share one token request
    async fn cached_token(&self) -> Result<Arc<M2mToken>, GateError> {
        self.token_cache
            .try_get_with(TOKEN_CACHE_KEY, async { self.fetch_token().await.map(Arc::new) })
            .await
            .map_err(|e| match e.as_ref() {
                GateError::StoreUnavailable(message) => GateError::StoreUnavailable(message.clone()),
                other => GateError::StoreUnavailable(other.to_string()),
            })
    }

    async fn fetch_token(&self) -> Result<M2mToken, GateError> {
        debug!("Requesting Kinde M2M token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("audience", self.config.audience.as_str()),
        ];

        let response = self
            .client
            .post(self.config.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Kinde token request failed");
                GateError::StoreUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Kinde token endpoint error");
            return Err(GateError::StoreUnavailable(format!(
                "Kinde token endpoint error: {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Kinde token response");
            GateError::StoreUnavailable(e.to_string())
        })?;

        let lifetime = (body.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        Ok(M2mToken {
            access_token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }

    fn properties_url(&self, user_id: &UserId, key: Option<&str>) -> Result<Url, GateError> {
        let mut url = Url::parse(&self.config.api_base())
            .map_err(|e| GateError::StoreUnavailable(format!("invalid Kinde domain: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| GateError::StoreUnavailable("invalid Kinde domain".to_string()))?;
            segments.extend(["users", user_id.as_str(), "properties"]);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    /// Make an authenticated request to the management API
    async fn api_request(&self, method: Method, url: Url) -> Result<reqwest::Response, GateError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Kinde API request failed");
                GateError::StoreUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Kinde API error");
            return Err(GateError::StoreUnavailable(format!(
                "Kinde API error: {status}"
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl PropertyStore for KindePropertyStore {
    #[instrument(skip_all, fields(user_id = %user_id, key = %key))]
    async fn get_user_property(&self, user_id: &UserId, key: &str) -> Result<Option<Value>, GateError> {
        Ok(self.get_user_properties(user_id, &[key]).await?.remove(key))
    }

    /// One Management API call returns every property of the user
    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn get_user_properties(
        &self,
        user_id: &UserId,
        keys: &[&str],
    ) -> Result<HashMap<String, Value>, GateError> {
        let url = self.properties_url(user_id, None)?;
        let response = self.api_request(Method::GET, url).await?;

        let body: PropertiesResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Kinde properties response");
            GateError::StoreUnavailable(e.to_string())
        })?;

        Ok(body
            .properties
            .into_iter()
            .filter(|p| keys.contains(&p.key.as_str()) && !p.value.is_null())
            .map(|p| (p.key, p.value))
            .collect())
    }

    #[instrument(skip_all, fields(user_id = %user_id, key = %key))]
    async fn set_user_property(&self, user_id: &UserId, key: &str, value: Value) -> Result<bool, GateError> {
        let mut url = self.properties_url(user_id, Some(key))?;
        let raw = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        url.query_pairs_mut().append_pair("value", &raw);

        self.api_request(Method::PUT, url).await?;
        debug!(key = %key, "Kinde user property updated");
        Ok(true)
    }
}

impl std::fmt::Debug for KindePropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindePropertyStore")
            .field("domain", &self.config.domain)
            .finish_non_exhaustive()
    }
}
