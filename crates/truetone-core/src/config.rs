//! Configuration types for the generation gate

use std::time::Duration;

use secrecy::SecretString;
use truetone_types::{QuotaTier, Tier};

/// Generation allowances per metered tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Lifetime allowance for anonymous visitors
    pub anonymous_limit: u32,
    /// Lifetime allowance for free users
    pub free_limit: u32,
    /// Monthly allowance for paid users
    pub paid_monthly_limit: u32,
    /// Monthly allowance for premium users
    pub premium_monthly_limit: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous_limit: 3,
            free_limit: 5,
            paid_monthly_limit: 100,
            premium_monthly_limit: 500,
        }
    }
}

impl QuotaConfig {
    /// Default allowance for a metered tier
    pub fn limit_for(&self, tier: QuotaTier) -> u32 {
        match tier {
            QuotaTier::Anonymous => self.anonymous_limit,
            QuotaTier::Free => self.free_limit,
            QuotaTier::Paid => self.paid_monthly_limit,
            QuotaTier::Premium => self.premium_monthly_limit,
        }
    }

    /// Default allowance for a subscription tier
    pub fn limit_for_tier(&self, tier: Tier) -> u32 {
        self.limit_for(tier.into())
    }

    /// Set the anonymous allowance
    pub fn with_anonymous_limit(mut self, limit: u32) -> Self {
        self.anonymous_limit = limit;
        self
    }

    /// Set the free allowance
    pub fn with_free_limit(mut self, limit: u32) -> Self {
        self.free_limit = limit;
        self
    }

    /// Set the paid monthly allowance
    pub fn with_paid_monthly_limit(mut self, limit: u32) -> Self {
        self.paid_monthly_limit = limit;
        self
    }

    /// Set the premium monthly allowance
    pub fn with_premium_monthly_limit(mut self, limit: u32) -> Self {
        self.premium_monthly_limit = limit;
        self
    }
}

/// Identity provider token validation settings
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Kinde domain, e.g. `https://acme.kinde.com` (no trailing slash)
    pub domain: String,
    /// Expected `aud` claim, when audience checking is enabled
    pub audience: Option<String>,
    /// Expected `azp` claim (application client id)
    pub client_id: Option<String>,
    /// JWKS cache duration
    pub jwks_cache_duration: Duration,
}

impl IdentityConfig {
    /// Create a config for a Kinde domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().trim_end_matches('/').to_string(),
            audience: None,
            client_id: None,
            jwks_cache_duration: Duration::from_secs(60 * 60),
        }
    }

    /// Token issuer
    pub fn issuer(&self) -> &str {
        &self.domain
    }

    /// Get the JWKS URL
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.domain)
    }

    /// Require an `aud` claim
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Require an `azp` claim
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set JWKS cache duration
    pub fn with_jwks_cache_duration(mut self, duration: Duration) -> Self {
        self.jwks_cache_duration = duration;
        self
    }
}

/// Kinde Management API credentials
#[derive(Debug, Clone)]
pub struct KindeConfig {
    /// Kinde domain (no trailing slash)
    pub domain: String,
    /// M2M application client id
    pub client_id: String,
    /// M2M application client secret
    pub client_secret: SecretString,
    /// Management API audience, defaults to `{domain}/api`
    pub audience: String,
}

impl KindeConfig {
    /// Create a config for M2M access to the management API
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let domain = domain.into().trim_end_matches('/').to_string();
        Self {
            audience: format!("{domain}/api"),
            domain,
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Token endpoint
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.domain)
    }

    /// Management API base
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.domain)
    }

    /// Override the management API audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

/// OpenAI chat completions settings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: SecretString,
    /// Model name
    pub model: String,
    /// API base URL (no trailing slash)
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl OpenAiConfig {
    /// Create a config with the default model and endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            max_tokens: 1200,
        }
    }

    /// Chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token ceiling
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
