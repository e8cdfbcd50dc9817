//! Configuration for the Generation API service.

use std::time::Duration;

use truetone_core::{IdentityConfig, KindeConfig, OpenAiConfig, QuotaConfig};

/// Where counters, users and artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL via sqlx
    Postgres { database_url: String },
    /// Process-local maps; state is lost on restart
    Memory,
}

/// Generation API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Storage backend
    pub storage: StorageBackend,
    /// Apply migrations on startup (postgres only)
    pub run_migrations: bool,
    /// Kinde token validation
    pub identity: IdentityConfig,
    /// Kinde Management API credentials; in-memory properties when unset
    pub kinde: Option<KindeConfig>,
    /// LLM provider
    pub openai: OpenAiConfig,
    /// Generation allowances
    pub quota: QuotaConfig,
    /// Cookie carrying the Kinde access token
    pub auth_cookie_name: String,
    /// Cookie carrying the anonymous session id
    pub anon_session_cookie_name: String,
    /// Use the first X-Forwarded-For hop as the client IP
    pub trust_forwarded_for: bool,
    /// Target of cross-product redirects
    pub cross_product_redirect_url: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Server
        let http_port = parse_or(&var, "HTTP_PORT", 8080)?;
        let request_timeout_secs: u64 = parse_or(&var, "REQUEST_TIMEOUT_SECS", 60)?;
        let metrics_enabled = parse_bool_or(&var, "METRICS_ENABLED", true)?;

        // Storage
        let storage = match var("STORAGE_BACKEND").as_deref().map(str::trim) {
            None | Some("postgres") => StorageBackend::Postgres {
                database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StorageBackend::Memory,
            Some(_) => return Err(ConfigError::Invalid("STORAGE_BACKEND")),
        };
        let run_migrations = parse_bool_or(&var, "RUN_MIGRATIONS", true)?;

        // Kinde
        let kinde_domain = var("KINDE_DOMAIN").ok_or(ConfigError::Missing("KINDE_DOMAIN"))?;
        let mut identity = IdentityConfig::new(&kinde_domain);
        if let Some(audience) = var("KINDE_AUDIENCE") {
            identity = identity.with_audience(audience);
        }
        if let Some(client_id) = var("KINDE_CLIENT_ID") {
            identity = identity.with_client_id(client_id);
        }

        let kinde = match (var("KINDE_M2M_CLIENT_ID"), var("KINDE_M2M_CLIENT_SECRET")) {
            (Some(id), Some(secret)) => Some(KindeConfig::new(&kinde_domain, id, secret)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("KINDE_M2M_CLIENT_SECRET")),
            (None, Some(_)) => return Err(ConfigError::Missing("KINDE_M2M_CLIENT_ID")),
        };

        // OpenAI
        let mut openai =
            OpenAiConfig::new(var("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?);
        if let Some(model) = var("OPENAI_MODEL") {
            openai = openai.with_model(model);
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            openai = openai.with_base_url(base_url);
        }

        // Allowances
        let defaults = QuotaConfig::default();
        let quota = QuotaConfig::default()
            .with_anonymous_limit(parse_or(&var, "ANONYMOUS_GENERATION_LIMIT", defaults.anonymous_limit)?)
            .with_free_limit(parse_or(&var, "FREE_GENERATION_LIMIT", defaults.free_limit)?)
            .with_paid_monthly_limit(parse_or(
                &var,
                "PAID_MONTHLY_GENERATION_LIMIT",
                defaults.paid_monthly_limit,
            )?)
            .with_premium_monthly_limit(parse_or(
                &var,
                "PREMIUM_MONTHLY_GENERATION_LIMIT",
                defaults.premium_monthly_limit,
            )?);

        Ok(Self {
            http_port,
            storage,
            run_migrations,
            identity,
            kinde,
            openai,
            quota,
            auth_cookie_name: var("AUTH_COOKIE_NAME").unwrap_or_else(|| "kinde_access_token".to_string()),
            anon_session_cookie_name: var("ANON_SESSION_COOKIE_NAME")
                .unwrap_or_else(|| "tt_session".to_string()),
            trust_forwarded_for: parse_bool_or(&var, "TRUST_FORWARDED_FOR", false)?,
            cross_product_redirect_url: var("CROSS_PRODUCT_REDIRECT_URL")
                .unwrap_or_else(|| "/cross-product".to_string()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(var: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("STORAGE_BACKEND", "memory"),
        ("KINDE_DOMAIN", "https://acme.kinde.com/"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.identity.issuer(), "https://acme.kinde.com");
        assert!(config.kinde.is_none());
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.quota.anonymous_limit, 3);
        assert_eq!(config.quota.free_limit, 5);
        assert_eq!(config.quota.paid_monthly_limit, 100);
        assert_eq!(config.quota.premium_monthly_limit, 500);
        assert_eq!(config.auth_cookie_name, "kinde_access_token");
        assert_eq!(config.anon_session_cookie_name, "tt_session");
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.cross_product_redirect_url, "/cross-product");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = load(&[("KINDE_DOMAIN", "https://acme.kinde.com"), ("OPENAI_API_KEY", "sk")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ANONYMOUS_GENERATION_LIMIT", "1"),
            ("PAID_MONTHLY_GENERATION_LIMIT", "250"),
            ("TRUST_FORWARDED_FOR", "true"),
            ("KINDE_M2M_CLIENT_ID", "m2m"),
            ("KINDE_M2M_CLIENT_SECRET", "shh"),
            ("OPENAI_BASE_URL", "http://localhost:4000/v1/"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.quota.anonymous_limit, 1);
        assert_eq!(config.quota.paid_monthly_limit, 250);
        assert!(config.trust_forwarded_for);
        assert_eq!(config.kinde.unwrap().token_url(), "https://acme.kinde.com/oauth2/token");
        assert_eq!(config.openai.completions_url(), "http://localhost:4000/v1/chat/completions");
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("FREE_GENERATION_LIMIT", "lots"));
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Invalid("FREE_GENERATION_LIMIT")));

        let mut vars = REQUIRED.to_vec();
        vars.push(("KINDE_M2M_CLIENT_ID", "m2m"));
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Missing("KINDE_M2M_CLIENT_SECRET")));

        let mut vars = REQUIRED.to_vec();
        vars[0] = ("STORAGE_BACKEND", "redis");
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Invalid("STORAGE_BACKEND")));
    }
}
