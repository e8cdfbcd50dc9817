//! Application state for the Generation API service.

use std::sync::Arc;

use truetone_core::{
    GenerationProvider, IdentityResolver, ProductAccessGuard, PropertyStore, QuotaGate,
    SubscriptionResolver, TokenVerifier,
};
use truetone_db::{
    ArticleRepository, ArtifactRepository, DbPool, MemoryArticleRepository,
    MemoryArtifactRepository, MemoryUsageStore, MemoryUserRepository, Repositories, UsageStore,
    UserRepository,
};

use crate::config::Config;

/// Persistence handles behind the repository traits
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub usage: Arc<dyn UsageStore>,
    pub articles: Arc<dyn ArticleRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    /// Present for the postgres backend; used by the readiness check
    pub pool: Option<DbPool>,
}

impl Storage {
    /// PostgreSQL-backed storage
    pub fn postgres(pool: DbPool) -> Self {
        let repos = Repositories::new(pool.clone());
        Self {
            users: Arc::new(repos.users),
            usage: Arc::new(repos.usage),
            articles: Arc::new(repos.articles),
            artifacts: Arc::new(repos.artifacts),
            pool: Some(pool),
        }
    }

    /// Process-local storage
    pub fn memory() -> Self {
        Self::from_memory(
            MemoryUserRepository::new(),
            MemoryUsageStore::new(),
            MemoryArticleRepository::new(),
            MemoryArtifactRepository::new(),
        )
    }

    /// Storage over existing in-memory repositories
    pub fn from_memory(
        users: MemoryUserRepository,
        usage: MemoryUsageStore,
        articles: MemoryArticleRepository,
        artifacts: MemoryArtifactRepository,
    ) -> Self {
        Self {
            users: Arc::new(users),
            usage: Arc::new(usage),
            articles: Arc::new(articles),
            artifacts: Arc::new(artifacts),
            pool: None,
        }
    }
}

/// External collaborators: identity, entitlements and the LLM
#[derive(Clone)]
pub struct Services {
    pub verifier: Arc<dyn TokenVerifier>,
    pub properties: Arc<dyn PropertyStore>,
    pub provider: Arc<dyn GenerationProvider>,
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Request principal resolution
    pub identity: Arc<IdentityResolver>,
    /// Generation quota
    pub gate: Arc<QuotaGate>,
    /// Cross-product guard
    pub access: Arc<ProductAccessGuard>,
    /// LLM provider
    pub provider: Arc<dyn GenerationProvider>,
    pub users: Arc<dyn UserRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    /// Database pool (postgres backend only)
    pub pool: Option<DbPool>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: Storage, services: Services) -> Self {
        let identity = IdentityResolver::new(services.verifier)
            .with_trust_forwarded_for(config.trust_forwarded_for);
        let resolver = SubscriptionResolver::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.usage),
            config.quota.clone(),
        );
        let gate = QuotaGate::new(resolver, storage.usage);

        Self {
            identity: Arc::new(identity),
            gate: Arc::new(gate),
            access: Arc::new(ProductAccessGuard::new(services.properties)),
            provider: services.provider,
            users: storage.users,
            articles: storage.articles,
            artifacts: storage.artifacts,
            pool: storage.pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
