//! PostgreSQL repository implementations

mod article;
mod artifact;
mod usage;
mod user;

pub use article::PgArticleRepository;
pub use artifact::PgArtifactRepository;
pub use usage::PgUsageStore;
pub use user::PgUserRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub users: PgUserRepository,
    pub usage: PgUsageStore,
    pub articles: PgArticleRepository,
    pub artifacts: PgArtifactRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            usage: PgUsageStore::new(pool.clone()),
            articles: PgArticleRepository::new(pool.clone()),
            artifacts: PgArtifactRepository::new(pool),
        }
    }
}
