//! TrueTone DB - Persistence layer
//!
//! SQLx-based PostgreSQL repositories plus in-memory equivalents for
//! development and tests. Both implement the same async repository traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use truetone_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/truetone").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let outcome = repos.usage.try_consume("ip:1.2.3.4", 3, None).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::{
    MemoryArticleRepository, MemoryArtifactRepository, MemoryUsageStore, MemoryUserRepository,
};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;
