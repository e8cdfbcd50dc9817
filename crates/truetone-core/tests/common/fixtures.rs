//! Store fixtures for gate and guard tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use truetone_core::{
    GateError, PropertyStore, ProductAccessGuard, QuotaConfig, QuotaGate, SubscriptionResolver,
};
use truetone_db::{
    ConsumeOutcome, DbError, DbResult, MemoryUsageStore, MemoryUserRepository, UsageRow,
    UsageStore,
};
use truetone_types::UserId;

/// In-memory users and usage wired into a gate
#[derive(Clone)]
pub struct TestStores {
    pub users: MemoryUserRepository,
    pub usage: MemoryUsageStore,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            users: MemoryUserRepository::new(),
            usage: MemoryUsageStore::new(),
        }
    }

    pub fn gate(&self, quota: QuotaConfig) -> QuotaGate {
        let resolver = SubscriptionResolver::new(
            Arc::new(self.users.clone()),
            Arc::new(self.usage.clone()),
            quota,
        );
        QuotaGate::new(resolver, Arc::new(self.usage.clone()))
    }
}

/// Usage store whose backend is unreachable
#[derive(Debug, Default, Clone)]
pub struct FailingUsageStore;

#[async_trait]
impl UsageStore for FailingUsageStore {
    async fn find(&self, _key: &str) -> DbResult<Option<UsageRow>> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn try_consume(
        &self,
        _key: &str,
        _limit: u32,
        _reset_at: Option<DateTime<Utc>>,
    ) -> DbResult<ConsumeOutcome> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn reset_period(
        &self,
        _key: &str,
        _expected: Option<DateTime<Utc>>,
        _next: DateTime<Utc>,
    ) -> DbResult<bool> {
        Err(DbError::Sqlx(sqlx::Error::PoolTimedOut))
    }
}

/// Property store whose provider is unreachable
#[derive(Debug, Default, Clone)]
pub struct FailingPropertyStore;

#[async_trait]
impl PropertyStore for FailingPropertyStore {
    async fn get_user_property(&self, _user_id: &UserId, _key: &str) -> Result<Option<Value>, GateError> {
        Err(GateError::StoreUnavailable("connection refused".to_string()))
    }

    async fn set_user_property(&self, _user_id: &UserId, _key: &str, _value: Value) -> Result<bool, GateError> {
        Err(GateError::StoreUnavailable("connection refused".to_string()))
    }
}

#[allow(dead_code)]
pub fn failing_guard() -> ProductAccessGuard {
    ProductAccessGuard::new(Arc::new(FailingPropertyStore))
}
