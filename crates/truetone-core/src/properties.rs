//! Identity provider user property store abstraction

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use truetone_types::UserId;

use crate::GateError;

/// Per-user properties held by the identity provider.
///
/// Values are returned raw; callers normalize flags with
/// [`coerce_flag`](truetone_types::coerce_flag).
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Read one property. `None` when the property is unset.
    async fn get_user_property(&self, user_id: &UserId, key: &str) -> Result<Option<Value>, GateError>;

    /// Read several properties. Unset keys are absent from the map.
    async fn get_user_properties(
        &self,
        user_id: &UserId,
        keys: &[&str],
    ) -> Result<HashMap<String, Value>, GateError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get_user_property(user_id, key).await? {
                found.insert((*key).to_string(), value);
            }
        }
        Ok(found)
    }

    /// Write one property. Returns whether the provider accepted the write.
    async fn set_user_property(&self, user_id: &UserId, key: &str, value: Value) -> Result<bool, GateError>;
}

/// In-memory property store
#[derive(Default, Clone)]
pub struct MemoryPropertyStore {
    properties: Arc<DashMap<(String, String), Value>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no properties are stored
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn get_user_property(&self, user_id: &UserId, key: &str) -> Result<Option<Value>, GateError> {
        let entry = (user_id.to_string(), key.to_string());
        Ok(self.properties.get(&entry).map(|v| v.value().clone()))
    }

    async fn set_user_property(&self, user_id: &UserId, key: &str, value: Value) -> Result<bool, GateError> {
        self.properties
            .insert((user_id.to_string(), key.to_string()), value);
        Ok(true)
    }
}
