//! Common test utilities for truetone-core integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod jwks_mock;

#[allow(unused_imports)]
pub use fixtures::{FailingPropertyStore, FailingUsageStore, TestStores};
#[allow(unused_imports)]
pub use jwks_mock::{JwksMockServer, TestKeyPair, TestKindeClaims};
