//! TrueTone Types - Shared domain types
//!
//! This crate contains domain types used across the TrueTone crates:
//! - Principals (authenticated users and anonymous visitors)
//! - Subscription tiers, billing status and paid-feature access
//! - Product entitlements sourced from the identity provider
//! - Quota decisions and usage records
//! - Generated content and artifacts

pub mod content;
pub mod entitlement;
pub mod error;
pub mod principal;
pub mod quota;
pub mod subscription;
pub mod tier;
pub mod user;

pub use content::*;
pub use entitlement::*;
pub use error::*;
pub use principal::*;
pub use quota::*;
pub use subscription::*;
pub use tier::*;
pub use user::*;
