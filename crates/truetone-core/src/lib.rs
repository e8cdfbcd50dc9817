//! TrueTone Core - Generation gating business logic
//!
//! Resolves who is making a request, meters AI generations against the
//! principal's tier allowance with an atomic check-and-increment, guards
//! product routes against cross-product access, and streams generations
//! from the LLM provider.

pub mod access;
pub mod config;
pub mod error;
pub mod gate;
pub mod generation;
pub mod identity;
pub mod kinde;
pub mod metrics;
pub mod openai;
pub mod properties;
pub mod subscription;
pub mod token;

pub use access::ProductAccessGuard;
pub use config::{IdentityConfig, KindeConfig, OpenAiConfig, QuotaConfig};
pub use error::GateError;
pub use gate::QuotaGate;
pub use generation::{
    persist_artifact, shape_content, GenerationProvider, GenerationRequest, TextStream,
};
pub use identity::{IdentityResolver, RequestCredentials, TokenVerifier};
pub use kinde::KindePropertyStore;
pub use openai::OpenAiProvider;
pub use properties::{MemoryPropertyStore, PropertyStore};
pub use subscription::{next_reset_after, SubscriptionResolver};
pub use token::{KindeClaims, TokenValidator};
