//! REST API handlers

pub mod articles;
pub mod generation;
pub mod health;
pub mod onboarding;
pub mod shared;
pub mod subscription;
pub mod usage;

pub use articles::*;
pub use generation::*;
pub use health::*;
pub use onboarding::*;
pub use subscription::*;
pub use usage::*;
