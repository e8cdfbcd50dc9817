//! Common error types

use thiserror::Error;

/// Errors raised when parsing domain values from strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown subscription tier
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// Unknown subscription status
    #[error("invalid subscription status: {0}")]
    InvalidStatus(String),

    /// Unknown product
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// Unknown content type
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
}
