//! Shared error type.
//!
//! Sub-crates define their own error enums and convert into the sim-level
//! error via `From` impls.  `CoreError` covers the few failures raised by
//! `fleet-core` itself (configuration validation).

use thiserror::Error;

/// Errors raised by `fleet-core`.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `fleet-core`.
pub type CoreResult<T> = Result<T, CoreError>;
