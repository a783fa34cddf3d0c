//! Error handling for Strata
//!
//! Defines the error classes surfaced to callers and establishes a unified
//! Result type using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for ledger and reporting operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    /// Malformed input from the caller (bad date, unknown asset, bad weight)
    #[error("validation error: {0}")]
    Validation(String),

    /// A snapshot, strategy, layer or asset id that does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Query or transaction failure inside the storage layer
    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse error class, used at the outer boundary to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Storage,
}

impl PortfolioError {
    /// Classify any error produced by the engine.
    ///
    /// Errors that were not raised as a `PortfolioError` come from rusqlite
    /// or the filesystem and count as storage failures.
    pub fn classify(err: &anyhow::Error) -> ErrorClass {
        match err.downcast_ref::<PortfolioError>() {
            Some(PortfolioError::Validation(_)) => ErrorClass::Validation,
            Some(PortfolioError::NotFound(_)) => ErrorClass::NotFound,
            Some(PortfolioError::Storage(_)) | None => ErrorClass::Storage,
        }
    }
}

/// Shorthand for a validation failure wrapped in anyhow
pub fn validation(msg: impl Into<String>) -> anyhow::Error {
    PortfolioError::Validation(msg.into()).into()
}

/// Shorthand for a not-found failure wrapped in anyhow
pub fn not_found(msg: impl Into<String>) -> anyhow::Error {
    PortfolioError::NotFound(msg.into()).into()
}

/// Result type alias for portfolio operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = PortfolioError::Storage("connection failed".to_string());
        assert_eq!(err.to_string(), "storage error: connection failed");
    }

    #[test]
    fn test_classify_survives_context() {
        use anyhow::Context;
        let result: Result<()> = Err(not_found("snapshot 7")).context("loading snapshot details");
        let err = result.unwrap_err();
        assert_eq!(PortfolioError::classify(&err), ErrorClass::NotFound);
        assert!(err.to_string().contains("loading snapshot details"));
    }

    #[test]
    fn test_foreign_errors_are_storage() {
        let err = anyhow::anyhow!("disk I/O error");
        assert_eq!(PortfolioError::classify(&err), ErrorClass::Storage);

        let err = validation("missing date");
        assert_eq!(PortfolioError::classify(&err), ErrorClass::Validation);
    }
}
