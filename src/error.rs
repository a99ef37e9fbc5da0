//! Error types for the tiered storage core.
//!
//! A single taxonomy covers both the Tiered Storage Engine and the
//! Multi-Level Cache: adapter failures, not-found, conflicts, timeouts,
//! (de)serialization, policy misconfiguration, and metadata/residency
//! invariant violations. Background tasks never propagate these; they
//! count and log them into their own report structs instead.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("adapter unavailable: {adapter}: {source}")]
    AdapterUnavailable { adapter: String, source: String },

    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("conflict on {key}: {detail}")]
    Conflict { key: String, detail: String },

    #[error("timeout during {operation}")]
    Timeout { operation: String },

    #[error("serialization error: {detail}")]
    Serialization { detail: String },

    #[error("policy misconfigured: {policy}: {detail}")]
    PolicyMisconfiguration { policy: String, detail: String },

    #[error("invariant violation for {key}: {detail}")]
    InvariantViolation { key: String, detail: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Action a caller should take in response to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Safe to retry immediately (e.g. a transient adapter hiccup).
    Retry,
    /// Retry after the given backoff.
    RetryAfter(Duration),
    /// Do not retry; the condition will not resolve itself.
    NoRetry,
}

impl Error {
    /// Classify this error for retry-driving callers.
    pub fn action(&self) -> ErrorAction {
        match self {
            Error::AdapterUnavailable { .. } => ErrorAction::RetryAfter(Duration::from_secs(1)),
            Error::Timeout { .. } => ErrorAction::Retry,
            Error::Conflict { .. } => ErrorAction::Retry,
            Error::InvariantViolation { .. } => ErrorAction::RetryAfter(Duration::from_millis(50)),
            Error::NotFound { .. }
            | Error::Serialization { .. }
            | Error::PolicyMisconfiguration { .. }
            | Error::Configuration(_) => ErrorAction::NoRetry,
            Error::Internal(_) | Error::Io(_) | Error::Json(_) => ErrorAction::NoRetry,
        }
    }

    /// Whether retrying this operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRetry)
    }

    /// Whether this error reflects a transient external condition rather
    /// than a logic or data error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::AdapterUnavailable { .. } | Error::Timeout { .. } | Error::Conflict { .. }
        )
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    pub fn adapter_unavailable(adapter: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Error::AdapterUnavailable {
            adapter: adapter.into(),
            source: source.to_string(),
        }
    }

    pub fn invariant(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::InvariantViolation {
            key: key.into(),
            detail: detail.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_unavailable_is_retryable() {
        let err = Error::adapter_unavailable("keyvalue", "connection refused");
        assert!(err.is_retryable());
        assert!(err.is_transient());
    }

    #[test]
    fn not_found_is_terminal() {
        let err = Error::not_found("k1");
        assert!(!err.is_retryable());
        assert!(!err.is_transient());
    }

    #[test]
    fn policy_misconfiguration_is_not_retried() {
        let err = Error::PolicyMisconfiguration {
            policy: "p1".into(),
            detail: "missing tier".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRetry);
    }
}
