//! Error types for marketfeed.
//!
//! Library crates use [`MarketFeedError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Batch processing distinguishes two tiers of failure:
//! - **Fatal**: [`Validation`](MarketFeedError::Validation) and
//!   [`Storage`](MarketFeedError::Storage) abort the remaining batch.
//! - **Per-item**: [`Fetch`](MarketFeedError::Fetch) skips one identifier
//!   and the batch continues.

use std::path::PathBuf;

/// The remote endpoint a failed lookup was talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupEndpoint {
    /// Primary item-by-id lookup.
    Item,
    /// Seller-by-id lookup.
    Seller,
    /// Category-by-id lookup.
    Category,
    /// Currency-by-id lookup.
    Currency,
}

impl std::fmt::Display for LookupEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Item => "item",
            Self::Seller => "seller",
            Self::Category => "category",
            Self::Currency => "currency",
        };
        write!(f, "{name}")
    }
}

/// Top-level error type for all marketfeed operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketFeedError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Batch input validation error (bad separator, bad encoding).
    /// Fatal to the whole batch.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A remote lookup failed (transport, status, or decode).
    /// Non-fatal: the affected identifier is skipped.
    #[error("{endpoint} lookup failed: {message}")]
    Fetch {
        endpoint: LookupEndpoint,
        message: String,
    },

    /// Database or storage layer error. Fatal to the whole batch.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarketFeedError>;

impl MarketFeedError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a fetch error for a specific endpoint.
    pub fn fetch(endpoint: LookupEndpoint, msg: impl Into<String>) -> Self {
        Self::Fetch {
            endpoint,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the remaining batch. Fetch errors are
    /// absorbed per identifier; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Fetch { .. })
    }
}
