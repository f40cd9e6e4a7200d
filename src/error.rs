//! Error types for gh-triage
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for gh-triage
#[derive(Error, Debug)]
pub enum Error {
    /// No usable GitHub credential (fatal, checked before any network call)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// GitHub API rate limit exhausted
    ///
    /// Carries the reset time when the API reported one. Non-fatal:
    /// callers stop fetching and keep whatever was already committed.
    #[error("GitHub API rate limit exceeded")]
    RateLimited {
        /// When the rate limit window resets, if the API said
        reset: Option<DateTime<Utc>>,
    },

    /// Remote API returned a non-success status
    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    /// GraphQL response carried errors or an unexpected shape
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// A user-initiated remote write failed
    #[error("Mutation failed: {0}")]
    Mutation(String),

    /// Network-level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience Result type using the gh-triage Error
pub type Result<T> = std::result::Result<T, Error>;
