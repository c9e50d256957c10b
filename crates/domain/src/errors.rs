//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Campline
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CamplineError {
    /// Transport-level failure: timeout, connect error, unexpected status.
    /// Safe to retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected or a required token/cookie was missing.
    /// Not retried automatically; requires new credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Remote returned 200 but the payload is malformed or carries an
    /// application-level error code.
    #[error("Data error: {0}")]
    Data(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Campline operations
pub type Result<T> = std::result::Result<T, CamplineError>;
