//! Shared Error Types
//!
//! Errors raised by the pure, platform-agnostic parts of the crate: the
//! trackable model, connections, and aggregate math.
//!
//! # Error Categories
//!
//! - `ValidationError` - Data validation failures
//! - `InvalidTrackable` - A trackable violates a model constraint
//!
//! # Usage
//!
//! ```rust
//! use progress_sync::shared::error::SharedError;
//!
//! let error = SharedError::validation("max_progress", "goal requires a maximum");
//! assert!(error.to_string().contains("max_progress"));
//! ```
use thiserror::Error;

/// Shared error types that can occur in both the pure model and the engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Trackable model error
    #[error("Invalid trackable '{id}': {message}")]
    InvalidTrackable {
        /// Trackable id
        id: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new trackable error
    pub fn invalid_trackable(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTrackable {
            id: id.into(),
            message: message.into(),
        }
    }
}
