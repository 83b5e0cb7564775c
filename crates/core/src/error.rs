//! Parse/validation errors for core primitives.

use thiserror::Error;

/// Core-level error.
///
/// Keep this focused on malformed input. Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (empty, or contains forbidden characters).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A role name is not one of the known roles.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unknown_role(name: impl Into<String>) -> Self {
        Self::UnknownRole(name.into())
    }
}
