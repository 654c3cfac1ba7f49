//! Unified error types and result handling.
//!
//! Every layer (core, api, client) reports failures through [`Error`]. The
//! [`ErrorKind`] projection is what travels over the wire, so a client can
//! rebuild the same taxonomy from a failure envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or range
    Validation,
    /// Referenced entity does not exist
    NotFound,
    /// Out-bound quantity exceeds stock on hand
    InsufficientStock,
    /// Material stock cannot cover a product build
    InsufficientMaterials,
    /// Duplicate name, or deletion blocked by a reference or by stock
    Conflict,
    /// Missing, unknown or expired session
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Anything the caller cannot act on
    Internal,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input failed validation before touching the store
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable reason
        message: String,
    },

    /// Material id did not resolve
    #[error("Material not found: {id}")]
    MaterialNotFound {
        /// Requested material id
        id: i64,
    },

    /// Product id did not resolve
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Requested product id
        id: i64,
    },

    /// Username or user id did not resolve
    #[error("User not found: {name}")]
    UserNotFound {
        /// Requested user
        name: String,
    },

    /// Session id did not resolve for the given user
    #[error("Session not found: {id}")]
    SessionNotFound {
        /// Requested session id
        id: String,
    },

    /// Out-bound quantity larger than the stock on hand
    #[error("Insufficient stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock {
        /// Material or product name
        name: String,
        /// Current stock
        available: i64,
        /// Requested quantity
        requested: i64,
    },

    /// Product build larger than the material stock allows
    #[error(
        "Insufficient materials to build '{product}': requested {requested}, possible {possible}"
    )]
    InsufficientMaterials {
        /// Product name
        product: String,
        /// Units buildable from current material stock
        possible: i64,
        /// Requested quantity
        requested: i64,
    },

    /// Business rule conflict (duplicate names, blocked deletions, session cap)
    #[error("Conflict: {message}")]
    Conflict {
        /// Human readable reason
        message: String,
    },

    /// Session missing, unknown or expired
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human readable reason
        message: String,
    },

    /// Caller lacks the required role
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human readable reason
        message: String,
    },

    /// Failure reported by a remote backend, rebuilt from its envelope
    #[error("{message}")]
    Remote {
        /// Wire classification sent by the backend
        kind: ErrorKind,
        /// Message sent by the backend
        message: String,
    },

    /// Password hashing or verification failure
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Transport failure talking to the backend
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Integer conversion overflow
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with a message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Conflict`] with a message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Unauthorized`] with a message.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Forbidden`] with a message.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Wire classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::MaterialNotFound { .. }
            | Self::ProductNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::SessionNotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::InsufficientMaterials { .. } => ErrorKind::InsufficientMaterials,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Remote { kind, .. } => *kind,
            Self::Config { .. }
            | Self::PasswordHash(_)
            | Self::Database(_)
            | Self::Network(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::TryFromInt(_) => ErrorKind::Internal,
        }
    }

    /// True when the session behind a request is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unauthorized)
    }

    /// True for transport failures, which callers may answer with "retry".
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
