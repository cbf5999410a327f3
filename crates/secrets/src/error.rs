//! Error taxonomy for secret access
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`] is what a [`SecretBackend`](crate::SecretBackend)
//!   reports. Store integrations translate their client library's errors into
//!   it.
//! - [`SecretError`] is what callers of [`SecretClient`](crate::SecretClient)
//!   see. Every variant maps onto one [`ErrorKind`], a small closed set that
//!   callers translate into exit codes or responses.

use std::time::Duration;
use thiserror::Error;

/// Closed set of failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The session is invalid or expired
    Auth,
    /// The session lacks a capability for the path
    Permission,
    /// A secret that must exist does not
    NotFound,
    /// The store rejected a write as conflicting
    Conflict,
    /// The store is unreachable or the deadline elapsed
    Transient,
    /// The request was rejected before reaching the store
    InvalidRequest,
    /// The store answered with something that could not be interpreted
    Store,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::InvalidRequest => "invalid_request",
            Self::Store => "store",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`SecretClient`](crate::SecretClient)
#[derive(Debug, Error)]
pub enum SecretError {
    /// Session invalid or expired
    #[error("Secret store session rejected: {message}")]
    Auth {
        /// Reason reported by the store
        message: String,
    },

    /// Session lacks the capability for the path
    #[error("Permission denied to {operation} secret at '{path}': {message}")]
    PermissionDenied {
        /// Path the operation targeted
        path: String,
        /// `read` or `write`
        operation: &'static str,
        /// Reason reported by the store
        message: String,
    },

    /// Secret required to exist was not found
    #[error("Secret '{name}' not found at '{path}'")]
    NotFound {
        /// Secret id
        name: String,
        /// Path that was read
        path: String,
    },

    /// Store rejected the write as conflicting with another version
    #[error("Write to '{path}' conflicts with the stored version: {message}")]
    Conflict {
        /// Path the write targeted
        path: String,
        /// Reason reported by the store
        message: String,
    },

    /// Store unreachable or temporarily unable to serve the request
    #[error("Secret store unavailable while accessing '{path}': {message}")]
    Unavailable {
        /// Path the operation targeted
        path: String,
        /// Transport or service error
        message: String,
    },

    /// Call did not finish before its deadline.
    ///
    /// A write that times out may or may not have been committed by the store;
    /// read the secret back to find out.
    #[error(
        "Deadline of {}ms elapsed while accessing '{path}'; a pending write may or may not have been committed",
        timeout.as_millis()
    )]
    DeadlineExceeded {
        /// Path the operation targeted
        path: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// Request rejected before contacting the store
    #[error("Invalid secret request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request
        reason: String,
    },

    /// Store answered with something this layer cannot interpret
    #[error("Unexpected secret store response for '{path}': {message}")]
    Store {
        /// Path the operation targeted
        path: String,
        /// Description of the response
        message: String,
    },
}

impl SecretError {
    /// The failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::Auth,
            Self::PermissionDenied { .. } => ErrorKind::Permission,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unavailable { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Transient,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Store { .. } => ErrorKind::Store,
        }
    }

    /// Whether retrying the same call later could succeed.
    ///
    /// This layer never retries on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

/// Errors reported by a [`SecretBackend`](crate::SecretBackend)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Token missing, invalid or expired
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Token valid but not allowed on this path
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Nothing stored at the path (or at the requested version)
    #[error("not found")]
    NotFound,

    /// Write rejected because of a version conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure or service unavailable
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}
