//! Remote API port (driven/secondary port)
//!
//! This module defines the operations the sync engine needs from the
//! authoritative server. The wire format and HTTP client live in adapter
//! crates; they map transport failures onto [`ApiError`].
//!
//! ## Error classes
//!
//! ```text
//! ┌────────────────────────┬──────────────┬─────────────────────────────────┐
//! │ ApiErrorKind           │ HTTP         │ Push pipeline reaction          │
//! ├────────────────────────┼──────────────┼─────────────────────────────────┤
//! │ InternalServerError    │ 500          │ backoff loop, slow track        │
//! │ ServerError            │ other 5xx    │ backoff loop, fast track        │
//! │ ClientError            │ 4xx          │ entity marked SyncFailed        │
//! │ Transport              │ -            │ run aborted                     │
//! └────────────────────────┴──────────────┴─────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::SyncableEntity;

/// Errors reported by the remote API adapters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 500
    #[error("Internal server error: {message}")]
    InternalServerError { message: String },

    /// Any other HTTP 5xx (bad gateway, service unavailable, gateway timeout, ...)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// HTTP 4xx: the server understood and rejected the request
    #[error("{message}")]
    ClientError { status: u16, message: String },

    /// The request never produced an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Closed classification of [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    InternalServerError,
    ServerError,
    ClientError,
    Transport,
}

impl ApiError {
    /// Maps an HTTP error status onto an error class
    ///
    /// Statuses outside 4xx/5xx are treated as transport failures since they
    /// should never reach the error path of a well-behaved client.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            500 => ApiError::InternalServerError { message },
            501..=599 => ApiError::ServerError { status, message },
            400..=499 => ApiError::ClientError { status, message },
            _ => ApiError::Transport(format!("unexpected status {status}: {message}")),
        }
    }

    /// Returns the error class
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::InternalServerError { .. } => ApiErrorKind::InternalServerError,
            ApiError::ServerError { .. } => ApiErrorKind::ServerError,
            ApiError::ClientError { .. } => ApiErrorKind::ClientError,
            ApiError::Transport(_) => ApiErrorKind::Transport,
        }
    }

    /// Returns true for the 5xx class
    pub fn is_server_error(&self) -> bool {
        matches!(
            self.kind(),
            ApiErrorKind::InternalServerError | ApiErrorKind::ServerError
        )
    }

    /// HTTP status, when the error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InternalServerError { .. } => Some(500),
            ApiError::ServerError { status, .. } | ApiError::ClientError { status, .. } => {
                Some(*status)
            }
            ApiError::Transport(_) => None,
        }
    }
}

/// Server availability probe
#[async_trait::async_trait]
pub trait StatusApi: Send + Sync {
    /// Returns whether the server is accepting requests
    ///
    /// Adapters return `Err` with a server-class error when the status
    /// endpoint itself fails.
    async fn is_available(&self) -> Result<bool, ApiError>;
}

/// Per-entity-type remote operations
#[async_trait::async_trait]
pub trait EntityApi<T: SyncableEntity>: Send + Sync {
    /// Creates `entity` on the server and returns the server representation
    async fn create(&self, entity: &T) -> Result<T, ApiError>;

    /// Updates `entity` on the server and returns the server representation
    async fn update(&self, entity: &T) -> Result<T, ApiError>;

    /// Fetches every record modified after `since` (all records when `None`)
    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<T>, ApiError>;
}
