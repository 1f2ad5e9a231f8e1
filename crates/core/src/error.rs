// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for rq-core operations.

use std::sync::Arc;
use thiserror::Error;

/// All possible errors that can occur in the client sync core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("integrity check failed: expected hash {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid ticket status: '{0}'\n  hint: valid statuses are: open, pending, solved, closed")]
    InvalidStatus(String),

    #[error("invalid message status: '{0}'\n  hint: valid statuses are: pending, sent, failed")]
    InvalidMessageStatus(String),

    #[error("invalid download status: '{0}'\n  hint: valid statuses are: pending, downloading, completed, failed")]
    InvalidDownloadStatus(String),

    #[error("cached value for key '{0}' has a different type")]
    TypeMismatch(String),

    #[error(transparent)]
    Shared(Arc<Error>),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// Returns true if the error is transient and eligible for retry
    /// with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Shared(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

/// A specialized Result type for rq-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
