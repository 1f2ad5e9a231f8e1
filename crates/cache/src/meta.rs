// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Blob metadata model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use rq_core::error::{Error, Result};

/// Download lifecycle of a cached blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DownloadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DownloadStatus::Pending),
            "downloading" => Ok(DownloadStatus::Downloading),
            "completed" => Ok(DownloadStatus::Completed),
            "failed" => Ok(DownloadStatus::Failed),
            other => Err(Error::InvalidDownloadStatus(other.to_string())),
        }
    }
}

/// Metadata for one cached blob, keyed by `(conversation_id, filename)`.
///
/// The byte payload lives in a separate table; metadata and payload are
/// always written and deleted inside one transaction so neither can be
/// observed without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub conversation_id: String,
    pub filename: String,
    /// Payload size in bytes.
    pub size: u64,
    pub mime_type: String,
    /// Creation time, milliseconds since Unix epoch.
    pub created_at_ms: u64,
    /// Last access time; updated on every read. Drives LRU eviction.
    pub last_accessed_ms: u64,
    /// Expected content hash (SHA-256, hex), if known.
    pub content_hash: Option<String>,
    /// Set once `verify_integrity` has confirmed the payload matches
    /// `content_hash`.
    pub verified: bool,
    /// Pinned entries are exempt from eviction.
    pub pinned: bool,
    pub status: DownloadStatus,
    /// Download priority as requested by the caller. Informational.
    pub priority: i32,
}

/// Guess a MIME type from a filename extension.
///
/// Used when the server did not report one.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
