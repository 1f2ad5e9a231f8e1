// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rq-cache: persistent, size-bounded binary blob cache
//!
//! Stores downloaded attachment and screenshot blobs in SQLite with LRU
//! eviction, pinning, and content-hash verification. Metadata and payload
//! are always written and deleted together in one transaction.

pub mod engine;
pub mod fetcher;
pub mod meta;
pub mod store;

pub use engine::{BlobCache, CacheConfig, CacheStats, CachedBlob, DownloadResult};
pub use fetcher::Fetcher;
pub use meta::{BlobMeta, DownloadStatus};
pub use store::BlobStore;
