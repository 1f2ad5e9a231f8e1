// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The binary cache engine.
//!
//! Persistent, size-bounded store for downloaded attachment and screenshot
//! blobs. Responsibilities:
//! - download-once semantics (a second `download` for the same key is a
//!   cache hit and performs no network fetch)
//! - SHA-256 content hashing with explicit integrity verification
//! - pin-aware LRU eviction with high/low-water hysteresis
//! - failed downloads recorded so they are not retried automatically
//!
//! Eviction failures after a successful download are logged and never roll
//! back the download itself.

use sha2::{Digest, Sha256};

use rq_core::clock::{ClockSource, SystemClock};
use rq_core::error::{Error, Result};

use crate::fetcher::Fetcher;
use crate::meta::{guess_mime_type, BlobMeta, DownloadStatus};
use crate::store::BlobStore;

/// Size bounds for the cache.
///
/// When total size exceeds `high_water_bytes` after a download, entries are
/// evicted until total size drops to `low_water_bytes`. The gap between the
/// two marks keeps the cache from thrashing at the boundary.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub high_water_bytes: u64,
    pub low_water_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            high_water_bytes: 500 * 1024 * 1024,
            low_water_bytes: 400 * 1024 * 1024,
        }
    }
}

/// Outcome of a `download` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadResult {
    /// The blob was already cached; no network fetch happened.
    Hit,
    /// The blob was fetched and stored.
    Stored {
        /// Payload size in bytes.
        size: u64,
    },
    /// A previous download of this key failed; no network fetch happened.
    /// Retry goes through [`BlobCache::retry_download`].
    PreviouslyFailed,
}

/// A cached blob handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
}

/// Counters describing cache activity since process start plus the current
/// persisted totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: u64,
    pub total_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// The binary cache engine.
pub struct BlobCache<F: Fetcher, C: ClockSource = SystemClock> {
    store: BlobStore,
    fetcher: F,
    clock: C,
    config: CacheConfig,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<F: Fetcher> BlobCache<F, SystemClock> {
    /// Creates an engine over the given store and fetcher with the system
    /// clock.
    pub fn new(store: BlobStore, fetcher: F, config: CacheConfig) -> Self {
        Self::with_clock(store, fetcher, config, SystemClock)
    }
}

impl<F: Fetcher, C: ClockSource> BlobCache<F, C> {
    /// Creates an engine with a custom clock source.
    pub fn with_clock(store: BlobStore, fetcher: F, config: CacheConfig, clock: C) -> Self {
        BlobCache {
            store,
            fetcher,
            clock,
            config,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Downloads a blob into the cache, or returns a hit if it is already
    /// there.
    ///
    /// A size mismatch against `expected_size` is a warning, not a
    /// failure. A hash mismatch against `expected_hash` keeps the blob,
    /// leaves it unverified, and surfaces [`Error::Integrity`]. A fetch
    /// failure marks the metadata `failed` and propagates the error;
    /// later calls for the same key short-circuit on that marker without
    /// fetching, so retry is user-initiated via [`Self::retry_download`].
    pub async fn download(
        &mut self,
        conversation_id: &str,
        filename: &str,
        source_url: &str,
        expected_size: Option<u64>,
        expected_hash: Option<&str>,
        priority: i32,
    ) -> Result<DownloadResult> {
        if let Some(meta) = self.store.get_meta(conversation_id, filename)? {
            match meta.status {
                DownloadStatus::Completed => {
                    self.hits += 1;
                    return Ok(DownloadResult::Hit);
                }
                DownloadStatus::Failed => {
                    return Ok(DownloadResult::PreviouslyFailed);
                }
                DownloadStatus::Pending | DownloadStatus::Downloading => {}
            }
        }

        let now = self.clock.now_ms();
        let bytes = match self.fetcher.fetch(source_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Keep a failed marker so the entry is not hammered by
                // automatic retries; retry is user-initiated.
                let meta = BlobMeta {
                    conversation_id: conversation_id.to_string(),
                    filename: filename.to_string(),
                    size: 0,
                    mime_type: guess_mime_type(filename).to_string(),
                    created_at_ms: now,
                    last_accessed_ms: now,
                    content_hash: expected_hash.map(str::to_string),
                    verified: false,
                    pinned: false,
                    status: DownloadStatus::Failed,
                    priority,
                };
                self.store.put_meta(&meta)?;
                return Err(e);
            }
        };

        let size = bytes.len() as u64;
        if let Some(expected) = expected_size {
            if expected != size {
                tracing::warn!(
                    conversation_id,
                    filename,
                    expected,
                    actual = size,
                    "blob size differs from server-reported size"
                );
            }
        }

        let computed = hex::encode(Sha256::digest(&bytes));
        let hash_matches = expected_hash.map(|h| h.eq_ignore_ascii_case(&computed));

        let meta = BlobMeta {
            conversation_id: conversation_id.to_string(),
            filename: filename.to_string(),
            size,
            mime_type: guess_mime_type(filename).to_string(),
            created_at_ms: now,
            last_accessed_ms: now,
            content_hash: Some(expected_hash.map_or_else(|| computed.clone(), str::to_string)),
            verified: hash_matches.unwrap_or(false),
            pinned: false,
            status: DownloadStatus::Completed,
            priority,
        };
        self.store.insert(&meta, &bytes)?;

        self.evict_if_over_high_water();

        if hash_matches == Some(false) {
            return Err(Error::Integrity {
                expected: expected_hash.unwrap_or_default().to_string(),
                actual: computed,
            });
        }

        Ok(DownloadResult::Stored { size })
    }

    /// User-initiated retry of a failed download: drops the failed marker
    /// for the key, then downloads as usual. A completed entry is still a
    /// plain hit.
    pub async fn retry_download(
        &mut self,
        conversation_id: &str,
        filename: &str,
        source_url: &str,
        expected_size: Option<u64>,
        expected_hash: Option<&str>,
        priority: i32,
    ) -> Result<DownloadResult> {
        if let Some(meta) = self.store.get_meta(conversation_id, filename)? {
            if meta.status == DownloadStatus::Failed {
                self.store.delete(conversation_id, filename)?;
            }
        }
        self.download(conversation_id, filename, source_url, expected_size, expected_hash, priority)
            .await
    }

    /// Returns the cached blob for a key, updating its last-accessed time.
    pub fn get(&mut self, conversation_id: &str, filename: &str) -> Result<Option<CachedBlob>> {
        let Some(meta) = self.store.get_meta(conversation_id, filename)? else {
            self.misses += 1;
            return Ok(None);
        };
        let Some(bytes) = self.store.get_bytes(conversation_id, filename)? else {
            // Metadata without a payload means a failed download marker.
            self.misses += 1;
            return Ok(None);
        };

        self.store.touch(conversation_id, filename, self.clock.now_ms())?;
        self.hits += 1;
        Ok(Some(CachedBlob {
            size: bytes.len() as u64,
            bytes,
            mime_type: meta.mime_type,
        }))
    }

    /// Pins a blob, exempting it from eviction. Idempotent; silently
    /// no-ops on a missing entry.
    pub fn pin(&mut self, conversation_id: &str, filename: &str) -> Result<()> {
        self.store.set_pinned(conversation_id, filename, true)?;
        Ok(())
    }

    /// Unpins a blob. Idempotent; silently no-ops on a missing entry.
    pub fn unpin(&mut self, conversation_id: &str, filename: &str) -> Result<()> {
        self.store.set_pinned(conversation_id, filename, false)?;
        Ok(())
    }

    /// Evicts unpinned entries in ascending last-accessed order until
    /// `bytes_to_free` is met or no evictable entries remain.
    ///
    /// Returns the actual bytes freed, which may be less than requested
    /// if everything remaining is pinned.
    pub fn evict_oldest(&mut self, bytes_to_free: u64) -> Result<u64> {
        let mut freed = 0u64;
        for meta in self.store.evictable_oldest_first()? {
            if freed >= bytes_to_free {
                break;
            }
            if self.store.delete(&meta.conversation_id, &meta.filename)? {
                freed += meta.size;
                self.evictions += 1;
                tracing::debug!(
                    conversation_id = %meta.conversation_id,
                    filename = %meta.filename,
                    size = meta.size,
                    "evicted blob"
                );
            }
        }
        Ok(freed)
    }

    /// Recomputes the stored payload's hash and compares it to the
    /// expected content hash, marking the entry verified on success.
    ///
    /// Returns `Err(NotFound)` for a missing entry or payload, `Ok(false)`
    /// on mismatch or when no expected hash is stored.
    pub fn verify_integrity(&mut self, conversation_id: &str, filename: &str) -> Result<bool> {
        let meta = self
            .store
            .get_meta(conversation_id, filename)?
            .ok_or_else(|| Error::NotFound(format!("{conversation_id}/{filename}")))?;
        let bytes = self
            .store
            .get_bytes(conversation_id, filename)?
            .ok_or_else(|| Error::NotFound(format!("{conversation_id}/{filename}")))?;

        let Some(expected) = meta.content_hash else {
            return Ok(false);
        };
        let computed = hex::encode(Sha256::digest(&bytes));
        if expected.eq_ignore_ascii_case(&computed) {
            self.store.set_verified(conversation_id, filename, true)?;
            Ok(true)
        } else {
            self.store.set_verified(conversation_id, filename, false)?;
            Ok(false)
        }
    }

    /// Removes all cached blobs for one conversation.
    pub fn clear_conversation(&mut self, conversation_id: &str) -> Result<usize> {
        self.store.delete_conversation(conversation_id)
    }

    /// Removes everything from the cache.
    pub fn clear_all(&mut self) -> Result<usize> {
        self.store.clear_all()
    }

    /// Current cache totals and activity counters.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            entries: self.store.count()?,
            total_bytes: self.store.total_size()?,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        })
    }

    /// Post-download eviction check with hysteresis.
    fn evict_if_over_high_water(&mut self) {
        let total = match self.store.total_size() {
            Ok(total) => total,
            Err(e) => {
                tracing::error!("cache size check failed: {e}");
                return;
            }
        };
        if total <= self.config.high_water_bytes {
            return;
        }
        let target = total - self.config.low_water_bytes;
        match self.evict_oldest(target) {
            Ok(freed) => {
                tracing::debug!(total, freed, "cache over high-water mark, evicted");
            }
            Err(e) => {
                // The triggering download already succeeded; don't fail it.
                tracing::error!("eviction failed: {e}");
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
