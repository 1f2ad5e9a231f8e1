// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::fetcher::Fetcher;
use crate::meta::DownloadStatus;
use crate::store::BlobStore;
use rq_core::clock::ClockSource;
use rq_core::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

/// Mock clock for testing with controllable time.
struct MockClock {
    time_ms: AtomicU64,
}

impl MockClock {
    fn new(initial_ms: u64) -> Self {
        MockClock { time_ms: AtomicU64::new(initial_ms) }
    }

    fn advance(&self, ms: u64) {
        self.time_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for MockClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(AtomicOrdering::SeqCst)
    }
}

/// Mock fetcher serving canned payloads by URL.
struct MockFetcher {
    payloads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    fn new() -> Self {
        MockFetcher {
            payloads: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn serve(&self, url: &str, bytes: &[u8]) {
        self.payloads.lock().unwrap().insert(url.to_string(), bytes.to_vec());
    }

    fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn payload_map(&self) -> Arc<Mutex<HashMap<String, Vec<u8>>>> {
        Arc::clone(&self.payloads)
    }
}

impl Fetcher for MockFetcher {
    fn fetch(
        &mut self,
        url: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<u8>>> + Send + '_>> {
        let url = url.to_string();
        let payloads = self.payload_map();
        let calls = self.counter();
        Box::pin(async move {
            calls.fetch_add(1, AtomicOrdering::SeqCst);
            payloads
                .lock()
                .unwrap()
                .get(&url)
                .cloned()
                .ok_or_else(|| Error::Network(format!("unreachable: {url}")))
        })
    }
}

fn test_cache(config: CacheConfig) -> (Arc<MockClock>, BlobCache<MockFetcher, Arc<MockClock>>) {
    let clock = Arc::new(MockClock::new(1_000));
    let store = BlobStore::open_in_memory().unwrap();
    let cache = BlobCache::with_clock(store, MockFetcher::new(), config, Arc::clone(&clock));
    (clock, cache)
}

fn serve(cache: &BlobCache<MockFetcher, Arc<MockClock>>, url: &str, bytes: &[u8]) {
    cache.fetcher.serve(url, bytes);
}

fn fetch_calls(cache: &BlobCache<MockFetcher, Arc<MockClock>>) -> usize {
    cache.fetcher.call_count()
}

#[tokio::test]
async fn download_then_hit_fetches_once() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");

    let first = cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();
    assert_eq!(first, DownloadResult::Stored { size: 7 });

    let second = cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();
    assert_eq!(second, DownloadResult::Hit);
    assert_eq!(fetch_calls(&cache), 1);

    let stats = cache.stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_bytes, 7);
}

#[tokio::test]
async fn get_returns_bytes_and_touches() {
    let (clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");
    cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();

    clock.advance(5_000);
    let blob = cache.get("conv-1", "a.png").unwrap().unwrap();
    assert_eq!(blob.bytes, b"payload");
    assert_eq!(blob.mime_type, "image/png");
    assert_eq!(blob.size, 7);

    let meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    assert_eq!(meta.last_accessed_ms, clock.now_ms());
}

#[tokio::test]
async fn get_miss_counts() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    assert!(cache.get("conv-1", "nope.png").unwrap().is_none());
    assert_eq!(cache.stats().unwrap().misses, 1);
}

#[tokio::test]
async fn failed_fetch_keeps_failed_marker() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());

    let err = cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)));

    let meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    assert_eq!(meta.status, DownloadStatus::Failed);
    assert!(cache.get("conv-1", "a.png").unwrap().is_none());
}

#[tokio::test]
async fn failed_marker_short_circuits_later_downloads() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());

    cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap_err();
    assert_eq!(fetch_calls(&cache), 1);

    // The failed marker stops automatic refetches; retry is explicit.
    let second = cache
        .download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();
    assert_eq!(second, DownloadResult::PreviouslyFailed);
    assert_eq!(fetch_calls(&cache), 1);

    serve(&cache, "https://files/a.png", b"payload");
    let retried = cache
        .retry_download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();
    assert_eq!(retried, DownloadResult::Stored { size: 7 });
    assert_eq!(fetch_calls(&cache), 2);
    assert!(cache.get("conv-1", "a.png").unwrap().is_some());
}

#[tokio::test]
async fn retry_download_on_completed_entry_is_a_hit() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");
    cache.download("conv-1", "a.png", "https://files/a.png", None, None, 0).await.unwrap();

    let result = cache
        .retry_download("conv-1", "a.png", "https://files/a.png", None, None, 0)
        .await
        .unwrap();
    assert_eq!(result, DownloadResult::Hit);
    assert_eq!(fetch_calls(&cache), 1);
}

#[tokio::test]
async fn size_mismatch_warns_but_stores() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");

    let result = cache
        .download("conv-1", "a.png", "https://files/a.png", Some(999), None, 0)
        .await
        .unwrap();
    assert_eq!(result, DownloadResult::Stored { size: 7 });
    assert!(cache.get("conv-1", "a.png").unwrap().is_some());
}

#[tokio::test]
async fn hash_match_marks_verified() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");
    let hash = hex::encode(Sha256::digest(b"payload"));

    cache
        .download("conv-1", "a.png", "https://files/a.png", None, Some(&hash), 0)
        .await
        .unwrap();

    let meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    assert!(meta.verified);
    assert!(cache.verify_integrity("conv-1", "a.png").unwrap());
}

#[tokio::test]
async fn hash_mismatch_surfaces_but_keeps_blob() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");

    let err = cache
        .download("conv-1", "a.png", "https://files/a.png", None, Some("deadbeef"), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));

    // Blob kept, marked unverified, never silently discarded.
    let meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    assert!(!meta.verified);
    assert_eq!(meta.status, DownloadStatus::Completed);
    assert!(cache.get("conv-1", "a.png").unwrap().is_some());
    assert!(!cache.verify_integrity("conv-1", "a.png").unwrap());
}

#[tokio::test]
async fn verify_detects_corruption() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", b"payload");
    let hash = hex::encode(Sha256::digest(b"payload"));
    cache
        .download("conv-1", "a.png", "https://files/a.png", None, Some(&hash), 0)
        .await
        .unwrap();
    assert!(cache.verify_integrity("conv-1", "a.png").unwrap());

    // Corrupt one byte of the stored payload.
    let mut meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    let mut bytes = cache.store.get_bytes("conv-1", "a.png").unwrap().unwrap();
    bytes[0] ^= 0xff;
    meta.verified = false;
    cache.store.insert(&meta, &bytes).unwrap();

    assert!(!cache.verify_integrity("conv-1", "a.png").unwrap());
}

#[tokio::test]
async fn verify_missing_entry_is_not_found() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    let err = cache.verify_integrity("conv-1", "nope.png").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn evict_oldest_respects_pins_and_order() {
    let (clock, mut cache) = test_cache(CacheConfig::default());
    for name in ["old.png", "mid.png", "new.png"] {
        let url = format!("https://files/{name}");
        serve(&cache, &url, &[0u8; 10]);
        cache.download("conv-1", name, &url, None, None, 0).await.unwrap();
        clock.advance(1_000);
    }

    cache.pin("conv-1", "old.png").unwrap();

    // Asking for 15 bytes skips the pinned oldest and removes mid then new.
    let freed = cache.evict_oldest(15).unwrap();
    assert_eq!(freed, 20);
    assert!(cache.get("conv-1", "old.png").unwrap().is_some());
    assert!(cache.get("conv-1", "mid.png").unwrap().is_none());
    assert!(cache.get("conv-1", "new.png").unwrap().is_none());
}

#[tokio::test]
async fn evict_frees_less_when_everything_is_pinned() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    serve(&cache, "https://files/a.png", &[0u8; 10]);
    cache.download("conv-1", "a.png", "https://files/a.png", None, None, 0).await.unwrap();
    cache.pin("conv-1", "a.png").unwrap();

    assert_eq!(cache.evict_oldest(100).unwrap(), 0);
    assert!(cache.get("conv-1", "a.png").unwrap().is_some());
}

#[tokio::test]
async fn pin_is_idempotent_and_tolerates_missing() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    cache.pin("conv-1", "nope.png").unwrap();
    cache.unpin("conv-1", "nope.png").unwrap();

    serve(&cache, "https://files/a.png", b"x");
    cache.download("conv-1", "a.png", "https://files/a.png", None, None, 0).await.unwrap();
    cache.pin("conv-1", "a.png").unwrap();
    cache.pin("conv-1", "a.png").unwrap();
    let meta = cache.store.get_meta("conv-1", "a.png").unwrap().unwrap();
    assert!(meta.pinned);
}

#[tokio::test]
async fn high_water_triggers_eviction_to_low_water() {
    let config = CacheConfig { high_water_bytes: 100, low_water_bytes: 50 };
    let (clock, mut cache) = test_cache(config);

    for name in ["a.bin", "b.bin", "c.bin"] {
        let url = format!("https://files/{name}");
        serve(&cache, &url, &[0u8; 40]);
        cache.download("conv-1", name, &url, None, None, 0).await.unwrap();
        clock.advance(1_000);
    }

    // 120 bytes total exceeded the high-water mark; the two oldest went.
    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_bytes, 40);
    assert_eq!(stats.evictions, 2);
    assert!(cache.get("conv-1", "a.bin").unwrap().is_none());
    assert!(cache.get("conv-1", "c.bin").unwrap().is_some());
}

#[tokio::test]
async fn below_high_water_nothing_is_evicted() {
    let config = CacheConfig { high_water_bytes: 100, low_water_bytes: 50 };
    let (_clock, mut cache) = test_cache(config);

    serve(&cache, "https://files/a.bin", &[0u8; 90]);
    cache.download("conv-1", "a.bin", "https://files/a.bin", None, None, 0).await.unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_bytes, 90);
    assert_eq!(stats.evictions, 0);
}

#[tokio::test]
async fn clear_conversation_and_clear_all() {
    let (_clock, mut cache) = test_cache(CacheConfig::default());
    for (conv, name) in [("conv-1", "a.png"), ("conv-1", "b.png"), ("conv-2", "c.png")] {
        let url = format!("https://files/{conv}/{name}");
        serve(&cache, &url, b"x");
        cache.download(conv, name, &url, None, None, 0).await.unwrap();
    }

    assert_eq!(cache.clear_conversation("conv-1").unwrap(), 2);
    assert!(cache.get("conv-2", "c.png").unwrap().is_some());

    assert_eq!(cache.clear_all().unwrap(), 1);
    assert_eq!(cache.stats().unwrap().entries, 0);
}
