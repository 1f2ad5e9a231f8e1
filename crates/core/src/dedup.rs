// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Result deduplicator: collapses concurrent identical fetches and caches
//! results for a short TTL.
//!
//! Two maps drive the behavior:
//! - a TTL cache of completed results, keyed by request key
//! - a map of shared in-flight futures, so concurrent callers for the same
//!   key await one producer invocation instead of issuing their own
//!
//! Failures propagate to every waiter and are never cached. A caller that
//! drops its own await does not cancel the shared fetch; remaining waiters
//! still drive it to completion.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::clock::{ClockSource, SystemClock};
use crate::error::{Error, Result};

/// Default freshness window for cached results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2);

/// Type-erased completed value.
type Value = Arc<dyn Any + Send + Sync>;

/// A shared in-flight fetch. Errors are wrapped in `Arc` so every waiter
/// can observe the same failure.
type SharedFetch = Shared<BoxFuture<'static, std::result::Result<Value, Arc<Error>>>>;

/// A completed result with its production timestamp.
struct CacheSlot {
    produced_at_ms: u64,
    value: Value,
}

/// Process-scoped fetch deduplicator.
///
/// Values are stored type-erased; fetching an existing key at a different
/// type is a caller bug surfaced as [`Error::TypeMismatch`].
pub struct Deduplicator<C: ClockSource = SystemClock> {
    clock: C,
    cache: Mutex<HashMap<String, CacheSlot>>,
    inflight: Mutex<HashMap<String, SharedFetch>>,
}

impl Deduplicator<SystemClock> {
    /// Creates a deduplicator backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Deduplicator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> Deduplicator<C> {
    /// Creates a deduplicator with a custom clock source.
    pub fn with_clock(clock: C) -> Self {
        Deduplicator {
            clock,
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches the value for `key`, invoking `producer` only when no fresh
    /// cached result exists and no identical fetch is already in flight.
    pub async fn fetch<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.fresh(key, ttl) {
            return value.downcast::<T>().map_err(|_| Error::TypeMismatch(key.to_string()));
        }

        let shared = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            match inflight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut: SharedFetch = producer()
                        .map(|r| r.map(|v| Arc::new(v) as Value).map_err(Arc::new))
                        .boxed()
                        .shared();
                    inflight.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.await;

        // First completer removes the in-flight entry; later waiters find
        // it already gone, which is fine.
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).remove(key);

        match result {
            Ok(value) => {
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                cache.insert(
                    key.to_string(),
                    CacheSlot { produced_at_ms: self.clock.now_ms(), value: value.clone() },
                );
                drop(cache);
                value.downcast::<T>().map_err(|_| Error::TypeMismatch(key.to_string()))
            }
            Err(e) => Err(Error::Shared(e)),
        }
    }

    /// Fetches with the default 2-second TTL.
    pub async fn fetch_default<T, F, Fut>(&self, key: &str, producer: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.fetch(key, DEFAULT_TTL, producer).await
    }

    /// Drops the cached result for `key`, forcing recomputation on the
    /// next call. Waiters on an in-flight fetch still receive its result.
    pub fn invalidate(&self, key: &str) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    }

    /// Drops all cached results whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|k, _| !k.starts_with(prefix));
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|k, _| !k.starts_with(prefix));
    }

    /// Returns the cached value for `key` if it is still fresh.
    fn fresh(&self, key: &str, ttl: Duration) -> Option<Value> {
        let now = self.clock.now_ms();
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let slot = cache.get(key)?;
        let ttl_ms = ttl.as_millis() as u64;
        if now.saturating_sub(slot.produced_at_ms) < ttl_ms {
            Some(slot.value.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
