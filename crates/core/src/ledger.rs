// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Optimistic update ledger with version fencing.
//!
//! Every locally-applied mutation that has not yet been confirmed by the
//! server gets an entry stamped with a strictly increasing global version.
//! A consumer that starts a snapshot fetch captures `current_version()`
//! first; once the response arrives, `was_unaffected_since(start)` tells it
//! whether any optimistic write landed during the fetch window. If one
//! did, the response may predate that write and the entry must not be
//! cleared — this is what prevents a fast server echo of stale data from
//! overwriting a newer local action.
//!
//! Entries expire after a fixed TTL (default 120s) so a confirmation that
//! never arrives cannot pin the client to stale local state forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::clock::{ClockSource, SystemClock};

/// Default time-to-live for ledger entries, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 120_000;

/// One unconfirmed local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticEntry {
    /// The locally-believed value (e.g. unread count).
    pub value: i64,
    /// Wall-clock time the entry was recorded.
    pub recorded_at_ms: u64,
    /// Global version assigned at write time.
    pub version: u64,
}

/// Process-scoped ledger of unconfirmed local mutations, keyed by ticket id.
pub struct OptimisticLedger<C: ClockSource = SystemClock> {
    clock: C,
    ttl_ms: u64,
    version: AtomicU64,
    entries: Mutex<HashMap<String, OptimisticEntry>>,
}

impl OptimisticLedger<SystemClock> {
    /// Creates a ledger backed by the system clock with the default TTL.
    pub fn new() -> Self {
        Self::with_clock(SystemClock, DEFAULT_TTL_MS)
    }
}

impl Default for OptimisticLedger<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> OptimisticLedger<C> {
    /// Creates a ledger with a custom clock source and TTL.
    pub fn with_clock(clock: C, ttl_ms: u64) -> Self {
        OptimisticLedger {
            clock,
            ttl_ms,
            version: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a local mutation and returns the version assigned to it.
    ///
    /// Versions are strictly increasing across the process lifetime.
    pub fn record(&self, ticket_id: &str, value: i64) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = OptimisticEntry {
            value,
            recorded_at_ms: self.clock.now_ms(),
            version,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticket_id.to_string(), entry);
        version
    }

    /// Returns the live (non-expired) value for a ticket, if any.
    ///
    /// Expired entries are removed lazily on access.
    pub fn peek(&self, ticket_id: &str) -> Option<i64> {
        self.peek_entry(ticket_id).map(|e| e.value)
    }

    /// Returns the full live entry for a ticket, if any.
    pub fn peek_entry(&self, ticket_id: &str) -> Option<OptimisticEntry> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(ticket_id) {
            Some(entry) if now.saturating_sub(entry.recorded_at_ms) < self.ttl_ms => Some(*entry),
            Some(_) => {
                entries.remove(ticket_id);
                None
            }
            None => None,
        }
    }

    /// Removes the entry for a ticket.
    pub fn clear(&self, ticket_id: &str) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(ticket_id);
    }

    /// Returns the current global version.
    ///
    /// Capture this before starting a fetch to fence against writes that
    /// land while the fetch is in flight.
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Returns true if no optimistic write has happened since
    /// `start_version` was captured.
    pub fn was_unaffected_since(&self, start_version: u64) -> bool {
        self.current_version() == start_version
    }

    /// Number of live entries (expired entries are not counted).
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|e| now.saturating_sub(e.recorded_at_ms) < self.ttl_ms)
            .count()
    }

    /// Returns true if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
