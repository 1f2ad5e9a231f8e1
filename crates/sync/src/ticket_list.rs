// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket list synchronizer.
//!
//! Holds the client's merged view of the requester's tickets. The server
//! snapshot is the base; live optimistic entries (mark-read) overlay it at
//! read time, so a stale snapshot can never resurrect an unread badge the
//! user already dismissed. Version fencing decides when a server response
//! is allowed to confirm (clear) an optimistic entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rq_core::clock::ClockSource;
use rq_core::dedup::Deduplicator;
use rq_core::error::Result;
use rq_core::event::ChannelEvent;
use rq_core::ledger::OptimisticLedger;
use rq_core::ticket::{Ticket, TicketFilter, TicketStatus};

use crate::api::{retry_with_backoff, ApiClient, CancelToken};

/// Tickets fetched per page.
const PAGE_SIZE: u64 = 100;

/// Transient failures get one retry.
const RETRY_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Dedup key for the ticket list snapshot.
const LIST_KEY: &str = "tickets";

/// Synchronizes the ticket list against the HTTP snapshot and the
/// real-time channel.
pub struct TicketListSync<A: ApiClient, C: ClockSource> {
    api: Arc<A>,
    dedup: Arc<Deduplicator<C>>,
    ledger: Arc<OptimisticLedger<C>>,
    /// Last server snapshot, without optimistic overlay.
    tickets: Vec<Ticket>,
}

impl<A: ApiClient + 'static, C: ClockSource> TicketListSync<A, C> {
    pub fn new(
        api: Arc<A>,
        dedup: Arc<Deduplicator<C>>,
        ledger: Arc<OptimisticLedger<C>>,
    ) -> Self {
        TicketListSync { api, dedup, ledger, tickets: Vec::new() }
    }

    /// Refresh the snapshot from the server.
    ///
    /// Concurrent refreshes collapse onto one fetch through the
    /// deduplicator. An optimistic entry is cleared only when the server
    /// echoes its value AND no ledger write landed while the fetch was in
    /// flight; otherwise the response may predate the local action and the
    /// entry stays live.
    pub async fn refresh(&mut self, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let fence = self.ledger.current_version();

        let api = Arc::clone(&self.api);
        let fetched: Arc<Vec<Ticket>> = self
            .dedup
            .fetch_default(LIST_KEY, move || fetch_all_tickets(api))
            .await?;

        cancel.check()?;

        for ticket in fetched.iter() {
            if let Some(entry) = self.ledger.peek_entry(&ticket.id) {
                if ticket.unread_count == entry.value
                    && self.ledger.was_unaffected_since(fence)
                {
                    self.ledger.clear(&ticket.id);
                }
            }
        }
        self.tickets = fetched.as_ref().clone();
        tracing::debug!(count = self.tickets.len(), "ticket list refreshed");
        Ok(())
    }

    /// Mark a ticket read.
    ///
    /// The zero unread count is recorded in the ledger and visible to
    /// readers before the HTTP call starts; the cached list snapshot is
    /// invalidated so the next refresh cannot serve the pre-action state.
    pub async fn mark_read(&mut self, ticket_id: &str) -> Result<Ticket> {
        let version = self.ledger.record(ticket_id, 0);
        self.dedup.invalidate(LIST_KEY);

        let api = Arc::clone(&self.api);
        let id = ticket_id.to_string();
        let result = retry_with_backoff(RETRY_ATTEMPTS, RETRY_DELAY, || {
            let api = api.clone();
            let id = id.clone();
            async move { api.mark_read(&id).await }
        })
        .await;

        match result {
            Ok(ticket) => {
                // Confirm only our own write; a newer entry for the same
                // ticket outranks this response.
                if self.ledger.peek_entry(ticket_id).map(|e| e.version) == Some(version) {
                    self.ledger.clear(ticket_id);
                }
                self.upsert(ticket.clone());
                Ok(ticket)
            }
            Err(e) => {
                // Roll back so the badge reappears instead of lying for
                // the full ledger TTL.
                if self.ledger.peek_entry(ticket_id).map(|e| e.version) == Some(version) {
                    self.ledger.clear(ticket_id);
                }
                tracing::warn!(ticket_id, "mark read failed: {e}");
                Err(e)
            }
        }
    }

    /// Apply a channel event to the snapshot.
    ///
    /// Push events never clear optimistic entries; the overlay keeps
    /// protecting local actions until an explicitly fenced confirmation.
    pub fn apply_event(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::ListUpdate { tickets } => {
                self.tickets = tickets.clone();
            }
            ChannelEvent::Update { ticket, .. } => {
                self.upsert(ticket.clone());
            }
            _ => {}
        }
    }

    /// The merged ticket list: server snapshot with live optimistic
    /// entries overlaid.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.iter().map(|t| self.overlay(t)).collect()
    }

    /// The merged list restricted to a filter.
    pub fn filtered(&self, filter: &TicketFilter) -> Vec<Ticket> {
        self.tickets
            .iter()
            .map(|t| self.overlay(t))
            .filter(|t| filter.matches(t))
            .collect()
    }

    /// Merged view of one ticket.
    pub fn get(&self, ticket_id: &str) -> Option<Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id).map(|t| self.overlay(t))
    }

    /// Total unread messages across the merged list.
    pub fn unread_total(&self) -> i64 {
        self.tickets.iter().map(|t| self.overlay(t).unread_count).sum()
    }

    /// Ticket count per status, computed from the merged list.
    pub fn status_counts(&self) -> HashMap<TicketStatus, usize> {
        let mut counts = HashMap::new();
        for ticket in &self.tickets {
            *counts.entry(self.overlay(ticket).status).or_insert(0) += 1;
        }
        counts
    }

    fn overlay(&self, ticket: &Ticket) -> Ticket {
        let mut merged = ticket.clone();
        if let Some(value) = self.ledger.peek(&ticket.id) {
            merged.unread_count = value;
        }
        merged
    }

    fn upsert(&mut self, ticket: Ticket) {
        match self.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(existing) => *existing = ticket,
            None => self.tickets.push(ticket),
        }
    }
}

/// Fetch every page of the ticket list, retrying transient page failures.
async fn fetch_all_tickets<A: ApiClient>(api: Arc<A>) -> Result<Vec<Ticket>> {
    let mut tickets: Vec<Ticket> = Vec::new();
    let mut offset = 0;
    loop {
        let page = retry_with_backoff(RETRY_ATTEMPTS, RETRY_DELAY, || {
            let api = api.clone();
            async move { api.fetch_tickets(offset, PAGE_SIZE).await }
        })
        .await?;

        let page_len = page.tickets.len() as u64;
        tickets.extend(page.tickets);
        offset += page_len;
        if page_len == 0 || offset >= page.total {
            return Ok(tickets);
        }
    }
}

#[cfg(test)]
#[path = "ticket_list_tests.rs"]
mod tests;
