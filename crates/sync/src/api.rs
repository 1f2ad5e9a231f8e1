// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API surface consumed by the synchronizers.
//!
//! The synchronizers never talk to a socket directly; they hold an
//! [`ApiClient`] and let the host application supply the real
//! implementation. Transient failures are retried once with backoff,
//! anything else surfaces immediately.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rq_core::error::{Error, Result};
use rq_core::message::ChatMessage;
use rq_core::ticket::Ticket;

/// One page of the ticket list snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    /// Total tickets on the server, across all pages.
    pub total: u64,
    /// Offset this page starts at.
    pub offset: u64,
}

/// One page of conversation history, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    /// Cursor for the next (older) page, or `None` at the beginning of
    /// history.
    pub next_cursor: Option<String>,
}

type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The slice of the server's HTTP API the sync layer depends on.
pub trait ApiClient: Send + Sync {
    /// Fetch a page of the requester's tickets.
    fn fetch_tickets(&self, offset: u64, limit: u64) -> ApiFuture<'_, TicketPage>;

    /// Fetch a page of conversation history.
    fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
        limit: u64,
    ) -> ApiFuture<'_, MessagePage>;

    /// Mark a ticket read. Returns the server's updated ticket.
    fn mark_read(&self, ticket_id: &str) -> ApiFuture<'_, Ticket>;

    /// Send a chat message. Returns the confirmed message, which carries
    /// the caller's temp id for correlation.
    fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        client_temp_id: &str,
    ) -> ApiFuture<'_, ChatMessage>;
}

/// Run `op` up to `attempts` times, doubling the delay between tries.
///
/// Only transient errors are retried; the last error is returned when
/// every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    initial_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::debug!(attempt, "transient failure, retrying: {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cooperative cancellation handle.
///
/// Refreshes check the token after each await point; a cancelled refresh
/// returns [`Error::Cancelled`] without applying any partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
