// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time channel session.
//!
//! Owns the connection lifecycle and the per-conversation subscription
//! registry:
//! - lazy connect: the transport is dialed on the first `subscribe`, never
//!   at process start
//! - reconnect with exponential backoff, carrying an attempt counter
//! - one conversation may have several local subscriptions (multiple
//!   mounted views); the transport-level room subscription is torn down
//!   only when the last local subscriber leaves
//!
//! The channel is receive-only for message content. Typing indicators and
//! read receipts are fire-and-forget sends; user-authored content goes
//! through the HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use rq_core::error::{Error, Result};
use rq_core::event::{ChannelEvent, ClientFrame};

use crate::transport::{ChannelTransport, WebSocketTransport};

/// Configuration for the channel session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// URL of the channel endpoint.
    pub url: String,
    /// Maximum reconnection attempts.
    pub max_retries: u32,
    /// Maximum delay between reconnection attempts (seconds).
    pub max_delay_secs: u64,
    /// Initial delay for exponential backoff (milliseconds).
    pub initial_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            url: "wss://localhost:8443/channel".to_string(),
            max_retries: 10,
            max_delay_secs: 30,
            initial_delay_ms: 100,
        }
    }
}

/// State of the channel connection.
///
/// Exactly one instance exists per session; transitions drive the health
/// monitor and anything awaiting lazy connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not connected.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Connected to the channel.
    Connected,
    /// Reconnecting after a transport drop. Attempt 0 means the drop was
    /// just detected; redial attempts count from 1.
    Reconnecting { attempt: u32 },
}

/// Identifier for one local subscription.
pub type SubscriptionId = u64;

/// Channel session over a pluggable transport.
pub struct ChannelSession<T: ChannelTransport = WebSocketTransport> {
    config: SessionConfig,
    transport: T,
    state: ChannelState,
    next_sub_id: SubscriptionId,
    /// conversation -> local subscription id -> event sink.
    subs: HashMap<String, HashMap<SubscriptionId, UnboundedSender<ChannelEvent>>>,
    /// Process-scoped subscribers for `list_update` events.
    list_subs: HashMap<SubscriptionId, UnboundedSender<ChannelEvent>>,
    /// Observers of state transitions (the health monitor).
    state_subs: Vec<UnboundedSender<ChannelState>>,
}

impl ChannelSession<WebSocketTransport> {
    /// Create a session with the default WebSocket transport.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, WebSocketTransport::new())
    }
}

impl<T: ChannelTransport> ChannelSession<T> {
    /// Create a session with a custom transport (for testing).
    pub fn with_transport(config: SessionConfig, transport: T) -> Self {
        ChannelSession {
            config,
            transport,
            state: ChannelState::Disconnected,
            next_sub_id: 0,
            subs: HashMap::new(),
            list_subs: HashMap::new(),
            state_subs: Vec::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected && self.transport.is_connected()
    }

    /// Register an observer of state transitions.
    pub fn watch_state(&mut self) -> UnboundedReceiver<ChannelState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state_subs.push(tx);
        rx
    }

    fn set_state(&mut self, state: ChannelState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_subs.retain(|tx| tx.send(state).is_ok());
    }

    /// Subscribe to a conversation's events.
    ///
    /// Connects lazily: the first subscription dials the transport and
    /// blocks until connected or failed. Repeated subscriptions to the
    /// same conversation reuse the transport-level room subscription.
    pub async fn subscribe(
        &mut self,
        conversation_id: &str,
    ) -> Result<(SubscriptionId, UnboundedReceiver<ChannelEvent>)> {
        self.connect_if_needed().await?;

        let first_for_room = !self.subs.contains_key(conversation_id);
        if first_for_room {
            self.transport.send(ClientFrame::subscribe(conversation_id)).await?;
        }

        self.next_sub_id += 1;
        let id = self.next_sub_id;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subs.entry(conversation_id.to_string()).or_default().insert(id, tx);
        tracing::debug!(conversation_id, subscription = id, "subscribed");
        Ok((id, rx))
    }

    /// Subscribe to process-scoped ticket list updates.
    pub async fn subscribe_list_updates(
        &mut self,
    ) -> Result<(SubscriptionId, UnboundedReceiver<ChannelEvent>)> {
        self.connect_if_needed().await?;
        self.next_sub_id += 1;
        let id = self.next_sub_id;
        let (tx, rx) = mpsc::unbounded_channel();
        self.list_subs.insert(id, tx);
        Ok((id, rx))
    }

    /// Remove one subscription, or every subscription for the
    /// conversation when no id is given.
    ///
    /// The transport-level room subscription is torn down only when the
    /// last local subscriber leaves.
    pub async fn unsubscribe(
        &mut self,
        conversation_id: &str,
        subscription_id: Option<SubscriptionId>,
    ) -> Result<()> {
        let emptied = match self.subs.get_mut(conversation_id) {
            Some(handlers) => {
                match subscription_id {
                    Some(id) => {
                        handlers.remove(&id);
                    }
                    None => handlers.clear(),
                }
                handlers.is_empty()
            }
            None => return Ok(()),
        };

        if emptied {
            self.subs.remove(conversation_id);
            if self.is_connected() {
                // Best effort: a failed teardown is rediscovered on the
                // next subscribe.
                if let Err(e) = self.transport.send(ClientFrame::unsubscribe(conversation_id)).await
                {
                    tracing::debug!(conversation_id, "room teardown failed: {e}");
                }
            }
        }
        Ok(())
    }

    /// Remove a list-update subscription.
    pub fn unsubscribe_list_updates(&mut self, subscription_id: SubscriptionId) {
        self.list_subs.remove(&subscription_id);
    }

    /// Fire-and-forget typing indicator. Errors are logged, never retried.
    pub async fn send_typing(&mut self, conversation_id: &str, is_typing: bool) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.transport.send(ClientFrame::typing(conversation_id, is_typing)).await {
            tracing::debug!(conversation_id, "typing indicator dropped: {e}");
        }
    }

    /// Fire-and-forget read receipt. Errors are logged, never retried.
    pub async fn send_read_receipt(&mut self, conversation_id: &str, last_read_sequence: u64) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self
            .transport
            .send(ClientFrame::read_receipt(conversation_id, last_read_sequence))
            .await
        {
            tracing::debug!(conversation_id, "read receipt dropped: {e}");
        }
    }

    /// Connect if not already connected.
    async fn connect_if_needed(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.set_state(ChannelState::Connecting);
        match self.transport.connect(&self.config.url).await {
            Ok(()) => {
                self.set_state(ChannelState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(ChannelState::Disconnected);
                Err(e)
            }
        }
    }

    /// Reconnect with exponential backoff.
    ///
    /// Re-subscribes every active room on success so subscribers keep
    /// receiving events across the drop.
    pub async fn reconnect_with_retry(&mut self) -> Result<()> {
        let mut attempt = 0;
        let mut delay_ms = self.config.initial_delay_ms;

        loop {
            attempt += 1;
            self.set_state(ChannelState::Reconnecting { attempt });

            match self.transport.connect(&self.config.url).await {
                Ok(()) => {
                    self.set_state(ChannelState::Connected);
                    self.resubscribe_rooms().await?;
                    return Ok(());
                }
                Err(e) if attempt >= self.config.max_retries => {
                    self.set_state(ChannelState::Disconnected);
                    tracing::warn!(attempt, "reconnect gave up: {e}");
                    return Err(e);
                }
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, self.config.max_delay_secs * 1000);
                }
            }
        }
    }

    /// Re-issue room subscriptions after a reconnect.
    async fn resubscribe_rooms(&mut self) -> Result<()> {
        let rooms: Vec<String> = self.subs.keys().cloned().collect();
        for room in rooms {
            self.transport.send(ClientFrame::subscribe(&room)).await?;
        }
        Ok(())
    }

    /// Receive and dispatch one event.
    ///
    /// Returns `Ok(true)` if an event was dispatched, `Ok(false)` if the
    /// connection dropped. A drop moves the state straight to
    /// `Reconnecting { attempt: 0 }` so observers see the outage before
    /// the caller gets around to `reconnect_with_retry`; attempt numbers
    /// from 1 up are the actual redial attempts.
    pub async fn poll(&mut self) -> Result<bool> {
        if !self.is_connected() {
            return Err(Error::Network("not connected".into()));
        }
        match self.transport.recv().await {
            Ok(Some(event)) => {
                self.dispatch(event);
                Ok(true)
            }
            Ok(None) => {
                self.set_state(ChannelState::Reconnecting { attempt: 0 });
                Ok(false)
            }
            Err(e) => {
                self.set_state(ChannelState::Reconnecting { attempt: 0 });
                Err(e)
            }
        }
    }

    /// Route an event to its conversation's subscribers, or to list
    /// subscribers for process-scoped events. Dropped receivers are
    /// pruned as they are discovered.
    fn dispatch(&mut self, event: ChannelEvent) {
        match event.conversation_id() {
            Some(conversation_id) => {
                if let Some(handlers) = self.subs.get_mut(conversation_id) {
                    handlers.retain(|_, tx| tx.send(event.clone()).is_ok());
                } else {
                    tracing::debug!(conversation_id, "event for unsubscribed conversation");
                }
            }
            None => {
                self.list_subs.retain(|_, tx| tx.send(event.clone()).is_ok());
            }
        }
    }

    /// Number of local subscriptions for a conversation.
    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.subs.get(conversation_id).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
