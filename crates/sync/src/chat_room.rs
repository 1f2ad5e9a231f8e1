// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chat room synchronizer.
//!
//! Per-conversation message state: the sequence-ordered confirmed history,
//! optimistically-inserted pending sends, typing indicators, and other
//! participants' read positions. Confirmed messages are indexed by server
//! id and by client temp id so a server echo of our own send replaces the
//! pending entry instead of duplicating it.
//!
//! Sends go over HTTP and are never auto-retried; a duplicate send is
//! worse than a failed one the user can retry. History reads retry
//! transient failures once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use rq_cache::{BlobCache, CachedBlob, Fetcher};
use rq_core::clock::ClockSource;
use rq_core::error::{Error, Result};
use rq_core::event::ChannelEvent;
use rq_core::message::{AttachmentRef, ChatMessage, MessageStatus};

use crate::api::{retry_with_backoff, ApiClient};

const RETRY_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default page size for history loads.
pub const HISTORY_PAGE: u64 = 50;

/// Synchronizes one conversation's messages.
///
/// Message order invariant: confirmed messages ascending by sequence,
/// followed by pending sends in insertion order.
pub struct ChatRoom<A: ApiClient, C: ClockSource> {
    api: Arc<A>,
    clock: C,
    conversation_id: String,
    /// Display name used for locally-originated messages.
    sender: String,
    messages: Vec<ChatMessage>,
    by_id: HashMap<u64, usize>,
    by_temp_id: HashMap<String, usize>,
    latest_sequence: u64,
    /// Set when an incoming sequence skips past `latest_sequence`; the
    /// caller should re-request the initial state snapshot.
    needs_resync: bool,
    temp_counter: u64,
    /// Cursor for the next older history page; `None` before the first
    /// load or once history is exhausted (see `history_complete`).
    older_cursor: Option<String>,
    history_complete: bool,
    typing_users: HashSet<String>,
    read_positions: HashMap<String, u64>,
}

impl<A: ApiClient, C: ClockSource> ChatRoom<A, C> {
    pub fn new(
        api: Arc<A>,
        clock: C,
        conversation_id: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        ChatRoom {
            api,
            clock,
            conversation_id: conversation_id.into(),
            sender: sender.into(),
            messages: Vec::new(),
            by_id: HashMap::new(),
            by_temp_id: HashMap::new(),
            latest_sequence: 0,
            needs_resync: false,
            temp_counter: 0,
            older_cursor: None,
            history_complete: false,
            typing_users: HashSet::new(),
            read_positions: HashMap::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Highest confirmed sequence seen so far.
    pub fn latest_sequence(&self) -> u64 {
        self.latest_sequence
    }

    /// True when a sequence gap was detected and the caller should
    /// re-request the room snapshot.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Users currently typing, in no particular order.
    pub fn typing_users(&self) -> Vec<&str> {
        self.typing_users.iter().map(String::as_str).collect()
    }

    /// Another participant's last-read sequence, if known.
    pub fn read_position(&self, user: &str) -> Option<u64> {
        self.read_positions.get(user).copied()
    }

    /// Apply a channel event scoped to this conversation.
    pub fn apply_event(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::InitialState { messages, latest_sequence, .. } => {
                self.apply_initial_state(messages.clone(), *latest_sequence);
            }
            ChannelEvent::NewMessage { message, .. } => {
                self.apply_new_message(message.clone());
            }
            ChannelEvent::Typing { user, is_typing, .. } => {
                if *is_typing {
                    self.typing_users.insert(user.clone());
                } else {
                    self.typing_users.remove(user);
                }
            }
            ChannelEvent::ReadStatus { user, last_read_sequence, .. } => {
                let position = self.read_positions.entry(user.clone()).or_insert(0);
                *position = (*position).max(*last_read_sequence);
            }
            ChannelEvent::Update { .. } | ChannelEvent::ListUpdate { .. } => {}
        }
    }

    /// Replace the confirmed history with the room snapshot.
    ///
    /// Pending sends not yet echoed by the snapshot survive; anything the
    /// snapshot confirms (by id or temp id) is dropped in favor of the
    /// server copy.
    pub fn apply_initial_state(&mut self, messages: Vec<ChatMessage>, latest_sequence: u64) {
        let confirmed_ids: HashSet<u64> = messages.iter().filter_map(|m| m.id).collect();
        let confirmed_temp_ids: HashSet<&str> =
            messages.iter().filter_map(|m| m.client_temp_id.as_deref()).collect();

        let kept_pending: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| {
                m.is_pending()
                    && m.id.map_or(true, |id| !confirmed_ids.contains(&id))
                    && m.client_temp_id
                        .as_deref()
                        .map_or(true, |t| !confirmed_temp_ids.contains(t))
            })
            .cloned()
            .collect();

        self.messages = messages;
        self.messages.extend(kept_pending);
        self.latest_sequence = latest_sequence;
        self.needs_resync = false;
        self.reindex();
    }

    /// Merge one incoming confirmed message.
    ///
    /// Idempotent by server id. A message carrying our temp id replaces
    /// the pending entry it confirms.
    pub fn apply_new_message(&mut self, mut message: ChatMessage) {
        if let Some(id) = message.id {
            if let Some(&pos) = self.by_id.get(&id) {
                self.messages[pos] = message;
                self.reindex();
                return;
            }
            if message.status == MessageStatus::Pending {
                // A message with a server id is confirmed by definition.
                message.status = MessageStatus::Sent;
            }
        }

        if let Some(temp_id) = message.client_temp_id.clone() {
            if let Some(&pos) = self.by_temp_id.get(&temp_id) {
                self.messages.remove(pos);
            }
        }

        if let Some(sequence) = message.sequence {
            if self.latest_sequence > 0 && sequence > self.latest_sequence + 1 {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    expected = self.latest_sequence + 1,
                    got = sequence,
                    "sequence gap, snapshot resync needed"
                );
                self.needs_resync = true;
            }
            self.latest_sequence = self.latest_sequence.max(sequence);
            let at = self
                .messages
                .partition_point(|m| m.sequence.map_or(false, |s| s <= sequence));
            self.messages.insert(at, message);
        } else {
            self.messages.push(message);
        }
        self.reindex();
    }

    /// Load one page of older history, retrying transient failures.
    ///
    /// Returns true if more history remains.
    pub async fn load_older(&mut self, limit: u64) -> Result<bool> {
        if self.history_complete {
            return Ok(false);
        }
        let api = Arc::clone(&self.api);
        let conversation_id = self.conversation_id.clone();
        let cursor = self.older_cursor.clone();
        let page = retry_with_backoff(RETRY_ATTEMPTS, RETRY_DELAY, || {
            let api = api.clone();
            let conversation_id = conversation_id.clone();
            let cursor = cursor.clone();
            async move {
                api.fetch_messages(&conversation_id, cursor.as_deref(), limit).await
            }
        })
        .await?;

        let fresh: Vec<ChatMessage> = page
            .messages
            .into_iter()
            .filter(|m| m.id.map_or(true, |id| !self.by_id.contains_key(&id)))
            .collect();

        // Older pages arrive oldest-first and precede everything held.
        let mut merged = fresh;
        merged.append(&mut self.messages);
        self.messages = merged;
        self.history_complete = page.next_cursor.is_none();
        self.older_cursor = page.next_cursor;
        self.reindex();
        Ok(!self.history_complete)
    }

    /// Send a message: optimistic pending insert, then the HTTP call.
    ///
    /// On failure the pending entry is marked failed and kept so the user
    /// can retry; the error propagates. Never auto-retried.
    pub async fn send(&mut self, body: &str) -> Result<ChatMessage> {
        self.temp_counter += 1;
        let temp_id = format!("tmp-{}-{}", self.clock.now_ms(), self.temp_counter);
        let pending =
            ChatMessage::outgoing(&self.conversation_id, &self.sender, body, &temp_id, Utc::now());
        self.messages.push(pending);
        self.reindex();

        self.dispatch(&temp_id, body).await
    }

    /// Retry a failed send, reusing its temp id so the server can
    /// deduplicate if the original actually landed.
    pub async fn retry_send(&mut self, temp_id: &str) -> Result<ChatMessage> {
        let pos = *self
            .by_temp_id
            .get(temp_id)
            .ok_or_else(|| Error::NotFound(format!("message {temp_id}")))?;
        if self.messages[pos].status != MessageStatus::Failed {
            return Err(Error::Storage(format!("message {temp_id} is not in a failed state")));
        }
        let body = self.messages[pos].body.clone();
        self.messages[pos].status = MessageStatus::Pending;

        self.dispatch(temp_id, &body).await
    }

    /// Set the delivery status of a locally-originated message, for
    /// callers that drive the HTTP persist themselves.
    pub fn update_message_status(&mut self, temp_id: &str, status: MessageStatus) -> Result<()> {
        let pos = *self
            .by_temp_id
            .get(temp_id)
            .ok_or_else(|| Error::NotFound(format!("message {temp_id}")))?;
        self.messages[pos].status = status;
        Ok(())
    }

    async fn dispatch(&mut self, temp_id: &str, body: &str) -> Result<ChatMessage> {
        let result = self.api.send_message(&self.conversation_id, body, temp_id).await;
        match result {
            Ok(confirmed) => {
                self.apply_new_message(confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                if let Some(&pos) = self.by_temp_id.get(temp_id) {
                    self.messages[pos].status = MessageStatus::Failed;
                }
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    temp_id,
                    "send failed: {e}"
                );
                Err(e)
            }
        }
    }

    /// Download a message attachment through the binary cache and return
    /// its payload. A cached copy is served without a network fetch.
    pub async fn fetch_attachment<F, C2>(
        &self,
        cache: &mut BlobCache<F, C2>,
        attachment: &AttachmentRef,
    ) -> Result<CachedBlob>
    where
        F: Fetcher,
        C2: ClockSource,
    {
        let url = attachment
            .source_url
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("no source url for {}", attachment.filename)))?;
        cache
            .download(
                &attachment.conversation_id,
                &attachment.filename,
                url,
                attachment.size,
                attachment.content_hash.as_deref(),
                0,
            )
            .await?;
        cache
            .get(&attachment.conversation_id, &attachment.filename)?
            .ok_or_else(|| Error::NotFound(attachment.filename.clone()))
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_temp_id.clear();
        for (pos, message) in self.messages.iter().enumerate() {
            if let Some(id) = message.id {
                self.by_id.insert(id, pos);
            }
            if let Some(temp_id) = &message.client_temp_id {
                self.by_temp_id.insert(temp_id.clone(), pos);
            }
        }
    }
}

#[cfg(test)]
#[path = "chat_room_tests.rs"]
mod tests;
