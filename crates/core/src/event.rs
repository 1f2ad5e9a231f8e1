// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed frames exchanged with the real-time channel.
//!
//! The channel is receive-only for message content: the server pushes
//! [`ChannelEvent`]s, and the client sends only subscription management and
//! best-effort indicators ([`ClientFrame`]). User-authored content goes
//! through the HTTP API so persistence stays authoritative.

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::ticket::Ticket;

/// Events pushed from the server over the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Snapshot delivered on room subscription.
    ///
    /// Messages arrive already sorted by sequence number.
    InitialState {
        conversation_id: String,
        messages: Vec<ChatMessage>,
        /// High-water sequence for gap detection.
        latest_sequence: u64,
    },

    /// A new message in a subscribed conversation.
    NewMessage {
        conversation_id: String,
        message: ChatMessage,
    },

    /// Typing indicator from another participant.
    Typing {
        conversation_id: String,
        user: String,
        is_typing: bool,
    },

    /// Another participant's read position changed.
    ReadStatus {
        conversation_id: String,
        user: String,
        last_read_sequence: u64,
    },

    /// Server-side change to a single ticket in a subscribed conversation.
    Update {
        conversation_id: String,
        ticket: Ticket,
    },

    /// Process-scoped update to the ticket list.
    ListUpdate {
        tickets: Vec<Ticket>,
    },
}

impl ChannelEvent {
    /// Returns the conversation this event is scoped to, if any.
    ///
    /// `ListUpdate` is process-scoped and returns `None`.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ChannelEvent::InitialState { conversation_id, .. }
            | ChannelEvent::NewMessage { conversation_id, .. }
            | ChannelEvent::Typing { conversation_id, .. }
            | ChannelEvent::ReadStatus { conversation_id, .. }
            | ChannelEvent::Update { conversation_id, .. } => Some(conversation_id),
            ChannelEvent::ListUpdate { .. } => None,
        }
    }

    /// Serializes the event to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Frames sent from client to server over the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Join a conversation room.
    Subscribe { conversation_id: String },

    /// Leave a conversation room.
    Unsubscribe { conversation_id: String },

    /// Best-effort typing indicator. Never retried.
    Typing {
        conversation_id: String,
        is_typing: bool,
    },

    /// Best-effort read receipt. Never retried.
    ReadReceipt {
        conversation_id: String,
        last_read_sequence: u64,
    },
}

impl ClientFrame {
    /// Creates a Subscribe frame.
    pub fn subscribe(conversation_id: impl Into<String>) -> Self {
        ClientFrame::Subscribe { conversation_id: conversation_id.into() }
    }

    /// Creates an Unsubscribe frame.
    pub fn unsubscribe(conversation_id: impl Into<String>) -> Self {
        ClientFrame::Unsubscribe { conversation_id: conversation_id.into() }
    }

    /// Creates a Typing frame.
    pub fn typing(conversation_id: impl Into<String>, is_typing: bool) -> Self {
        ClientFrame::Typing { conversation_id: conversation_id.into(), is_typing }
    }

    /// Creates a ReadReceipt frame.
    pub fn read_receipt(conversation_id: impl Into<String>, last_read_sequence: u64) -> Self {
        ClientFrame::ReadReceipt {
            conversation_id: conversation_id.into(),
            last_read_sequence,
        }
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
