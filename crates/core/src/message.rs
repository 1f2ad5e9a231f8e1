// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chat message model.
//!
//! A message is identified by its server id once confirmed, or by a locally
//! generated temp id while an optimistic send is pending. Both identifiers
//! are kept on the struct so the chat room synchronizer can correlate a
//! server echo back to the pending entry it replaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Delivery status of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Inserted optimistically, not yet confirmed by the server.
    Pending,
    /// Confirmed by the server.
    Sent,
    /// The HTTP send failed; user may retry.
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MessageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(Error::InvalidMessageStatus(other.to_string())),
        }
    }
}

/// Reference to an attachment held by the binary cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Conversation the attachment belongs to.
    pub conversation_id: String,
    /// Filename, unique within the conversation.
    pub filename: String,
    /// MIME type, if the server reported one.
    pub mime_type: Option<String>,
    /// Size in bytes, if the server reported one.
    pub size: Option<u64>,
    /// Where to download the payload from.
    pub source_url: Option<String>,
    /// Expected content hash (SHA-256, hex), if the server reported one.
    pub content_hash: Option<String>,
}

/// One chat message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned id, present once confirmed.
    pub id: Option<u64>,
    /// Client-generated temp id, present for locally-originated messages.
    pub client_temp_id: Option<String>,
    /// Conversation this message belongs to.
    pub conversation_id: String,
    /// Display name of the sender.
    pub sender: String,
    /// Message body.
    pub body: String,
    /// Server-assigned sequence number, monotonic per conversation.
    ///
    /// `None` while the message is pending.
    pub sequence: Option<u64>,
    /// Delivery status.
    pub status: MessageStatus,
    /// Optional attachment reference.
    pub attachment: Option<AttachmentRef>,
    /// Wall-clock send time (local time for pending messages).
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a pending outgoing message with a temp id and no server
    /// id or sequence yet.
    pub fn outgoing(
        conversation_id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
        temp_id: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        ChatMessage {
            id: None,
            client_temp_id: Some(temp_id.into()),
            conversation_id: conversation_id.into(),
            sender: sender.into(),
            body: body.into(),
            sequence: None,
            status: MessageStatus::Pending,
            attachment: None,
            sent_at,
        }
    }

    /// Returns true if this message has not been confirmed by the server.
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
