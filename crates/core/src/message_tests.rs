// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::Utc;
use yare::parameterized;

#[parameterized(
    pending = { "pending", MessageStatus::Pending },
    sent = { "sent", MessageStatus::Sent },
    failed = { "failed", MessageStatus::Failed },
)]
fn status_parse(s: &str, expected: MessageStatus) {
    assert_eq!(s.parse::<MessageStatus>().unwrap(), expected);
    assert_eq!(expected.to_string(), s);
}

#[test]
fn status_parse_invalid() {
    let err = "delivered".parse::<MessageStatus>().unwrap_err();
    assert!(matches!(err, Error::InvalidMessageStatus(_)));
}

#[test]
fn outgoing_message_is_pending() {
    let msg = ChatMessage::outgoing("conv-1", "alice", "hello", "tmp-1", Utc::now());
    assert!(msg.is_pending());
    assert_eq!(msg.id, None);
    assert_eq!(msg.sequence, None);
    assert_eq!(msg.client_temp_id.as_deref(), Some("tmp-1"));
    assert_eq!(msg.conversation_id, "conv-1");
}

#[test]
fn confirmed_message_is_not_pending() {
    let mut msg = ChatMessage::outgoing("conv-1", "alice", "hello", "tmp-1", Utc::now());
    msg.id = Some(99);
    msg.sequence = Some(4);
    msg.status = MessageStatus::Sent;
    assert!(!msg.is_pending());
}

#[test]
fn message_serde_roundtrip() {
    let mut msg = ChatMessage::outgoing("conv-1", "alice", "hello", "tmp-1", Utc::now());
    msg.attachment = Some(AttachmentRef {
        conversation_id: "conv-1".to_string(),
        filename: "screen.png".to_string(),
        mime_type: Some("image/png".to_string()),
        size: Some(1024),
        source_url: Some("https://files/conv-1/screen.png".to_string()),
        content_hash: None,
    });

    let json = serde_json::to_string(&msg).unwrap();
    let back: ChatMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(msg, back);
}
