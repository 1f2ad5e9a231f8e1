// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rq-core: Shared library for the requester client sync core
//!
//! This crate provides the data model, error taxonomy, and the two leaf
//! services (result deduplicator, optimistic update ledger) used by the
//! cache engine and the synchronizers.

pub mod clock;
pub mod dedup;
pub mod error;
pub mod event;
pub mod ledger;
pub mod message;
pub mod ticket;

pub use clock::{ClockSource, SystemClock};
pub use dedup::Deduplicator;
pub use error::{Error, Result};
pub use event::{ChannelEvent, ClientFrame};
pub use ledger::{OptimisticEntry, OptimisticLedger};
pub use message::{AttachmentRef, ChatMessage, MessageStatus};
pub use ticket::{Ticket, TicketFilter, TicketStatus};
