// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rq-sync: real-time channel session and data synchronizers
//!
//! Everything that keeps the client's local view consistent with the
//! server: the WebSocket channel session with lazy connect and reconnect,
//! the connection health monitor, and the ticket list and chat room
//! synchronizers that merge HTTP snapshots, optimistic local writes, and
//! pushed events.

pub mod api;
pub mod chat_room;
pub mod health;
pub mod session;
pub mod ticket_list;
pub mod transport;

pub use api::{ApiClient, CancelToken, MessagePage, TicketPage};
pub use chat_room::ChatRoom;
pub use health::{AlertLevel, HealthConfig, HealthMonitor};
pub use session::{ChannelSession, ChannelState, SessionConfig, SubscriptionId};
pub use ticket_list::TicketListSync;
pub use transport::{ChannelTransport, WebSocketTransport};
