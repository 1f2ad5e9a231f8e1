// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket model for the requester client.
//!
//! A [`Ticket`] is the client's view of one support request: the fields the
//! sync core reads from the HTTP snapshot plus the locally-merged unread
//! count. Everything else the server returns is opaque to this layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lifecycle status of a support ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    Solved,
    Closed,
}

impl TicketStatus {
    /// All statuses, in display order.
    pub const ALL: [TicketStatus; 4] =
        [TicketStatus::Open, TicketStatus::Pending, TicketStatus::Solved, TicketStatus::Closed];
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Solved => "solved",
            TicketStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "pending" => Ok(TicketStatus::Pending),
            "solved" => Ok(TicketStatus::Solved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// A support ticket as held by the ticket list synchronizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Server-assigned ticket identifier.
    pub id: String,
    /// Short subject line.
    pub subject: String,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Unread message count as currently believed by the client.
    ///
    /// After a merge this may reflect a live optimistic entry rather than
    /// the raw server value.
    pub unread_count: i64,
    /// Server-side last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a ticket with no unread messages.
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        status: TicketStatus,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Ticket {
            id: id.into(),
            subject: subject.into(),
            status,
            unread_count: 0,
            updated_at,
        }
    }

    /// Returns true if the ticket has unread messages.
    pub fn is_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Filter applied to the merged ticket list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketFilter {
    /// Restrict to one status, or `None` for all.
    pub status: Option<TicketStatus>,
    /// Restrict to tickets with unread messages.
    pub unread_only: bool,
}

impl TicketFilter {
    /// Returns true if the ticket passes this filter.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(status) = self.status {
            if ticket.status != status {
                return false;
            }
        }
        if self.unread_only && !ticket.is_unread() {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
