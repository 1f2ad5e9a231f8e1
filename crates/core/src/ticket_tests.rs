// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::Utc;
use yare::parameterized;

fn ticket(id: &str, status: TicketStatus, unread: i64) -> Ticket {
    let mut t = Ticket::new(id, "subject", status, Utc::now());
    t.unread_count = unread;
    t
}

#[parameterized(
    open = { "open", TicketStatus::Open },
    pending = { "pending", TicketStatus::Pending },
    solved = { "solved", TicketStatus::Solved },
    closed = { "closed", TicketStatus::Closed },
)]
fn status_parse(s: &str, expected: TicketStatus) {
    assert_eq!(s.parse::<TicketStatus>().unwrap(), expected);
    assert_eq!(expected.to_string(), s);
}

#[test]
fn status_parse_invalid() {
    let err = "bogus".parse::<TicketStatus>().unwrap_err();
    assert!(matches!(err, Error::InvalidStatus(_)));
}

#[test]
fn status_serde_snake_case() {
    let json = serde_json::to_string(&TicketStatus::Open).unwrap();
    assert_eq!(json, "\"open\"");
}

#[test]
fn new_ticket_has_no_unread() {
    let t = Ticket::new("t-1", "Printer on fire", TicketStatus::Open, Utc::now());
    assert!(!t.is_unread());
    assert_eq!(t.unread_count, 0);
}

#[test]
fn default_filter_matches_everything() {
    let filter = TicketFilter::default();
    assert!(filter.matches(&ticket("t-1", TicketStatus::Open, 0)));
    assert!(filter.matches(&ticket("t-2", TicketStatus::Closed, 5)));
}

#[test]
fn status_filter() {
    let filter = TicketFilter { status: Some(TicketStatus::Open), unread_only: false };
    assert!(filter.matches(&ticket("t-1", TicketStatus::Open, 0)));
    assert!(!filter.matches(&ticket("t-2", TicketStatus::Closed, 0)));
}

#[test]
fn unread_filter() {
    let filter = TicketFilter { status: None, unread_only: true };
    assert!(filter.matches(&ticket("t-1", TicketStatus::Open, 3)));
    assert!(!filter.matches(&ticket("t-2", TicketStatus::Open, 0)));
}

#[test]
fn combined_filter() {
    let filter = TicketFilter { status: Some(TicketStatus::Pending), unread_only: true };
    assert!(filter.matches(&ticket("t-1", TicketStatus::Pending, 1)));
    assert!(!filter.matches(&ticket("t-2", TicketStatus::Pending, 0)));
    assert!(!filter.matches(&ticket("t-3", TicketStatus::Open, 1)));
}
