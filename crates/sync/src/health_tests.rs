// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use yare::parameterized;

#[derive(Clone)]
struct MockClock {
    now: Arc<AtomicU64>,
}

impl MockClock {
    fn new(start: u64) -> Self {
        MockClock { now: Arc::new(AtomicU64::new(start)) }
    }

    fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockSource for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn monitor(clock: &MockClock) -> HealthMonitor<MockClock> {
    HealthMonitor::new(clock.clone(), HealthConfig::default())
}

#[test]
fn silent_during_startup_grace() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);

    monitor.on_state(ChannelState::Disconnected);
    clock.advance(7_999);
    assert_eq!(monitor.level(), AlertLevel::None);
}

#[test]
fn connected_channel_never_alerts() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);

    monitor.on_state(ChannelState::Connected);
    clock.advance(60_000);
    assert_eq!(monitor.level(), AlertLevel::None);
    assert_eq!(monitor.downtime_ms(), 0);
}

#[parameterized(
    below_info = { 4_999, AlertLevel::None },
    at_info = { 5_000, AlertLevel::Info },
    below_warning = { 14_999, AlertLevel::Info },
    at_warning = { 15_000, AlertLevel::Warning },
    below_error = { 29_999, AlertLevel::Warning },
    at_error = { 30_000, AlertLevel::Error },
)]
fn staged_alerts_after_grace(down_ms: u64, expected: AlertLevel) {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);

    // Let the startup grace pass while connected.
    monitor.on_state(ChannelState::Connected);
    clock.advance(8_000);

    monitor.on_state(ChannelState::Disconnected);
    clock.advance(down_ms);
    assert_eq!(monitor.level(), expected);
}

#[test]
fn reconnect_clears_alert() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);
    clock.advance(8_000);

    monitor.on_state(ChannelState::Disconnected);
    clock.advance(20_000);
    assert_eq!(monitor.level(), AlertLevel::Warning);

    monitor.on_state(ChannelState::Connected);
    assert_eq!(monitor.level(), AlertLevel::None);
    assert_eq!(monitor.downtime_ms(), 0);
}

#[test]
fn reconnecting_counts_as_downtime() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);
    clock.advance(8_000);

    monitor.on_state(ChannelState::Reconnecting { attempt: 1 });
    clock.advance(5_000);
    // Repeated attempts do not reset the downtime origin.
    monitor.on_state(ChannelState::Reconnecting { attempt: 2 });
    clock.advance(10_000);
    assert_eq!(monitor.level(), AlertLevel::Warning);
    assert_eq!(monitor.downtime_ms(), 15_000);
}

#[test]
fn extend_grace_suppresses_after_resume() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);
    clock.advance(8_000);

    monitor.on_state(ChannelState::Disconnected);
    clock.advance(20_000);
    assert_eq!(monitor.level(), AlertLevel::Warning);

    monitor.extend_grace();
    assert_eq!(monitor.level(), AlertLevel::None);

    // Once the extended grace lapses the outage has run 39s total.
    clock.advance(10_000);
    assert_eq!(monitor.level(), AlertLevel::Error);
}

#[test]
fn outage_spanning_grace_boundary_scores_full_duration() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);

    // Down from the start; grace masks it for 8s, then the whole
    // accumulated downtime counts.
    monitor.on_state(ChannelState::Disconnected);
    clock.advance(7_000);
    assert_eq!(monitor.level(), AlertLevel::None);
    clock.advance(1_000);
    assert_eq!(monitor.level(), AlertLevel::Info);
    clock.advance(7_000);
    assert_eq!(monitor.level(), AlertLevel::Warning);
}

#[test]
fn last_state_tracks_transitions() {
    let clock = MockClock::new(1_000);
    let mut monitor = monitor(&clock);

    monitor.on_state(ChannelState::Connecting);
    monitor.on_state(ChannelState::Connected);
    assert_eq!(monitor.last_state(), ChannelState::Connected);
}
