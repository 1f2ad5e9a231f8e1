// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection health monitor.
//!
//! Translates channel state transitions into a staged alert level so the
//! UI can escalate gradually instead of flashing a banner on every blip.
//! A startup grace window suppresses alerts while the app is still
//! settling; after the grace expires, alert severity is a pure function
//! of how long the channel has been down.

use rq_core::clock::ClockSource;

use crate::session::ChannelState;

/// Severity of a connection alert, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    /// Connected, or disconnected for less than the info threshold.
    None,
    /// Brief interruption; reconnect likely in progress.
    Info,
    /// Sustained interruption.
    Warning,
    /// Prolonged outage; data may be stale.
    Error,
}

/// Thresholds for the staged alerts, all in milliseconds.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Startup window during which no alert is raised.
    pub grace_ms: u64,
    /// Outage duration at which the alert becomes Info.
    pub info_ms: u64,
    /// Outage duration at which the alert becomes Warning.
    pub warning_ms: u64,
    /// Outage duration at which the alert becomes Error.
    pub error_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            grace_ms: 8_000,
            info_ms: 5_000,
            warning_ms: 15_000,
            error_ms: 30_000,
        }
    }
}

/// Tracks channel downtime and derives the current alert level.
///
/// The grace window is anchored at construction time, not at each
/// disconnect; once it has elapsed every outage is scored purely by
/// duration.
pub struct HealthMonitor<C: ClockSource> {
    clock: C,
    config: HealthConfig,
    grace_until_ms: u64,
    /// Set while the channel is down; cleared on Connected.
    disconnected_since_ms: Option<u64>,
    last_state: ChannelState,
}

impl<C: ClockSource> HealthMonitor<C> {
    pub fn new(clock: C, config: HealthConfig) -> Self {
        let now = clock.now_ms();
        HealthMonitor {
            grace_until_ms: now + config.grace_ms,
            clock,
            config,
            disconnected_since_ms: None,
            last_state: ChannelState::Disconnected,
        }
    }

    /// Push down the end of the grace window, e.g. when the app resumes
    /// from suspend and the channel needs time to re-establish.
    pub fn extend_grace(&mut self) {
        self.grace_until_ms = self.clock.now_ms() + self.config.grace_ms;
    }

    /// Feed a channel state transition into the monitor.
    pub fn on_state(&mut self, state: ChannelState) {
        match state {
            ChannelState::Connected => {
                if self.disconnected_since_ms.take().is_some() {
                    tracing::info!("channel restored");
                }
            }
            ChannelState::Disconnected
            | ChannelState::Connecting
            | ChannelState::Reconnecting { .. } => {
                if self.disconnected_since_ms.is_none() {
                    self.disconnected_since_ms = Some(self.clock.now_ms());
                }
            }
        }
        self.last_state = state;
    }

    /// Current alert level.
    pub fn level(&self) -> AlertLevel {
        let now = self.clock.now_ms();
        if now < self.grace_until_ms {
            return AlertLevel::None;
        }
        let since = match self.disconnected_since_ms {
            Some(since) => since,
            None => return AlertLevel::None,
        };
        let down_ms = now.saturating_sub(since);
        if down_ms >= self.config.error_ms {
            AlertLevel::Error
        } else if down_ms >= self.config.warning_ms {
            AlertLevel::Warning
        } else if down_ms >= self.config.info_ms {
            AlertLevel::Info
        } else {
            AlertLevel::None
        }
    }

    /// How long the channel has been down, in milliseconds. Zero when
    /// connected.
    pub fn downtime_ms(&self) -> u64 {
        match self.disconnected_since_ms {
            Some(since) => self.clock.now_ms().saturating_sub(since),
            None => 0,
        }
    }

    /// The most recent state fed into the monitor.
    pub fn last_state(&self) -> ChannelState {
        self.last_state
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
