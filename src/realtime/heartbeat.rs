// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ping/pong liveness tracking
//!
//! Transport close events do not always arrive (a NAT mapping can vanish
//! silently), so the session pings on an interval and declares the link
//! dead once nothing has been heard for longer than the liveness window.
//! The monitor is pure state; the session owns the timer and asks
//! [`HeartbeatMonitor::next_wakeup`] when to run [`HeartbeatMonitor::poll`].

use std::time::Duration;
use tokio::time::Instant;

use crate::config::RealtimeConfig;

/// Floor for the ping interval so a zero setting cannot spin the timer
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What the session should do at a wakeup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping frame
    Ping,
    /// No pong for longer than the liveness window
    Dead { silent_for: Duration },
    /// Nothing due yet
    Wait,
}

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    liveness: Duration,
    started_at: Instant,
    last_pong_at: Option<Instant>,
    next_ping_at: Instant,
}

impl HeartbeatMonitor {
    /// Start monitoring a link that opened at `now`.
    pub fn start(interval: Duration, liveness: Duration, now: Instant) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        Self {
            interval,
            liveness,
            started_at: now,
            last_pong_at: None,
            next_ping_at: now + interval,
        }
    }

    pub fn from_config(config: &RealtimeConfig, now: Instant) -> Self {
        Self::start(
            Duration::from_millis(config.heartbeat_interval_ms),
            Duration::from_millis(config.liveness_timeout_ms),
            now,
        )
    }

    pub fn record_pong(&mut self, now: Instant) {
        self.last_pong_at = Some(now);
    }

    pub fn last_pong_at(&self) -> Option<Instant> {
        self.last_pong_at
    }

    /// Last proof of life; the open itself counts until the first pong.
    fn reference(&self) -> Instant {
        self.last_pong_at.unwrap_or(self.started_at)
    }

    pub fn poll(&mut self, now: Instant) -> HeartbeatAction {
        let silent_for = now.saturating_duration_since(self.reference());
        if silent_for > self.liveness {
            return HeartbeatAction::Dead { silent_for };
        }
        if now >= self.next_ping_at {
            self.next_ping_at = now + self.interval;
            return HeartbeatAction::Ping;
        }
        HeartbeatAction::Wait
    }

    /// Earliest instant at which `poll` can return something other than `Wait`.
    pub fn next_wakeup(&self) -> Instant {
        let dead_at = self.reference() + self.liveness + Duration::from_millis(1);
        self.next_ping_at.min(dead_at)
    }
}
