// SPDX-License-Identifier: GPL-3.0-only

//! Gesture cooldowns and frame rate bookkeeping

use std::time::{Duration, Instant};

/// Minimum spacing between two firings of one action
///
/// Only arming moves the reference point, so a trigger suppressed during the
/// cooldown does not extend it.
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    last_fired: Option<Instant>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Still cooling down at `now`
    pub fn is_active(&self, now: Instant) -> bool {
        self.last_fired
            .is_some_and(|last| now.saturating_duration_since(last) < self.period)
    }

    /// Fire at `now` if allowed; returns whether it fired
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.is_active(now) {
            return false;
        }
        self.last_fired = Some(now);
        true
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }
}

/// Counts frames and reports the rate every `interval` frames
#[derive(Debug, Clone)]
pub struct FpsMeter {
    interval: u64,
    frames: u64,
    window_start: Instant,
}

impl FpsMeter {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Total frames counted
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Count one frame at `now`
    ///
    /// Every `interval`-th frame returns the rate over the window since the
    /// previous report and starts a new window.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames % self.interval != 0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        self.window_start = now;
        if elapsed > 0.0 {
            Some(self.interval as f64 / elapsed)
        } else {
            None
        }
    }
}
