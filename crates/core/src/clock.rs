// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wall clock access and payload timestamping.
//!
//! Timestamped rules rewrite an inbound payload as `<value>|<unix seconds>`,
//! dropping any stamp the publisher already attached.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Separator between a payload value and its timestamp.
pub const STAMP_SEPARATOR: char = '|';

/// Trait for getting the current wall clock time.
///
/// This allows injecting a fixed clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in seconds since Unix epoch (UTC).
    fn now_secs(&self) -> i64;
}

/// System clock backed by `chrono::Utc`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl<C: ClockSource> ClockSource for &C {
    fn now_secs(&self) -> i64 {
        (*self).now_secs()
    }
}

/// A clock frozen at a settable instant.
#[derive(Debug, Default)]
pub struct FixedClock {
    secs: AtomicI64,
}

impl FixedClock {
    pub fn new(secs: i64) -> Self {
        FixedClock {
            secs: AtomicI64::new(secs),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl ClockSource for FixedClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Wraps a clock so readings never go backwards, even when the wall clock
/// is stepped back.
#[derive(Debug)]
pub struct MonotonicClock<C: ClockSource = SystemClock> {
    clock: C,
    last_secs: AtomicI64,
}

impl MonotonicClock<SystemClock> {
    pub fn system() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: ClockSource> MonotonicClock<C> {
    pub fn with_clock(clock: C) -> Self {
        MonotonicClock {
            clock,
            last_secs: AtomicI64::new(i64::MIN),
        }
    }
}

impl<C: ClockSource> ClockSource for MonotonicClock<C> {
    fn now_secs(&self) -> i64 {
        let physical = self.clock.now_secs();
        let previous = self.last_secs.fetch_max(physical, Ordering::SeqCst);
        physical.max(previous)
    }
}

/// Keeps the text before the first `|` and appends `|<secs>`.
pub fn stamp_payload(payload: &str, secs: i64) -> String {
    let value = payload
        .split_once(STAMP_SEPARATOR)
        .map_or(payload, |(value, _)| value);
    format!("{value}{STAMP_SEPARATOR}{secs}")
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
