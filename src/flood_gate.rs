//! Global flood protection for inbound commands.
//!
//! One counter shared by every chat, user and command. When the counter
//! reaches the limit the gate closes for a fixed cool-down and every command
//! is dropped until it expires.

use std::time::{Duration, Instant};

/// Process-wide admission counter with a fixed cool-down.
#[derive(Debug)]
pub struct FloodGate {
    count: u32,
    blocked_until: Option<Instant>,
    limit: u32,
    window: Duration,
}

impl FloodGate {
    /// Commands admitted before the gate closes.
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Cool-down in seconds once the gate closes.
    pub const DEFAULT_WINDOW_SECS: u64 = 60;

    /// Create a new gate. A zero limit is treated as one.
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            count: 0,
            blocked_until: None,
            limit: limit.max(1),
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if a command arriving at `now` is admitted and record it.
    /// Returns true if allowed, false if the command must be dropped.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        if let Some(until) = self.blocked_until {
            if now < until {
                return false;
            }
            self.blocked_until = None;
            log::info!("Flood gate reopened");
        }

        self.count += 1;
        if self.count >= self.limit {
            // The command that trips the gate is dropped too.
            self.blocked_until = Some(now + self.window);
            self.count = 0;
            log::warn!(
                "Flood limit of {} reached, dropping all commands for {}s",
                self.limit,
                self.window.as_secs()
            );
            return false;
        }
        true
    }

    pub fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Default for FloodGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, Self::DEFAULT_WINDOW_SECS)
    }
}
