//! Global throttle on destructive unit updates.
//!
//! Updating a drifted unit means destroying and re-creating it, which takes
//! the workload on that machine down. The gate allows at most one such update
//! per cooldown window across the whole cluster.

use std::time::Duration;

use tokio::time::Instant;

/// A boolean that stays true for `cooldown` after being stamped.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_update: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        CooldownGate {
            cooldown,
            last_update: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true if an update was stamped within the last window.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Instant::now())
    }

    pub fn is_active_at(&self, now: Instant) -> bool {
        match self.last_update {
            Some(at) => now.saturating_duration_since(at) < self.cooldown,
            None => false,
        }
    }

    /// Records that an update happened now.
    pub fn stamp(&mut self) {
        self.stamp_at(Instant::now());
    }

    pub fn stamp_at(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    /// Clears the gate so the next drifted unit may update immediately.
    pub fn reset(&mut self) {
        self.last_update = None;
    }

    /// Time until the gate clears; zero if it is already clear.
    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        match self.last_update {
            Some(at) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(at)),
            None => Duration::ZERO,
        }
    }
}
