//! Tick cadence configuration.
//!
//! A process runs two independent cadences: the simulation tick, which
//! drives entity logic through [`Tick`](crate::Tick) events, and the slower
//! network tick, at which changes are detected and flushed.

use std::time::Duration;

/// Configuration for the simulation and network tick cadences.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target simulation ticks per second.
    pub tick_rate: f64,
    /// Target network ticks per second.
    pub network_tick_rate: f64,
    /// Maximum number of simulation ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            network_tick_rate: 20.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Set the simulation tick rate.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Set the network tick rate.
    #[must_use]
    pub fn with_network_tick_rate(mut self, network_tick_rate: f64) -> Self {
        self.network_tick_rate = network_tick_rate;
        self
    }

    /// Stop after this many simulation ticks (0 = unlimited).
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Time between simulation ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        interval_for(self.tick_rate)
    }

    /// Time between network ticks.
    #[must_use]
    pub fn network_interval(&self) -> Duration {
        interval_for(self.network_tick_rate)
    }

    /// Fixed simulation step in seconds.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.tick_interval().as_secs_f32()
    }

    /// Returns `true` once `ticks` has reached a non-zero `max_ticks`.
    #[must_use]
    pub fn is_finished(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }
}

/// Time between ticks at `rate` per second. Non-positive or non-finite
/// rates fall back to one tick per second.
#[must_use]
pub fn interval_for(rate: f64) -> Duration {
    if rate.is_finite() && rate > 0.0 {
        Duration::from_secs_f64(1.0 / rate)
    } else {
        Duration::from_secs(1)
    }
}
