#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Combo tracking system that rewards merges performed in quick succession.

use std::time::Duration;

use merge_six_core::{Event, Timer, MAX_COMBO};
use tracing::debug;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Configuration parameters required to construct the combo tracker.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    idle_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with the idle window after which the combo lapses.
    #[must_use]
    pub const fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

/// Pure system counting consecutive merges.
#[derive(Debug)]
pub struct ComboTracker {
    idle_timeout: Duration,
    combo: u32,
    idle: Timer,
}

impl ComboTracker {
    /// Creates a new combo tracker using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            combo: 0,
            idle: Timer::idle(),
        }
    }

    /// Current combo value.
    #[must_use]
    pub const fn combo(&self) -> u32 {
        self.combo
    }

    /// Consumes world events and announces combo changes.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Event>) {
        for event in events {
            match event {
                Event::MergeConfirmed { outcome, .. } if outcome.is_success() => {
                    self.idle.schedule(self.idle_timeout);
                    self.set(self.combo.saturating_add(1).min(MAX_COMBO), out);
                }
                Event::TimeAdvanced { dt } => {
                    if self.idle.advance(*dt) {
                        debug!(combo = self.combo, "combo lapsed");
                        self.set(0, out);
                    }
                }
                Event::BoardBuilt { .. } | Event::SessionRestored { .. } => {
                    self.idle.cancel();
                    self.set(0, out);
                }
                _ => {}
            }
        }
    }

    fn set(&mut self, combo: u32, out: &mut Vec<Event>) {
        if self.combo != combo {
            self.combo = combo;
            out.push(Event::ComboChanged { combo });
        }
    }
}

impl Default for ComboTracker {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
