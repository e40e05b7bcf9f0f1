#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wild meter system that charges on merges and converts full charges into wild tiles.
//!
//! Only one spawn request is in flight at a time. A failed spawn keeps its
//! charge and retries after a backoff, unless a cell opens first.

use std::time::Duration;

use merge_six_core::{Command, Event, Outcome, Timer};
use tracing::{debug, warn};

const DEFAULT_ACCUMULATE_CHARGE: f64 = 0.10;
const DEFAULT_EXPLOSION_CHARGE: f64 = 0.22;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(600);
const FULL_CHARGE: f64 = 1.0;
// Absorbs rounding drift from summing decimal charges.
const CHARGE_EPSILON: f64 = 1e-9;

/// Configuration parameters required to construct the wild meter.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    accumulate_charge: f64,
    explosion_charge: f64,
    retry_backoff: Duration,
}

impl Config {
    /// Creates a new configuration from per-merge charges and the retry backoff.
    #[must_use]
    pub const fn new(accumulate_charge: f64, explosion_charge: f64, retry_backoff: Duration) -> Self {
        Self {
            accumulate_charge,
            explosion_charge,
            retry_backoff,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_ACCUMULATE_CHARGE,
            DEFAULT_EXPLOSION_CHARGE,
            DEFAULT_RETRY_BACKOFF,
        )
    }
}

/// Pure system converting merge activity into wild spawn requests.
#[derive(Debug)]
pub struct WildMeter {
    config: Config,
    raw: f64,
    in_flight: bool,
    retry: Timer,
}

impl WildMeter {
    /// Creates a new, empty wild meter.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            raw: 0.0,
            in_flight: false,
            retry: Timer::idle(),
        }
    }

    /// Raw charge, including carried overflow beyond one full charge.
    #[must_use]
    pub const fn raw(&self) -> f64 {
        self.raw
    }

    /// Charge of the partially filled unit, in `0.0..1.0`, for display.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.raw.fract()
    }

    /// Reports whether a spawn request awaits its outcome.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Reports whether a retry is scheduled.
    #[must_use]
    pub const fn is_retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    /// Adds charge directly, outside the merge flow.
    pub fn add(&mut self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.raw += amount;
        }
    }

    /// Consumes world events and emits at most one wild spawn request.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::MergeConfirmed { outcome, .. } => match outcome {
                    Outcome::Accumulated(_) => self.add(self.config.accumulate_charge),
                    Outcome::Exploded(_) => self.add(self.config.explosion_charge),
                    Outcome::Rejected(_) => {}
                },
                Event::WildSpawned { tile, .. } => {
                    self.raw = (self.raw - FULL_CHARGE).max(0.0);
                    self.in_flight = false;
                    self.retry.cancel();
                    debug!(tile = tile.get(), raw = self.raw, "wild charge consumed");
                }
                Event::WildSpawnFailed { reason } => {
                    self.in_flight = false;
                    self.retry.schedule(self.config.retry_backoff);
                    warn!(?reason, raw = self.raw, "wild spawn failed, retrying");
                }
                Event::TileRemoved { .. } => self.cell_opened(),
                Event::TileCreated { tile } if tile.is_hole() => self.cell_opened(),
                Event::TimeAdvanced { dt } => {
                    if self.retry.advance(*dt) {
                        debug!(raw = self.raw, "wild retry due");
                    }
                }
                Event::BoardBuilt {
                    restarted: true, ..
                } => self.reset(0.0),
                Event::SessionRestored { wild_meter_raw } => self.reset(*wild_meter_raw),
                _ => {}
            }
        }

        if !self.in_flight && !self.retry.is_pending() && self.raw + CHARGE_EPSILON >= FULL_CHARGE
        {
            self.in_flight = true;
            out.push(Command::SpawnWild);
        }
    }

    fn cell_opened(&mut self) {
        if self.retry.is_pending() {
            self.retry.cancel();
        }
    }

    fn reset(&mut self, raw: f64) {
        self.raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        self.in_flight = false;
        self.retry.cancel();
    }
}

impl Default for WildMeter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
