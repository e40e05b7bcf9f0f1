#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Board lifecycle system deciding when a board is clean, stuck, or out of moves.
//!
//! Evaluation after a merge is deferred until the presentation reports the
//! merge's visual ticket as complete, or until a fallback timer fires. Once an
//! end-of-board flow starts the system waits for the end delay and then asks
//! the world for the next board or a fresh session.

use std::time::Duration;

use merge_six_core::{BoardEnd, BoardView, Command, Event, Timer, VisualTicket, EXPLOSION_VALUE};
use tracing::{debug, info};

const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(900);
const DEFAULT_END_DELAY: Duration = Duration::from_millis(1_200);
const DEFAULT_RESCUE_MAX: u32 = 3;

/// Treatment of a board whose only active tile is a single numbered tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoneTilePolicy {
    /// The board is stuck and the session restarts.
    #[default]
    Stuck,
    /// One rescue spawn is attempted before declaring the board stuck.
    Rescue,
}

/// Configuration parameters required to construct the lifecycle system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    fallback_delay: Duration,
    end_delay: Duration,
    rescue_max: u32,
    lone_tile: LoneTilePolicy,
}

impl Config {
    /// Creates a new configuration.
    #[must_use]
    pub const fn new(fallback_delay: Duration, end_delay: Duration) -> Self {
        Self {
            fallback_delay,
            end_delay,
            rescue_max: DEFAULT_RESCUE_MAX,
            lone_tile: LoneTilePolicy::Stuck,
        }
    }

    /// Overrides the upper bound of tiles opened by a rescue spawn.
    #[must_use]
    pub const fn with_rescue_max(mut self, rescue_max: u32) -> Self {
        self.rescue_max = rescue_max;
        self
    }

    /// Overrides the treatment of a lone numbered tile.
    #[must_use]
    pub const fn with_lone_tile_policy(mut self, policy: LoneTilePolicy) -> Self {
        self.lone_tile = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_DELAY, DEFAULT_END_DELAY)
    }
}

/// Coarse state of the current board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Merges are accepted and no evaluation is pending.
    Playing,
    /// A merge happened and the board awaits evaluation.
    Evaluating,
    /// An end-of-board flow is running.
    Ending(BoardEnd),
}

/// Reports whether no playable tile remains; placeholders do not count.
#[must_use]
pub fn is_board_clean(view: &BoardView) -> bool {
    view.active().next().is_none()
}

/// Reports whether no legal merge remains among the active tiles.
#[must_use]
pub fn is_stuck(view: &BoardView) -> bool {
    let mut active = 0usize;
    let mut wild = false;
    let mut numbered: Vec<u8> = Vec::new();
    for tile in view.active() {
        active += 1;
        if tile.is_wild() {
            wild = true;
        } else {
            numbered.push(tile.value);
        }
    }
    if wild && !numbered.is_empty() {
        return false;
    }
    if active < 2 {
        return true;
    }
    numbered.sort_unstable();
    match numbered.as_slice() {
        [first, second, ..] => first + second > EXPLOSION_VALUE,
        _ => true,
    }
}

/// Stateful system driving the board lifecycle state machine.
#[derive(Debug)]
pub struct BoardLifecycle {
    config: Config,
    phase: Phase,
    awaiting: Option<VisualTicket>,
    fallback: Timer,
    end_timer: Timer,
    rescue_attempted: bool,
}

impl BoardLifecycle {
    /// Creates a new lifecycle system in the playing phase.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Playing,
            awaiting: None,
            fallback: Timer::idle(),
            end_timer: Timer::idle(),
            rescue_attempted: false,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Visual ticket whose completion triggers the pending evaluation.
    #[must_use]
    pub const fn awaiting(&self) -> Option<VisualTicket> {
        self.awaiting
    }

    /// Consumes world events and emits lifecycle commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        view: &BoardView,
        moves_remaining: u32,
        out: &mut Vec<Command>,
    ) {
        let mut due = false;
        for event in events {
            match event {
                Event::MergeConfirmed { outcome, ticket } if outcome.is_success() => {
                    self.phase = Phase::Evaluating;
                    self.awaiting = Some(*ticket);
                    self.rescue_attempted = false;
                    self.fallback.schedule(self.config.fallback_delay);
                }
                Event::VisualCompleted { ticket } => {
                    if self.awaiting == Some(*ticket) {
                        due = true;
                    }
                }
                Event::TimeAdvanced { dt } => {
                    if self.fallback.advance(*dt) {
                        debug!(ticket = ?self.awaiting, "visual fallback elapsed");
                        due = true;
                    }
                    if self.end_timer.advance(*dt) {
                        self.finish_end(out);
                    }
                }
                Event::RescueSpawned { .. } => due = true,
                Event::BoardEndStarted { end } => {
                    self.phase = Phase::Ending(*end);
                    self.awaiting = None;
                    self.fallback.cancel();
                    self.end_timer.schedule(self.config.end_delay);
                }
                Event::BoardBuilt { .. } => self.reset(),
                Event::SessionRestored { .. } => {
                    self.reset();
                    due = true;
                }
                _ => {}
            }
        }

        if due {
            self.evaluate(view, moves_remaining, out);
        }
    }

    fn evaluate(&mut self, view: &BoardView, moves_remaining: u32, out: &mut Vec<Command>) {
        if matches!(self.phase, Phase::Ending(_)) || view.is_busy_ending() {
            return;
        }
        self.awaiting = None;
        self.fallback.cancel();

        if is_board_clean(view) {
            self.begin_end(BoardEnd::Cleared, out);
        } else if is_stuck(view) {
            if self.rescue_allowed(view) {
                self.rescue_attempted = true;
                self.phase = Phase::Evaluating;
                info!(max = self.config.rescue_max, "board stuck, attempting rescue");
                out.push(Command::RescueSpawn {
                    max: self.config.rescue_max,
                });
            } else {
                self.begin_end(BoardEnd::Stuck, out);
            }
        } else if moves_remaining == 0 {
            self.begin_end(BoardEnd::OutOfMoves, out);
        } else {
            self.phase = Phase::Playing;
        }
    }

    fn rescue_allowed(&self, view: &BoardView) -> bool {
        if self.rescue_attempted {
            return false;
        }
        let mut wild = 0usize;
        let mut numbered = 0usize;
        for tile in view.active() {
            if tile.is_wild() {
                wild += 1;
            } else {
                numbered += 1;
            }
        }
        match (wild, numbered) {
            (wild, 0) => wild > 0,
            (0, 1) => self.config.lone_tile == LoneTilePolicy::Rescue,
            _ => false,
        }
    }

    fn begin_end(&self, end: BoardEnd, out: &mut Vec<Command>) {
        debug!(?end, "board evaluation finished");
        out.push(Command::BeginBoardEnd { end });
    }

    fn finish_end(&self, out: &mut Vec<Command>) {
        if let Phase::Ending(end) = self.phase {
            if end.is_clear() {
                out.push(Command::AdvanceBoard);
            } else {
                out.push(Command::RestartSession);
            }
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Playing;
        self.awaiting = None;
        self.fallback.cancel();
        self.end_timer.cancel();
        self.rescue_attempted = false;
    }
}

impl Default for BoardLifecycle {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
