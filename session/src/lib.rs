#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Game session wiring the world and every system into one synchronous engine.
//!
//! Adapters drive the session through explicit calls. Each call submits
//! commands to the world, then pumps the resulting events through the
//! systems until no system has anything left to say. Presentation and
//! statistics observers are notified of every event as it is broadcast.

mod config;
mod observer;

use std::time::Duration;

use glam::Vec2;
use merge_six_core::{
    BoardView, CellCoord, Command, Event, OpenSpec, Outcome, TileId, VisualTicket,
};
use merge_six_system_combo::ComboTracker;
use merge_six_system_drag_targeting::DragTargeting;
use merge_six_system_lifecycle::{self as lifecycle, BoardLifecycle, Phase};
use merge_six_system_merge::{MergeContext, MergeResolver};
use merge_six_system_persistence::{
    Clock, KeyValueStore, PersistenceError, PersistenceManager, SaveOutcome,
};
use merge_six_system_wild_meter::WildMeter;
use merge_six_world::{self as world, query, query::SessionStatus, World};
use tracing::{debug, info, warn};

pub use config::{LoneTile, SessionConfig};
pub use observer::{Headless, MergeHelpers, Presentation, StatsSink};

// Upper bound of command rounds per call; a healthy engine settles in a handful.
const MAX_PUMP_ROUNDS: usize = 64;

/// Single-threaded Merge Six engine.
pub struct GameSession {
    world: World,
    merge: MergeResolver,
    targeting: DragTargeting,
    combo: ComboTracker,
    wild_meter: WildMeter,
    lifecycle: BoardLifecycle,
    persistence: PersistenceManager,
    store: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    presentation: Box<dyn Presentation>,
    stats: Box<dyn StatsSink>,
    autosave: bool,
    auto_complete_visuals: bool,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("status", &query::status(&self.world))
            .field("combo", &self.combo.combo())
            .field("wild_meter", &self.wild_meter.raw())
            .field("phase", &self.lifecycle.phase())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Creates a session backed by the provided store and clock.
    ///
    /// Nothing is broadcast until [`GameSession::start`] runs.
    #[must_use]
    pub fn new(config: &SessionConfig, store: Box<dyn KeyValueStore>, clock: Box<dyn Clock>) -> Self {
        Self {
            world: World::with_config(config.world()),
            merge: MergeResolver::new(config.merge()),
            targeting: DragTargeting::new(config.drag_targeting(), config.layout()),
            combo: ComboTracker::new(config.combo()),
            wild_meter: WildMeter::new(config.wild_meter()),
            lifecycle: BoardLifecycle::new(config.lifecycle()),
            persistence: PersistenceManager::new(config.persistence()),
            store,
            clock,
            presentation: Box::new(Headless),
            stats: Box::new(Headless),
            autosave: config.autosave,
            auto_complete_visuals: config.auto_complete_visuals,
        }
    }

    /// Replaces the presentation observer.
    #[must_use]
    pub fn with_presentation(mut self, presentation: Box<dyn Presentation>) -> Self {
        self.presentation = presentation;
        self
    }

    /// Replaces the statistics observer.
    #[must_use]
    pub fn with_stats(mut self, stats: Box<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    /// Resumes the stored session, or builds a fresh first board.
    ///
    /// Returns `true` when a stored session was resumed.
    pub fn start(&mut self) -> bool {
        if self.load() {
            return true;
        }
        let (columns, rows) = query::board_view(&self.world).dimensions();
        self.pump(vec![Command::ConfigureBoard { columns, rows }]);
        false
    }

    /// Merges `source` into `destination`, calling `helpers.snap_back` on rejection.
    pub fn merge(
        &mut self,
        source: TileId,
        destination: TileId,
        helpers: &mut dyn MergeHelpers,
    ) -> Outcome {
        let view = query::board_view(&self.world);
        let context = MergeContext {
            combo: self.combo.combo(),
            first_explosion_done: query::status(&self.world).first_explosion_done,
        };
        let mut commands = Vec::new();
        let outcome = self
            .merge
            .resolve(&view, context, source, destination, &mut commands);

        if let Outcome::Rejected(reason) = outcome {
            debug!(source = source.get(), ?reason, "snapping back");
            if let Some(tile) = view.tile(source) {
                helpers.snap_back(source, tile.cell);
            }
            return outcome;
        }

        self.pump(commands);
        if self.autosave {
            self.autosave();
        }
        outcome
    }

    /// Picks the merge partner under `source` at its current drag position.
    #[must_use]
    pub fn pick_target(&self, source: TileId) -> Option<TileId> {
        let view = query::board_view(&self.world);
        let rect = match self.targeting.dragged_rect() {
            Some(rect) if self.targeting.dragged() == Some(source) => rect,
            _ => self.targeting.layout().cell_rect(view.tile(source)?.cell),
        };
        self.targeting.pick_target(&view, source, rect)
    }

    /// Starts dragging `tile`, grabbed at world-space `pointer`.
    pub fn begin_drag(&mut self, tile: TileId, pointer: Vec2) -> bool {
        let view = query::board_view(&self.world);
        let mut frames = Vec::new();
        let started = self.targeting.begin_drag(&view, tile, pointer, &mut frames);
        self.dispatch(&frames);
        started
    }

    /// Moves the dragged tile, returning the current target.
    pub fn drag_to(&mut self, pointer: Vec2) -> Option<TileId> {
        let view = query::board_view(&self.world);
        let mut frames = Vec::new();
        let target = self.targeting.drag_to(&view, pointer, &mut frames);
        self.dispatch(&frames);
        target
    }

    /// Drops the dragged tile at `pointer`, merging it into the target under it.
    ///
    /// Returns `None` when no drag was active.
    pub fn end_drag(&mut self, pointer: Vec2, helpers: &mut dyn MergeHelpers) -> Option<Outcome> {
        let view = query::board_view(&self.world);
        let mut frames = Vec::new();
        let release = self.targeting.end_drag(&view, pointer, &mut frames);
        self.dispatch(&frames);
        let release = release?;

        match release.target {
            Some(target) => {
                helpers.center_on(release.source, target);
                Some(self.merge(release.source, target, helpers))
            }
            None => {
                helpers.snap_back(release.source, release.origin_cell);
                None
            }
        }
    }

    /// Opens a tile at a specific empty cell.
    pub fn open_at_cell(&mut self, cell: CellCoord, spec: OpenSpec) {
        self.pump(vec![Command::OpenAtCell { cell, spec }]);
    }

    /// Opens up to `count` tiles on random empty cells, avoiding `exclude`.
    pub fn open_empties(&mut self, count: u32, exclude: Option<u8>) {
        self.pump(vec![Command::OpenEmpties { count, exclude }]);
    }

    /// Reports whether no playable tile remains.
    #[must_use]
    pub fn is_board_clean(&self) -> bool {
        lifecycle::is_board_clean(&query::board_view(&self.world))
    }

    /// Reports whether no legal merge remains.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        lifecycle::is_stuck(&query::board_view(&self.world))
    }

    /// Writes the session to the store if it changed.
    pub fn save(&mut self) -> Result<SaveOutcome, PersistenceError> {
        let record = query::session_record(&self.world);
        let now = self.clock.now_ms();
        self.persistence
            .save(self.store.as_mut(), &record, self.wild_meter.raw(), now)
    }

    /// Restores the stored session; returns `false` when nothing usable was stored.
    pub fn load(&mut self) -> bool {
        let now = self.clock.now_ms();
        match self.persistence.load(self.store.as_mut(), now) {
            Ok(loaded) => {
                self.pump(vec![Command::RestoreSession {
                    record: loaded.record,
                    wild_meter_raw: loaded.wild_meter_raw,
                }]);
                true
            }
            Err(PersistenceError::Missing) => false,
            Err(error) => {
                warn!(%error, "stored session unusable");
                false
            }
        }
    }

    /// Saves because the platform hid, backgrounded, or suspended the game.
    pub fn on_platform_hidden(&mut self) {
        match self.save() {
            Ok(outcome) => debug!(?outcome, "saved on platform hide"),
            Err(error) => warn!(%error, "save on platform hide failed"),
        }
    }

    /// Advances simulated time.
    pub fn tick(&mut self, dt: Duration) {
        self.pump(vec![Command::Tick { dt }]);
    }

    /// Reports that the presentation finished animating the merge behind `ticket`.
    pub fn visual_complete(&mut self, ticket: VisualTicket) {
        self.pump(vec![Command::CompleteVisual { ticket }]);
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Snapshot of every tile on the board.
    #[must_use]
    pub fn board_view(&self) -> BoardView {
        query::board_view(&self.world)
    }

    /// Scalar session state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        query::status(&self.world)
    }

    /// Current combo counter.
    #[must_use]
    pub fn combo(&self) -> u32 {
        self.combo.combo()
    }

    /// Raw wild meter charge.
    #[must_use]
    pub fn wild_meter(&self) -> f64 {
        self.wild_meter.raw()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Read-only access to the backing store.
    #[must_use]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn autosave(&mut self) {
        if let Err(error) = self.save() {
            warn!(%error, "autosave failed");
        }
    }

    fn pump(&mut self, commands: Vec<Command>) {
        let mut pending = commands;
        for _ in 0..MAX_PUMP_ROUNDS {
            if pending.is_empty() {
                return;
            }

            let mut events = Vec::new();
            for command in std::mem::take(&mut pending) {
                world::apply(&mut self.world, command, &mut events);
            }

            let mut notices = Vec::new();
            self.targeting.handle(&events, &mut notices);
            self.combo.handle(&events, &mut notices);

            self.wild_meter.handle(&events, &mut pending);
            let view = query::board_view(&self.world);
            let moves = query::status(&self.world).moves;
            self.lifecycle.handle(&events, &view, moves, &mut pending);
            if self.auto_complete_visuals {
                for event in &events {
                    if let Event::MergeConfirmed { ticket, .. } = event {
                        pending.push(Command::CompleteVisual { ticket: *ticket });
                    }
                }
            }

            self.dispatch(&events);
            self.dispatch(&notices);
            self.forget_failed_session(&events);
        }

        if !pending.is_empty() {
            warn!(
                rounds = MAX_PUMP_ROUNDS,
                dropped = pending.len(),
                "engine did not settle"
            );
        }
    }

    fn forget_failed_session(&mut self, events: &[Event]) {
        let restarted = events.iter().any(|event| {
            matches!(
                event,
                Event::BoardBuilt {
                    restarted: true,
                    ..
                }
            )
        });
        if restarted {
            if let Err(error) = self.persistence.clear(self.store.as_mut()) {
                warn!(%error, "could not clear stored session");
            }
        }
    }

    fn dispatch(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::TileCreated { tile } => self.presentation.create_tile(tile),
                Event::TileRemoved { tile, .. } => self.presentation.destroy_tile(*tile),
                Event::TileChanged { tile } => self.presentation.update_tile(tile),
                Event::AssistFrame {
                    tile,
                    offset_x,
                    offset_y,
                    scale,
                } => self
                    .presentation
                    .assist_frame(*tile, *offset_x, *offset_y, *scale),
                Event::MergeConfirmed { outcome, ticket } => {
                    self.presentation.merge_confirmed(outcome, *ticket);
                    if matches!(outcome, Outcome::Exploded(explosion) if explosion.wild_used) {
                        self.stats.wild_used();
                    }
                }
                Event::ScoreChanged { score, .. } => self.stats.score_changed(*score),
                Event::ComboChanged { combo } => self.stats.combo_changed(*combo),
                Event::BoardEndStarted { end } => {
                    if end.is_clear() {
                        let board = query::status(&self.world).board_number;
                        info!(board, "board cleared");
                        self.stats.board_cleared(board);
                    } else {
                        info!(?end, "board failed");
                        self.stats.board_failed(*end);
                    }
                }
                _ => {}
            }
        }
    }
}
