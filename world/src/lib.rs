#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Merge Six.

mod board;
mod grid;

use std::collections::BTreeMap;

use merge_six_core::{
    clamp_board_dimensions, BoardEnd, CellCoord, Command, Event, OpenSpec, Outcome,
    PlacementError, SessionRecord, SpawnFailure, StackDepth, TileId, TileKind, TileSnapshot,
    VisualTicket, MAX_BOARD_SIDE, MAX_SPAWN_VALUE, MIN_TILE_VALUE,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::grid::CellGrid;

const DEFAULT_COLUMNS: u32 = 5;
const DEFAULT_ROWS: u32 = 6;
const DEFAULT_SEED: u64 = 0x6d65_7267_655f_7369;
const DEFAULT_MOVES_PER_BOARD: u32 = 30;
const DEFAULT_BOARDS_PER_LEVEL: u32 = 3;
const DEFAULT_CLEAR_BONUS_PER_MOVE: u64 = 5;

/// Rules and dimensions applied when the world builds boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    columns: u32,
    rows: u32,
    seed: u64,
    moves_per_board: u32,
    boards_per_level: u32,
    clear_bonus_per_move: u64,
}

impl WorldConfig {
    /// Creates a new configuration with the provided dimensions and seed.
    ///
    /// Dimensions are clamped to the supported board sides.
    #[must_use]
    pub const fn new(columns: u32, rows: u32, seed: u64) -> Self {
        let (columns, rows) = clamp_board_dimensions(columns, rows);
        Self {
            columns,
            rows,
            seed,
            moves_per_board: DEFAULT_MOVES_PER_BOARD,
            boards_per_level: DEFAULT_BOARDS_PER_LEVEL,
            clear_bonus_per_move: DEFAULT_CLEAR_BONUS_PER_MOVE,
        }
    }

    /// Overrides the number of moves granted per board.
    #[must_use]
    pub const fn with_moves_per_board(mut self, moves: u32) -> Self {
        self.moves_per_board = moves;
        self
    }

    /// Overrides how many boards make up one level.
    #[must_use]
    pub const fn with_boards_per_level(mut self, boards: u32) -> Self {
        self.boards_per_level = if boards == 0 { 1 } else { boards };
        self
    }

    /// Overrides the bonus awarded per remaining move when a board clears.
    #[must_use]
    pub const fn with_clear_bonus_per_move(mut self, bonus: u64) -> Self {
        self.clear_bonus_per_move = bonus;
        self
    }

    /// Number of columns of freshly built boards.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows of freshly built boards.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Seed feeding every random decision of the world.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Moves granted per board.
    #[must_use]
    pub const fn moves_per_board(&self) -> u32 {
        self.moves_per_board
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS, DEFAULT_ROWS, DEFAULT_SEED)
    }
}

/// Represents the authoritative Merge Six world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    grid: CellGrid,
    tiles: BTreeMap<TileId, TileState>,
    next_tile_id: u32,
    next_ticket: u64,
    score: u64,
    best_score: u64,
    level: u32,
    board_number: u32,
    moves: u32,
    moves_made_on_board: u32,
    busy_ending: bool,
    first_explosion_done: bool,
    rng: ChaCha8Rng,
}

impl World {
    /// Creates a new world with the default configuration and a built first board.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a new world from the provided configuration and builds the first board.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let mut world = Self {
            grid: CellGrid::new(config.columns, config.rows),
            tiles: BTreeMap::new(),
            next_tile_id: 0,
            next_ticket: 0,
            score: 0,
            best_score: 0,
            level: 1,
            board_number: 1,
            moves: config.moves_per_board,
            moves_made_on_board: 0,
            busy_ending: false,
            first_explosion_done: false,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        };
        let mut discarded = Vec::new();
        world.build_board(false, &mut discarded);
        world
    }

    fn allocate_tile_id(&mut self) -> TileId {
        let id = TileId::new(self.next_tile_id);
        self.next_tile_id = self.next_tile_id.saturating_add(1);
        id
    }

    fn snapshot(&self, id: TileId) -> Option<TileSnapshot> {
        self.tiles.get(&id).map(|tile| tile.snapshot(id))
    }

    fn insert_tile(
        &mut self,
        cell: CellCoord,
        value: u8,
        locked: bool,
        kind: TileKind,
        stack_depth: StackDepth,
        out_events: &mut Vec<Event>,
    ) -> Option<TileId> {
        if !self.grid.contains(cell) {
            out_events.push(Event::TilePlacementRejected {
                cell,
                reason: PlacementError::OutOfBounds,
            });
            return None;
        }
        if value > merge_six_core::EXPLOSION_VALUE {
            out_events.push(Event::TilePlacementRejected {
                cell,
                reason: PlacementError::InvalidValue,
            });
            return None;
        }

        if let Some(previous) = self.grid.occupant(cell) {
            self.detach_tile(previous, out_events);
        }

        let locked = locked || (kind == TileKind::Normal && value == 0);
        let id = self.allocate_tile_id();
        let state = TileState {
            cell,
            value,
            locked,
            kind,
            stack_depth,
        };
        let _ = self.tiles.insert(id, state);
        self.grid.occupy(cell, id);
        out_events.push(Event::TileCreated {
            tile: state.snapshot(id),
        });
        Some(id)
    }

    fn detach_tile(&mut self, id: TileId, out_events: &mut Vec<Event>) {
        if let Some(tile) = self.tiles.remove(&id) {
            self.grid.vacate(tile.cell, id);
            out_events.push(Event::TileRemoved {
                tile: id,
                cell: tile.cell,
            });
        }
    }

    fn clear_tiles(&mut self, out_events: &mut Vec<Event>) {
        let ids: Vec<TileId> = self.tiles.keys().copied().collect();
        for id in ids {
            self.detach_tile(id, out_events);
        }
    }

    fn open_cells(&self) -> Vec<CellCoord> {
        let mut cells = Vec::new();
        for row in 0..self.grid.rows() {
            for column in 0..self.grid.columns() {
                let cell = CellCoord::new(column, row);
                let open = match self.grid.occupant(cell) {
                    Some(id) => self.tiles.get(&id).map_or(true, TileState::is_hole),
                    None => true,
                };
                if open {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    fn draw_value(&mut self, exclude: Option<u8>) -> u8 {
        let candidates: Vec<u8> = (MIN_TILE_VALUE..=MAX_SPAWN_VALUE)
            .filter(|value| Some(*value) != exclude)
            .collect();
        candidates
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(MIN_TILE_VALUE)
    }

    fn open_random(&mut self, count: u32, exclude: Option<u8>, out_events: &mut Vec<Event>) -> u32 {
        let mut cells = self.open_cells();
        cells.shuffle(&mut self.rng);
        let mut opened = 0;
        for cell in cells.into_iter().take(count as usize) {
            let value = self.draw_value(exclude);
            if self
                .insert_tile(
                    cell,
                    value,
                    false,
                    TileKind::Normal,
                    StackDepth::SINGLE,
                    out_events,
                )
                .is_some()
            {
                opened += 1;
            }
        }
        opened
    }

    fn set_score(&mut self, score: u64, out_events: &mut Vec<Event>) {
        let delta = score.saturating_sub(self.score);
        self.score = score;
        self.best_score = self.best_score.max(score);
        out_events.push(Event::ScoreChanged { score, delta });
    }

    fn level_for_board(&self, board_number: u32) -> u32 {
        1 + board_number.saturating_sub(1) / self.config.boards_per_level.max(1)
    }

    fn build_board(&mut self, restarted: bool, out_events: &mut Vec<Event>) {
        self.clear_tiles(out_events);
        self.level = self.level_for_board(self.board_number);
        self.moves = self.config.moves_per_board;
        self.moves_made_on_board = 0;
        self.busy_ending = false;

        let layout = board::generate(
            self.grid.columns(),
            self.grid.rows(),
            self.level,
            &mut self.rng,
        );
        for seed in layout {
            let _ = self.insert_tile(
                seed.cell,
                seed.value,
                seed.locked,
                TileKind::Normal,
                StackDepth::SINGLE,
                out_events,
            );
        }

        info!(
            board = self.board_number,
            level = self.level,
            moves = self.moves,
            restarted,
            "board built"
        );
        out_events.push(Event::BoardBuilt {
            board_number: self.board_number,
            level: self.level,
            moves: self.moves,
            restarted,
        });
        out_events.push(Event::MovesChanged {
            remaining: self.moves,
        });
    }

    fn restore(&mut self, record: SessionRecord, wild_meter_raw: f64, out_events: &mut Vec<Event>) {
        self.clear_tiles(out_events);
        self.grid = CellGrid::new(
            record.columns.clamp(1, MAX_BOARD_SIDE),
            record.rows.clamp(1, MAX_BOARD_SIDE),
        );
        for cell in &record.grid_snapshot {
            let _ = self.insert_tile(
                CellCoord::new(cell.column, cell.row),
                cell.value,
                cell.locked,
                cell.kind,
                StackDepth::new(cell.stack_depth),
                out_events,
            );
        }

        self.level = record.level.max(1);
        self.board_number = record.board_number.max(1);
        self.moves = record.moves;
        self.moves_made_on_board = record.moves_made_on_board;
        self.first_explosion_done = record.first_explosion_done;
        self.busy_ending = false;
        self.best_score = record.best_score;
        self.set_score(record.score, out_events);
        out_events.push(Event::MovesChanged {
            remaining: self.moves,
        });

        info!(
            board = self.board_number,
            score = self.score,
            tiles = self.tiles.len(),
            "session restored"
        );
        out_events.push(Event::SessionRestored { wild_meter_raw });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureBoard { columns, rows } => {
            let (columns, rows) = clamp_board_dimensions(columns, rows);
            world.config.columns = columns;
            world.config.rows = rows;
            world.clear_tiles(out_events);
            world.grid = CellGrid::new(columns, rows);
            world.board_number = 1;
            world.first_explosion_done = false;
            world.set_score(0, out_events);
            world.build_board(true, out_events);
        }
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::CreateTile {
            cell,
            value,
            locked,
            kind,
        } => {
            let _ = world.insert_tile(cell, value, locked, kind, StackDepth::SINGLE, out_events);
        }
        Command::RemoveTile { tile } => {
            world.detach_tile(tile, out_events);
        }
        Command::SetTileValue {
            tile,
            value,
            stack_increment,
        } => {
            if let Some(state) = world.tiles.get_mut(&tile) {
                state.value = value;
                state.kind = TileKind::Normal;
                state.locked = value == 0;
                state.stack_depth = state.stack_depth.saturating_add(stack_increment);
                let snapshot = state.snapshot(tile);
                out_events.push(Event::TileChanged { tile: snapshot });
            }
        }
        Command::OpenAtCell { cell, spec } => {
            open_at_cell(world, cell, spec, out_events);
        }
        Command::OpenEmpties { count, exclude } => {
            let opened = world.open_random(count, exclude, out_events);
            debug!(requested = count, opened, ?exclude, "opened empty cells");
        }
        Command::SpawnWild => {
            if world.busy_ending {
                out_events.push(Event::WildSpawnFailed {
                    reason: SpawnFailure::BoardBusy,
                });
                return;
            }
            if !world.tiles.values().any(TileState::is_active) {
                out_events.push(Event::WildSpawnFailed {
                    reason: SpawnFailure::BoardClean,
                });
                return;
            }
            let Some(cell) = world.open_cells().choose(&mut world.rng).copied() else {
                out_events.push(Event::WildSpawnFailed {
                    reason: SpawnFailure::NoOpenCell,
                });
                return;
            };
            if let Some(tile) = world.insert_tile(
                cell,
                0,
                false,
                TileKind::Wild,
                StackDepth::SINGLE,
                out_events,
            ) {
                debug!(tile = tile.get(), column = cell.column(), row = cell.row(), "wild spawned");
                out_events.push(Event::WildSpawned { tile, cell });
            }
        }
        Command::RescueSpawn { max } => {
            let upper = max.max(1);
            let count = world.rng.gen_range(1..=upper);
            let opened = world.open_random(count, None, out_events);
            if opened == 0 {
                warn!(requested = count, "rescue spawn found no open cell");
            } else {
                info!(opened, "rescue spawn");
            }
            out_events.push(Event::RescueSpawned { count: opened });
        }
        Command::AddScore { amount } => {
            let score = world.score.saturating_add(amount);
            world.set_score(score, out_events);
        }
        Command::ConfirmMerge { outcome } => {
            if !outcome.is_success() {
                return;
            }
            world.moves = world.moves.saturating_sub(1);
            world.moves_made_on_board = world.moves_made_on_board.saturating_add(1);
            if matches!(outcome, Outcome::Exploded(_)) {
                world.first_explosion_done = true;
            }
            let ticket = VisualTicket::new(world.next_ticket);
            world.next_ticket = world.next_ticket.saturating_add(1);
            out_events.push(Event::MovesChanged {
                remaining: world.moves,
            });
            out_events.push(Event::MergeConfirmed { outcome, ticket });
        }
        Command::CompleteVisual { ticket } => {
            out_events.push(Event::VisualCompleted { ticket });
        }
        Command::BeginBoardEnd { end } => {
            if world.busy_ending {
                debug!(?end, "board end already running");
                return;
            }
            world.busy_ending = true;
            if end == BoardEnd::Cleared {
                let bonus = u64::from(world.moves).saturating_mul(world.config.clear_bonus_per_move);
                if bonus > 0 {
                    let score = world.score.saturating_add(bonus);
                    world.set_score(score, out_events);
                }
            }
            info!(?end, board = world.board_number, "board ending");
            out_events.push(Event::BoardEndStarted { end });
        }
        Command::AdvanceBoard => {
            world.board_number = world.board_number.saturating_add(1);
            world.build_board(false, out_events);
        }
        Command::RestartSession => {
            world.board_number = 1;
            world.first_explosion_done = false;
            world.set_score(0, out_events);
            world.build_board(true, out_events);
        }
        Command::RestoreSession {
            record,
            wild_meter_raw,
        } => {
            world.restore(record, wild_meter_raw, out_events);
        }
    }
}

fn open_at_cell(world: &mut World, cell: CellCoord, spec: OpenSpec, out_events: &mut Vec<Event>) {
    let occupied = world
        .grid
        .occupant(cell)
        .and_then(|id| world.tiles.get(&id))
        .is_some_and(|tile| !tile.is_hole());
    if occupied {
        out_events.push(Event::TilePlacementRejected {
            cell,
            reason: PlacementError::Occupied,
        });
        return;
    }

    if spec.wild {
        let _ = world.insert_tile(cell, 0, false, TileKind::Wild, StackDepth::SINGLE, out_events);
        return;
    }

    let value = match spec.value {
        Some(value) if (MIN_TILE_VALUE..=MAX_SPAWN_VALUE).contains(&value) => value,
        Some(_) => {
            out_events.push(Event::TilePlacementRejected {
                cell,
                reason: PlacementError::InvalidValue,
            });
            return;
        }
        None => world.draw_value(None),
    };
    let _ = world.insert_tile(
        cell,
        value,
        false,
        TileKind::Normal,
        StackDepth::SINGLE,
        out_events,
    );
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TileState {
    cell: CellCoord,
    value: u8,
    locked: bool,
    kind: TileKind,
    stack_depth: StackDepth,
}

impl TileState {
    fn snapshot(&self, id: TileId) -> TileSnapshot {
        TileSnapshot {
            id,
            cell: self.cell,
            value: self.value,
            locked: self.locked,
            kind: self.kind,
            stack_depth: self.stack_depth,
        }
    }

    fn is_hole(&self) -> bool {
        self.locked || (self.kind == TileKind::Normal && self.value == 0)
    }

    fn is_active(&self) -> bool {
        !self.is_hole()
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use merge_six_core::{BoardView, CellCoord, CellRecord, SessionRecord, TileId, TileSnapshot};

    use super::World;

    /// Captures a read-only view of every tile on the board.
    #[must_use]
    pub fn board_view(world: &World) -> BoardView {
        let snapshots: Vec<TileSnapshot> = world
            .tiles
            .iter()
            .map(|(id, tile)| tile.snapshot(*id))
            .collect();
        BoardView::from_snapshots(
            world.grid.columns(),
            world.grid.rows(),
            snapshots,
            world.busy_ending,
        )
    }

    /// Returns the tile with the provided identifier, if present.
    #[must_use]
    pub fn tile(world: &World, id: TileId) -> Option<TileSnapshot> {
        world.snapshot(id)
    }

    /// Returns the tile occupying the provided cell, if any.
    #[must_use]
    pub fn occupant(world: &World, cell: CellCoord) -> Option<TileSnapshot> {
        world
            .grid
            .occupant(cell)
            .and_then(|id| world.snapshot(id))
    }

    /// Captures the scalar session state.
    #[must_use]
    pub fn status(world: &World) -> SessionStatus {
        SessionStatus {
            score: world.score,
            best_score: world.best_score,
            level: world.level,
            board_number: world.board_number,
            moves: world.moves,
            moves_made_on_board: world.moves_made_on_board,
            busy_ending: world.busy_ending,
            first_explosion_done: world.first_explosion_done,
        }
    }

    /// Captures a deep, persistable copy of the session.
    #[must_use]
    pub fn session_record(world: &World) -> SessionRecord {
        let mut grid_snapshot: Vec<CellRecord> = world
            .tiles
            .values()
            .map(|tile| CellRecord {
                column: tile.cell.column(),
                row: tile.cell.row(),
                value: tile.value,
                kind: tile.kind,
                locked: tile.locked,
                stack_depth: tile.stack_depth.get(),
            })
            .collect();
        grid_snapshot.sort_by_key(|cell| (cell.row, cell.column));
        SessionRecord {
            columns: world.grid.columns(),
            rows: world.grid.rows(),
            grid_snapshot,
            score: world.score,
            level: world.level,
            board_number: world.board_number,
            moves: world.moves,
            best_score: world.best_score,
            moves_made_on_board: world.moves_made_on_board,
            first_explosion_done: world.first_explosion_done,
        }
    }

    /// Verifies that the grid and the tile registry agree with each other.
    pub fn check_consistency(world: &World) -> Result<(), ConsistencyError> {
        let mut referenced = 0usize;
        for (cell, id) in world.grid.iter_occupied() {
            let Some(tile) = world.tiles.get(&id) else {
                return Err(ConsistencyError::DanglingCell { cell, tile: id });
            };
            if tile.cell != cell {
                return Err(ConsistencyError::CoordinateMismatch {
                    tile: id,
                    stored: tile.cell,
                    referenced_by: cell,
                });
            }
            referenced += 1;
        }
        if referenced != world.tiles.len() {
            return Err(ConsistencyError::UnplacedTiles {
                registered: world.tiles.len(),
                placed: referenced,
            });
        }
        Ok(())
    }

    /// Scalar session state exposed to systems and adapters.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SessionStatus {
        /// Session score.
        pub score: u64,
        /// Best score ever reached.
        pub best_score: u64,
        /// Current level.
        pub level: u32,
        /// Sequential number of the current board.
        pub board_number: u32,
        /// Moves remaining on the current board.
        pub moves: u32,
        /// Merges performed on the current board.
        pub moves_made_on_board: u32,
        /// Whether an end-of-board flow is running.
        pub busy_ending: bool,
        /// Whether the session's first explosion already happened.
        pub first_explosion_done: bool,
    }

    /// Disagreements between the grid and the tile registry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum ConsistencyError {
        /// A cell references a tile missing from the registry.
        #[error("cell {cell:?} references unregistered tile {tile:?}")]
        DanglingCell {
            /// Cell holding the dangling reference.
            cell: CellCoord,
            /// Tile identifier stored in the cell.
            tile: TileId,
        },
        /// A tile's stored coordinates differ from the cell referencing it.
        #[error("tile {tile:?} stores {stored:?} but is referenced by {referenced_by:?}")]
        CoordinateMismatch {
            /// Tile with mismatching coordinates.
            tile: TileId,
            /// Coordinates stored in the tile.
            stored: CellCoord,
            /// Cell referencing the tile.
            referenced_by: CellCoord,
        },
        /// Some registered tiles are not referenced by any cell.
        #[error("{registered} tiles registered but only {placed} placed")]
        UnplacedTiles {
            /// Number of tiles in the registry.
            registered: usize,
            /// Number of cells referencing a tile.
            placed: usize,
        },
    }
}
