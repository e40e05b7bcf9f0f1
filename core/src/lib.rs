#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Merge Six engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Systems consume event streams,
//! query immutable [`BoardView`] snapshots, and respond exclusively with new
//! command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sum at which two merged tiles explode.
pub const EXPLOSION_VALUE: u8 = 6;

/// Upper bound of a tile's stack depth and therefore of the explosion multiplier.
pub const MAX_STACK_DEPTH: u8 = 4;

/// Largest value a combo counter may reach.
pub const MAX_COMBO: u32 = 99;

/// Lowest value a playable normal tile may carry.
pub const MIN_TILE_VALUE: u8 = 1;

/// Highest value a freshly generated normal tile may carry.
pub const MAX_SPAWN_VALUE: u8 = 5;

/// Fewest columns or rows a freshly built board may have.
pub const MIN_BOARD_SIDE: u32 = 2;

/// Most columns or rows any board may have.
pub const MAX_BOARD_SIDE: u32 = 32;

/// Clamps requested board dimensions to `MIN_BOARD_SIDE..=MAX_BOARD_SIDE`.
#[must_use]
pub const fn clamp_board_dimensions(columns: u32, rows: u32) -> (u32, u32) {
    (clamp_side(columns), clamp_side(rows))
}

const fn clamp_side(side: u32) -> u32 {
    if side < MIN_BOARD_SIDE {
        MIN_BOARD_SIDE
    } else if side > MAX_BOARD_SIDE {
        MAX_BOARD_SIDE
    } else {
        side
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Resizes the board and builds a fresh first board.
    ConfigureBoard {
        /// Number of tile columns in the grid.
        columns: u32,
        /// Number of tile rows in the grid.
        rows: u32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Allocates a tile and registers it in both the grid cell and the registry.
    ///
    /// Any previous occupant of the cell is removed first.
    CreateTile {
        /// Cell that receives the tile.
        cell: CellCoord,
        /// Face value of the tile, `0` for placeholders.
        value: u8,
        /// Whether the tile is a non-interactive placeholder.
        locked: bool,
        /// Merge behaviour of the tile.
        kind: TileKind,
    },
    /// Detaches a tile from the grid and the registry.
    RemoveTile {
        /// Identifier of the tile to remove.
        tile: TileId,
    },
    /// Updates a tile's value and bumps its stack depth.
    ///
    /// The tile always becomes [`TileKind::Normal`] and unlocked.
    SetTileValue {
        /// Identifier of the tile to update.
        tile: TileId,
        /// New face value.
        value: u8,
        /// Stack depth added to the tile, saturating at [`MAX_STACK_DEPTH`].
        stack_increment: u8,
    },
    /// Opens a playable tile at a specific empty cell.
    OpenAtCell {
        /// Cell to open.
        cell: CellCoord,
        /// What the opened tile should contain.
        spec: OpenSpec,
    },
    /// Opens playable tiles on randomly selected empty cells.
    OpenEmpties {
        /// Number of tiles requested; fewer open when the board lacks room.
        count: u32,
        /// Value that none of the opened tiles may carry.
        exclude: Option<u8>,
    },
    /// Places a wild tile on a random empty cell.
    SpawnWild,
    /// Emergency spawn of regular tiles when only wild tiles remain.
    RescueSpawn {
        /// Upper bound of tiles to open; the world draws between one and this value.
        max: u32,
    },
    /// Adds points to the session score.
    AddScore {
        /// Points to add.
        amount: u64,
    },
    /// Finalises a merge: consumes a move and broadcasts the outcome.
    ConfirmMerge {
        /// Outcome that has already been applied to the grid.
        outcome: Outcome,
    },
    /// Signals that the presentation finished animating a merge.
    CompleteVisual {
        /// Ticket handed out when the merge was confirmed.
        ticket: VisualTicket,
    },
    /// Starts an end-of-board flow, blocking merges until it completes.
    BeginBoardEnd {
        /// Reason the board is ending.
        end: BoardEnd,
    },
    /// Builds the next board after a clean finish.
    AdvanceBoard,
    /// Restarts the session from the first board after a failure.
    RestartSession,
    /// Rebuilds the world from a persisted session record.
    RestoreSession {
        /// Record to rebuild from.
        record: SessionRecord,
        /// Wild meter charge captured alongside the record.
        wild_meter_raw: f64,
    },
}

/// Events broadcast by the world and systems after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a fresh board was populated.
    BoardBuilt {
        /// Sequential number of the board within the session.
        board_number: u32,
        /// Level derived from the board number.
        level: u32,
        /// Moves granted for the board.
        moves: u32,
        /// Whether the board starts a new session (restart or reconfiguration).
        restarted: bool,
    },
    /// Confirms that a tile was created.
    TileCreated {
        /// Snapshot of the created tile.
        tile: TileSnapshot,
    },
    /// Confirms that a tile was removed.
    TileRemoved {
        /// Identifier of the removed tile.
        tile: TileId,
        /// Cell the tile occupied before removal.
        cell: CellCoord,
    },
    /// Confirms that a tile changed value, depth, or kind.
    TileChanged {
        /// Snapshot of the tile after the change.
        tile: TileSnapshot,
    },
    /// Reports that a tile placement request was rejected.
    TilePlacementRejected {
        /// Cell named by the rejected request.
        cell: CellCoord,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Confirms that a wild tile was spawned by the wild meter.
    WildSpawned {
        /// Identifier of the wild tile.
        tile: TileId,
        /// Cell the wild tile occupies.
        cell: CellCoord,
    },
    /// Reports that a wild spawn request could not be honoured.
    WildSpawnFailed {
        /// Specific reason the spawn failed.
        reason: SpawnFailure,
    },
    /// Confirms that an emergency rescue spawn completed.
    RescueSpawned {
        /// Number of regular tiles opened by the rescue.
        count: u32,
    },
    /// Reports a new session score.
    ScoreChanged {
        /// Score after the change.
        score: u64,
        /// Points added by the change.
        delta: u64,
    },
    /// Reports the moves remaining on the current board.
    MovesChanged {
        /// Moves left before the board fails.
        remaining: u32,
    },
    /// Confirms that a merge was applied to the grid.
    MergeConfirmed {
        /// Outcome of the merge.
        outcome: Outcome,
        /// Ticket the presentation returns once the merge animation completes.
        ticket: VisualTicket,
    },
    /// Confirms that the presentation finished animating a merge.
    VisualCompleted {
        /// Ticket handed out when the merge was confirmed.
        ticket: VisualTicket,
    },
    /// Announces that an end-of-board flow started.
    BoardEndStarted {
        /// Reason the board is ending.
        end: BoardEnd,
    },
    /// Announces that the world was rebuilt from a persisted record.
    SessionRestored {
        /// Wild meter charge captured alongside the record.
        wild_meter_raw: f64,
    },
    /// Reports a new combo counter value.
    ComboChanged {
        /// Combo after the change.
        combo: u32,
    },
    /// Carries one frame of the magnetic landing assist for presentation.
    AssistFrame {
        /// Tile being nudged.
        tile: TileId,
        /// Horizontal offset from the tile's resting position in world units.
        offset_x: f32,
        /// Vertical offset from the tile's resting position in world units.
        offset_y: f32,
        /// Uniform scale applied to the tile.
        scale: f32,
    },
}

/// Unique identifier assigned to a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(u32);

impl TileId {
    /// Creates a new tile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Ticket correlating a confirmed merge with its visual completion signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualTicket(u64);

impl VisualTicket {
    /// Creates a ticket with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the ticket.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Merge behaviour of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Numbered tile that merges by summing values.
    #[default]
    Normal,
    /// Wildcard tile that explodes with any non-wild partner.
    Wild,
}

/// Count of lineages collapsed into one tile, bounded by [`MAX_STACK_DEPTH`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackDepth(u8);

impl StackDepth {
    /// Depth of a tile that has never absorbed another.
    pub const SINGLE: Self = Self(1);

    /// Creates a stack depth clamped into `1..=MAX_STACK_DEPTH`.
    #[must_use]
    pub const fn new(depth: u8) -> Self {
        if depth == 0 {
            Self(1)
        } else if depth > MAX_STACK_DEPTH {
            Self(MAX_STACK_DEPTH)
        } else {
            Self(depth)
        }
    }

    /// Retrieves the numeric depth.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Adds `increment` to the depth, saturating at [`MAX_STACK_DEPTH`].
    #[must_use]
    pub const fn saturating_add(self, increment: u8) -> Self {
        Self::new(self.0.saturating_add(increment))
    }

    /// Combines two lineages into one, saturating at [`MAX_STACK_DEPTH`].
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        self.saturating_add(other.0)
    }
}

impl Default for StackDepth {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Immutable representation of a single tile used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileSnapshot {
    /// Unique identifier assigned to the tile.
    pub id: TileId,
    /// Grid cell occupied by the tile.
    pub cell: CellCoord,
    /// Face value; `0` marks a placeholder.
    pub value: u8,
    /// Whether the tile is a non-interactive placeholder.
    pub locked: bool,
    /// Merge behaviour of the tile.
    pub kind: TileKind,
    /// Number of lineages collapsed into the tile.
    pub stack_depth: StackDepth,
}

impl TileSnapshot {
    /// Reports whether the tile is the wildcard.
    #[must_use]
    pub const fn is_wild(&self) -> bool {
        matches!(self.kind, TileKind::Wild)
    }

    /// Reports whether the tile can be dragged and merged.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.locked && (self.is_wild() || self.value > 0)
    }

    /// Reports whether the tile leaves its cell open for new tiles.
    ///
    /// Locked placeholders and zero-value normal tiles both count as holes.
    #[must_use]
    pub const fn is_hole(&self) -> bool {
        self.locked || (!self.is_wild() && self.value == 0)
    }

    /// Value shown to the player; wild tiles display as an explosion-ready six.
    #[must_use]
    pub const fn display_value(&self) -> u8 {
        if self.is_wild() {
            EXPLOSION_VALUE
        } else {
            self.value
        }
    }
}

/// Sum a merge between the two tiles would produce.
///
/// A wild participant forces the explosion value regardless of the numeric sum.
#[must_use]
pub fn effective_sum(source: &TileSnapshot, destination: &TileSnapshot) -> u8 {
    if source.is_wild() || destination.is_wild() {
        EXPLOSION_VALUE
    } else {
        source.value.saturating_add(destination.value)
    }
}

/// Cheap legality check shared by targeting, merging, and stuck detection.
#[must_use]
pub fn can_merge(source: &TileSnapshot, destination: &TileSnapshot) -> bool {
    if source.id == destination.id || !source.is_active() || !destination.is_active() {
        return false;
    }
    if source.is_wild() && destination.is_wild() {
        return false;
    }
    effective_sum(source, destination) <= EXPLOSION_VALUE
}

/// Read-only snapshot describing every tile on the board.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoardView {
    columns: u32,
    rows: u32,
    tiles: Vec<TileSnapshot>,
    busy_ending: bool,
}

impl BoardView {
    /// Creates a new board view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(
        columns: u32,
        rows: u32,
        mut tiles: Vec<TileSnapshot>,
        busy_ending: bool,
    ) -> Self {
        tiles.sort_by_key(|tile| tile.id);
        Self {
            columns,
            rows,
            tiles,
            busy_ending,
        }
    }

    /// Provides the dimensions of the board as `(columns, rows)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Reports whether an end-of-board flow currently blocks play.
    #[must_use]
    pub const fn is_busy_ending(&self) -> bool {
        self.busy_ending
    }

    /// Iterator over the captured tiles in deterministic identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &TileSnapshot> {
        self.tiles.iter()
    }

    /// Iterator over tiles that can currently be dragged and merged.
    pub fn active(&self) -> impl Iterator<Item = &TileSnapshot> {
        self.tiles.iter().filter(|tile| tile.is_active())
    }

    /// Returns the tile with the provided identifier, if present.
    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&TileSnapshot> {
        self.tiles
            .binary_search_by_key(&id, |tile| tile.id)
            .ok()
            .and_then(|index| self.tiles.get(index))
    }

    /// Returns the tile occupying the provided cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: CellCoord) -> Option<&TileSnapshot> {
        self.tiles.iter().find(|tile| tile.cell == cell)
    }

    /// Reports whether the cell lies inside the board.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Enumerates cells that may receive a new tile, in row-major order.
    ///
    /// A cell is open when it is missing a tile or holds a hole (see
    /// [`TileSnapshot::is_hole`]); wild and active tiles are never open.
    #[must_use]
    pub fn open_cells(&self) -> Vec<CellCoord> {
        let mut cells = Vec::new();
        for row in 0..self.rows {
            for column in 0..self.columns {
                let cell = CellCoord::new(column, row);
                if self.occupant(cell).map_or(true, TileSnapshot::is_hole) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TileSnapshot> {
        self.tiles
    }
}

/// Content requested when opening a tile at a specific cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OpenSpec {
    /// Explicit value; a random value is drawn when absent.
    pub value: Option<u8>,
    /// Whether the opened tile is a wild tile.
    pub wild: bool,
}

impl OpenSpec {
    /// Requests a wild tile.
    #[must_use]
    pub const fn wild() -> Self {
        Self {
            value: None,
            wild: true,
        }
    }

    /// Requests a normal tile carrying the provided value.
    #[must_use]
    pub const fn value(value: u8) -> Self {
        Self {
            value: Some(value),
            wild: false,
        }
    }
}

/// Result of resolving a merge between two tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The destination absorbed the source below the explosion value.
    Accumulated(Accumulation),
    /// The tiles reached the explosion value and cleared their cell.
    Exploded(Explosion),
    /// The merge was illegal; nothing changed.
    Rejected(RejectReason),
}

impl Outcome {
    /// Reports whether the merge changed the board.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Points awarded by the merge.
    #[must_use]
    pub const fn score(&self) -> u64 {
        match self {
            Self::Accumulated(accumulation) => accumulation.score,
            Self::Exploded(explosion) => explosion.score,
            Self::Rejected(_) => 0,
        }
    }
}

/// Details of a merge that stayed below the explosion value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accumulation {
    /// Tile that absorbed the source.
    pub destination: TileId,
    /// Cell occupied by the destination.
    pub cell: CellCoord,
    /// Value of the destination after the merge.
    pub value: u8,
    /// Stack depth of the destination after the merge.
    pub stack_depth: StackDepth,
    /// Points awarded.
    pub score: u64,
}

/// Details of a merge that reached the explosion value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Explosion {
    /// Cell vacated by the destination.
    pub cell: CellCoord,
    /// Explosion multiplier derived from both stack depths.
    pub combined: StackDepth,
    /// Points awarded.
    pub score: u64,
    /// Value excluded from the refill batch.
    pub avoided_value: Option<u8>,
    /// Whether a wild tile took part.
    pub wild_used: bool,
    /// Number of tiles requested by the refill.
    pub refill: u32,
    /// Whether the refill placed a guaranteed wild at the vacated cell.
    pub wild_refill: bool,
    /// Whether the explosion left no playable tile behind.
    pub board_clean: bool,
}

/// Reasons a merge request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Source and destination are the same tile.
    SameTile,
    /// One of the tiles does not exist.
    MissingTile,
    /// One of the tiles is a locked or empty placeholder.
    Inactive,
    /// Two wild tiles never merge.
    WildOnWild,
    /// The numeric sum exceeds the explosion value.
    SumExceeded {
        /// Sum the merge would have produced.
        sum: u8,
    },
    /// An end-of-board flow is running.
    BoardBusy,
}

/// Reasons a tile placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementError {
    /// The requested cell lies outside the board.
    OutOfBounds,
    /// The requested cell holds an active or wild tile.
    Occupied,
    /// The requested value lies outside the permitted range.
    InvalidValue,
}

/// Reasons a wild spawn request may fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnFailure {
    /// No open cell exists on the board.
    NoOpenCell,
    /// An end-of-board flow is running.
    BoardBusy,
    /// No playable tile remains; the board is about to clear.
    BoardClean,
}

/// Reasons a board ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoardEnd {
    /// No playable tile remains; the next board follows.
    Cleared,
    /// No legal merge remains; the session restarts.
    Stuck,
    /// The board ran out of moves; the session restarts.
    OutOfMoves,
}

impl BoardEnd {
    /// Reports whether the end counts as a success.
    #[must_use]
    pub const fn is_clear(self) -> bool {
        matches!(self, Self::Cleared)
    }
}

/// Persistable description of a single occupied cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    /// Zero-based column of the cell.
    pub column: u32,
    /// Zero-based row of the cell.
    pub row: u32,
    /// Face value of the tile.
    pub value: u8,
    /// Merge behaviour of the tile.
    #[serde(default)]
    pub kind: TileKind,
    /// Whether the tile is a placeholder.
    pub locked: bool,
    /// Stack depth of the tile.
    #[serde(default = "default_stack_depth")]
    pub stack_depth: u8,
}

fn default_stack_depth() -> u8 {
    StackDepth::SINGLE.get()
}

/// Persistable description of the authoritative session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Number of columns of the captured board.
    pub columns: u32,
    /// Number of rows of the captured board.
    pub rows: u32,
    /// Occupied cells in row-major order.
    pub grid_snapshot: Vec<CellRecord>,
    /// Session score.
    pub score: u64,
    /// Current level.
    pub level: u32,
    /// Sequential number of the current board.
    pub board_number: u32,
    /// Moves remaining on the current board.
    pub moves: u32,
    /// Best score ever reached.
    pub best_score: u64,
    /// Merges performed on the current board.
    #[serde(default)]
    pub moves_made_on_board: u32,
    /// Whether the session's first explosion already happened.
    #[serde(default)]
    pub first_explosion_done: bool,
}

/// Cancellable one-shot countdown driven by simulated time.
///
/// Scheduling a pending timer supersedes the previous deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    remaining: Option<Duration>,
}

impl Timer {
    /// Creates a timer that is not counting down.
    #[must_use]
    pub const fn idle() -> Self {
        Self { remaining: None }
    }

    /// Starts (or restarts) the countdown.
    pub fn schedule(&mut self, after: Duration) {
        self.remaining = Some(after);
    }

    /// Stops the countdown without firing.
    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    /// Reports whether the countdown is running.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.remaining.is_some()
    }

    /// Time left before the timer fires, if pending.
    #[must_use]
    pub const fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Advances the countdown, returning `true` exactly once when it expires.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(remaining) = self.remaining else {
            return false;
        };
        if dt >= remaining {
            self.remaining = None;
            true
        } else {
            self.remaining = Some(remaining - dt);
            false
        }
    }
}
