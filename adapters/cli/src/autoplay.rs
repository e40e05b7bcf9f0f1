//! Greedy autoplayer and plain-text board rendering.

use std::fmt::Write as _;

use merge_six_core::{
    can_merge, effective_sum, BoardEnd, BoardView, CellCoord, TileId, TileSnapshot,
    EXPLOSION_VALUE,
};
use merge_six_session::{GameSession, MergeHelpers, StatsSink};
use merge_six_system_drag_targeting::BoardLayout;
use tracing::{debug, info};

/// Drop chosen by the autoplayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Move {
    pub(crate) source: TileSnapshot,
    pub(crate) destination: TileSnapshot,
}

impl Move {
    // Explosions first, deeper stacks first, then the largest sum; ids break ties.
    fn rank(&self) -> (bool, u8, u8) {
        let sum = effective_sum(&self.source, &self.destination);
        let depth = self
            .source
            .stack_depth
            .combine(self.destination.stack_depth)
            .get();
        (sum == EXPLOSION_VALUE, depth, sum)
    }
}

/// Picks the most valuable legal drop on the board.
///
/// Wild tiles are held back for explosions a numbered pair cannot reach.
pub(crate) fn best_move(view: &BoardView) -> Option<Move> {
    let tiles: Vec<&TileSnapshot> = view.active().collect();
    let mut best: Option<Move> = None;
    for source in &tiles {
        for destination in &tiles {
            if !can_merge(source, destination) {
                continue;
            }
            let candidate = Move {
                source: **source,
                destination: **destination,
            };
            let better = match best {
                None => true,
                Some(current) => {
                    let wild = candidate.source.is_wild() || candidate.destination.is_wild();
                    let current_wild = current.source.is_wild() || current.destination.is_wild();
                    (current_wild && !wild && candidate.rank().0)
                        || (wild == current_wild && candidate.rank() > current.rank())
                }
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Drags `chosen.source` onto `chosen.destination` through the targeting system.
pub(crate) fn perform(
    session: &mut GameSession,
    layout: &BoardLayout,
    chosen: Move,
    helpers: &mut dyn MergeHelpers,
) -> bool {
    let grab = layout.cell_rect(chosen.source.cell).center();
    let drop = layout.cell_rect(chosen.destination.cell).center();
    if !session.begin_drag(chosen.source.id, grab) {
        return false;
    }
    let midway = grab.lerp(drop, 0.5);
    let _ = session.drag_to(midway);
    match session.end_drag(drop, helpers) {
        Some(outcome) => {
            debug!(?outcome, "drop resolved");
            outcome.is_success()
        }
        None => false,
    }
}

/// Renders the board as a grid of fixed-width cells.
///
/// `.` is empty, `#` a locked placeholder, `W` the wild tile; stacked tiles
/// carry their depth after an `x`.
pub(crate) fn render(view: &BoardView) -> String {
    let (columns, rows) = view.dimensions();
    let mut out = String::new();
    for row in 0..rows {
        for column in 0..columns {
            let label = match view.occupant(CellCoord::new(column, row)) {
                None => ".".to_owned(),
                Some(tile) if tile.is_wild() => "W".to_owned(),
                Some(tile) if tile.is_hole() => "#".to_owned(),
                Some(tile) if tile.stack_depth.get() > 1 => {
                    format!("{}x{}", tile.value, tile.stack_depth.get())
                }
                Some(tile) => tile.value.to_string(),
            };
            let _ = write!(out, "{label:>4}");
        }
        out.push('\n');
    }
    out
}

/// Drop helpers that only log what a renderer would animate.
#[derive(Debug, Default)]
pub(crate) struct LoggedHelpers;

impl MergeHelpers for LoggedHelpers {
    fn snap_back(&mut self, tile: TileId, origin: CellCoord) {
        debug!(
            tile = tile.get(),
            column = origin.column(),
            row = origin.row(),
            "snap back"
        );
    }

    fn center_on(&mut self, tile: TileId, target: TileId) {
        debug!(tile = tile.get(), target = target.get(), "center on target");
    }
}

/// Statistics sink writing milestones to the log.
#[derive(Debug, Default)]
pub(crate) struct LoggedStats;

impl StatsSink for LoggedStats {
    fn combo_changed(&mut self, combo: u32) {
        if combo > 1 {
            info!(combo, "combo");
        }
    }

    fn board_cleared(&mut self, board_number: u32) {
        info!(board_number, "board cleared");
    }

    fn board_failed(&mut self, end: BoardEnd) {
        info!(?end, "board lost");
    }

    fn wild_used(&mut self) {
        debug!("wild tile used");
    }
}
