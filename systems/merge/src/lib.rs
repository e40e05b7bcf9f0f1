#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Merge resolution system that turns a drag-and-drop request into world commands.
//!
//! The resolver never mutates the world itself. It validates the request
//! against a [`BoardView`] snapshot, decides between accumulation and
//! explosion, and emits the command batch that realises the outcome. The final
//! command of every successful batch is [`Command::ConfirmMerge`], so the
//! resulting `MergeConfirmed` event always follows the tile mutations.

use merge_six_core::{
    effective_sum, Accumulation, BoardView, Command, Explosion, OpenSpec, Outcome, RejectReason,
    TileId, TileKind, TileSnapshot, EXPLOSION_VALUE,
};
use tracing::debug;

/// Configuration parameters required to construct the merge resolver.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    guaranteed_first_wild: bool,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// `guaranteed_first_wild` places a wild tile at the vacated cell of the
    /// session's first explosion.
    #[must_use]
    pub const fn new(guaranteed_first_wild: bool) -> Self {
        Self {
            guaranteed_first_wild,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Session state the resolver needs besides the board itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeContext {
    /// Combo counter before this merge increments it.
    pub combo: u32,
    /// Whether the session already saw its first explosion.
    pub first_explosion_done: bool,
}

/// Pure system that resolves merges into command batches.
#[derive(Debug)]
pub struct MergeResolver {
    config: Config,
}

impl MergeResolver {
    /// Creates a new merge resolver using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolves a merge of `source` into `destination`.
    ///
    /// Rejected merges emit no commands.
    pub fn resolve(
        &self,
        view: &BoardView,
        context: MergeContext,
        source: TileId,
        destination: TileId,
        out: &mut Vec<Command>,
    ) -> Outcome {
        let (source_tile, destination_tile) = match validate(view, source, destination) {
            Ok(pair) => pair,
            Err(reason) => {
                debug!(
                    source = source.get(),
                    destination = destination.get(),
                    ?reason,
                    "merge rejected"
                );
                return Outcome::Rejected(reason);
            }
        };

        let sum = effective_sum(source_tile, destination_tile);
        let outcome = if sum < EXPLOSION_VALUE {
            accumulate(source_tile, destination_tile, sum, out)
        } else {
            self.explode(view, context, source_tile, destination_tile, out)
        };
        out.push(Command::ConfirmMerge { outcome });
        debug!(
            source = source.get(),
            destination = destination.get(),
            sum,
            score = outcome.score(),
            "merge resolved"
        );
        outcome
    }

    fn explode(
        &self,
        view: &BoardView,
        context: MergeContext,
        source: &TileSnapshot,
        destination: &TileSnapshot,
        out: &mut Vec<Command>,
    ) -> Outcome {
        let combined = source.stack_depth.combine(destination.stack_depth);
        let multiplier = u64::from(context.combo.max(1));
        let score = u64::from(EXPLOSION_VALUE) * u64::from(combined.get()) * multiplier;
        let avoided_value = if source.is_wild() {
            Some(destination.value)
        } else if destination.is_wild() {
            Some(source.value)
        } else {
            None
        };
        let board_clean = view
            .active()
            .all(|tile| tile.id == source.id || tile.id == destination.id);

        out.push(Command::RemoveTile { tile: source.id });
        out.push(Command::RemoveTile {
            tile: destination.id,
        });

        let mut refill = 0;
        let mut wild_refill = false;
        if !board_clean {
            out.push(Command::CreateTile {
                cell: destination.cell,
                value: 0,
                locked: true,
                kind: TileKind::Normal,
            });
            refill = u32::from(combined.get());
            if self.config.guaranteed_first_wild && !context.first_explosion_done {
                wild_refill = true;
                out.push(Command::OpenAtCell {
                    cell: destination.cell,
                    spec: OpenSpec::wild(),
                });
                out.push(Command::OpenEmpties {
                    count: refill - 1,
                    exclude: avoided_value,
                });
            } else {
                out.push(Command::OpenEmpties {
                    count: refill,
                    exclude: avoided_value,
                });
            }
        }
        out.push(Command::AddScore { amount: score });

        Outcome::Exploded(Explosion {
            cell: destination.cell,
            combined,
            score,
            avoided_value,
            wild_used: source.is_wild() || destination.is_wild(),
            refill,
            wild_refill,
            board_clean,
        })
    }
}

fn validate<'a>(
    view: &'a BoardView,
    source: TileId,
    destination: TileId,
) -> Result<(&'a TileSnapshot, &'a TileSnapshot), RejectReason> {
    if view.is_busy_ending() {
        return Err(RejectReason::BoardBusy);
    }
    if source == destination {
        return Err(RejectReason::SameTile);
    }
    let source_tile = view.tile(source).ok_or(RejectReason::MissingTile)?;
    let destination_tile = view.tile(destination).ok_or(RejectReason::MissingTile)?;
    if !source_tile.is_active() || !destination_tile.is_active() {
        return Err(RejectReason::Inactive);
    }
    if source_tile.is_wild() && destination_tile.is_wild() {
        return Err(RejectReason::WildOnWild);
    }
    let sum = effective_sum(source_tile, destination_tile);
    if sum > EXPLOSION_VALUE {
        return Err(RejectReason::SumExceeded { sum });
    }
    Ok((source_tile, destination_tile))
}

fn accumulate(
    source: &TileSnapshot,
    destination: &TileSnapshot,
    sum: u8,
    out: &mut Vec<Command>,
) -> Outcome {
    let score = u64::from(sum);
    out.push(Command::SetTileValue {
        tile: destination.id,
        value: sum,
        stack_increment: source.stack_depth.get(),
    });
    out.push(Command::RemoveTile { tile: source.id });
    out.push(Command::AddScore { amount: score });

    Outcome::Accumulated(Accumulation {
        destination: destination.id,
        cell: destination.cell,
        value: sum,
        stack_depth: destination.stack_depth.combine(source.stack_depth),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_six_core::{CellCoord, StackDepth};

    fn tile(id: u32, column: u32, value: u8, kind: TileKind, depth: u8) -> TileSnapshot {
        TileSnapshot {
            id: TileId::new(id),
            cell: CellCoord::new(column, 0),
            value,
            locked: false,
            kind,
            stack_depth: StackDepth::new(depth),
        }
    }

    fn view(tiles: Vec<TileSnapshot>) -> BoardView {
        BoardView::from_snapshots(4, 1, tiles, false)
    }

    #[test]
    fn explosion_multiplier_uses_combo_floor_of_one() {
        let board = view(vec![
            tile(0, 0, 2, TileKind::Normal, 1),
            tile(1, 1, 4, TileKind::Normal, 1),
            tile(2, 2, 1, TileKind::Normal, 1),
        ]);
        let resolver = MergeResolver::new(Config::default());
        let mut commands = Vec::new();

        let outcome = resolver.resolve(
            &board,
            MergeContext::default(),
            TileId::new(0),
            TileId::new(1),
            &mut commands,
        );

        assert_eq!(outcome.score(), 12);
    }

    #[test]
    fn explosion_multiplier_scales_with_combo_and_depth() {
        let board = view(vec![
            tile(0, 0, 3, TileKind::Normal, 3),
            tile(1, 1, 3, TileKind::Normal, 3),
            tile(2, 2, 1, TileKind::Normal, 1),
        ]);
        let resolver = MergeResolver::new(Config::default());
        let mut commands = Vec::new();
        let context = MergeContext {
            combo: 5,
            first_explosion_done: true,
        };

        let outcome = resolver.resolve(&board, context, TileId::new(0), TileId::new(1), &mut commands);

        let Outcome::Exploded(explosion) = outcome else {
            panic!("expected explosion, got {outcome:?}");
        };
        assert_eq!(explosion.combined.get(), 4);
        assert_eq!(explosion.score, 6 * 4 * 5);
        assert_eq!(explosion.refill, 4);
        assert!(commands.contains(&Command::OpenEmpties {
            count: 4,
            exclude: None
        }));
    }

    #[test]
    fn rejected_merge_emits_nothing() {
        let board = view(vec![
            tile(0, 0, 4, TileKind::Normal, 1),
            tile(1, 1, 3, TileKind::Normal, 1),
        ]);
        let resolver = MergeResolver::new(Config::default());
        let mut commands = Vec::new();

        let outcome = resolver.resolve(
            &board,
            MergeContext::default(),
            TileId::new(0),
            TileId::new(1),
            &mut commands,
        );

        assert_eq!(outcome, Outcome::Rejected(RejectReason::SumExceeded { sum: 7 }));
        assert!(commands.is_empty());
    }

    #[test]
    fn busy_board_rejects_before_lookup() {
        let board = BoardView::from_snapshots(2, 1, Vec::new(), true);
        let resolver = MergeResolver::new(Config::default());
        let mut commands = Vec::new();

        let outcome = resolver.resolve(
            &board,
            MergeContext::default(),
            TileId::new(7),
            TileId::new(8),
            &mut commands,
        );

        assert_eq!(outcome, Outcome::Rejected(RejectReason::BoardBusy));
    }

    #[test]
    fn clean_explosion_skips_placeholder_and_refill() {
        let board = view(vec![
            tile(0, 0, 1, TileKind::Normal, 1),
            tile(1, 1, 5, TileKind::Normal, 1),
        ]);
        let resolver = MergeResolver::new(Config::default());
        let mut commands = Vec::new();

        let outcome = resolver.resolve(
            &board,
            MergeContext::default(),
            TileId::new(0),
            TileId::new(1),
            &mut commands,
        );

        let Outcome::Exploded(explosion) = outcome else {
            panic!("expected explosion, got {outcome:?}");
        };
        assert!(explosion.board_clean);
        assert_eq!(explosion.refill, 0);
        assert!(!commands
            .iter()
            .any(|command| matches!(command, Command::CreateTile { .. } | Command::OpenEmpties { .. })));
    }
}
