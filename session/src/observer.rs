use merge_six_core::{BoardEnd, CellCoord, Outcome, TileId, TileSnapshot, VisualTicket};

/// Visual layer keeping one sprite per logical tile.
///
/// Every method defaults to a no-op so headless embedders implement only what they need.
pub trait Presentation {
    /// A tile appeared on the board.
    fn create_tile(&mut self, _tile: &TileSnapshot) {}

    /// A tile left the board.
    fn destroy_tile(&mut self, _tile: TileId) {}

    /// A tile changed value, depth, or kind.
    fn update_tile(&mut self, _tile: &TileSnapshot) {}

    /// One frame of the magnetic landing assist.
    fn assist_frame(&mut self, _tile: TileId, _offset_x: f32, _offset_y: f32, _scale: f32) {}

    /// A merge was applied; the ticket must come back through `visual_complete`.
    fn merge_confirmed(&mut self, _outcome: &Outcome, _ticket: VisualTicket) {}
}

/// Fire-and-forget statistics collector.
pub trait StatsSink {
    /// The session score changed.
    fn score_changed(&mut self, _score: u64) {}

    /// The combo counter changed.
    fn combo_changed(&mut self, _combo: u32) {}

    /// A board was cleared.
    fn board_cleared(&mut self, _board_number: u32) {}

    /// A board ended without being cleared.
    fn board_failed(&mut self, _end: BoardEnd) {}

    /// A wild tile took part in an explosion.
    fn wild_used(&mut self) {}
}

/// Drop-time callbacks into the visual layer.
pub trait MergeHelpers {
    /// Returns the dragged tile to the cell it was picked from.
    fn snap_back(&mut self, tile: TileId, origin: CellCoord);

    /// Centres the dragged tile onto its merge partner before the merge applies.
    fn center_on(&mut self, tile: TileId, target: TileId);
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Headless;

impl Presentation for Headless {}

impl StatsSink for Headless {}

impl MergeHelpers for Headless {
    fn snap_back(&mut self, _tile: TileId, _origin: CellCoord) {}

    fn center_on(&mut self, _tile: TileId, _target: TileId) {}
}
