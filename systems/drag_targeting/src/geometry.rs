use glam::Vec2;
use merge_six_core::CellCoord;

/// Axis-aligned rectangle in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    min: Vec2,
    size: Vec2,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    ///
    /// Negative sizes collapse to zero.
    #[must_use]
    pub fn new(min: Vec2, size: Vec2) -> Self {
        Self {
            min,
            size: size.max(Vec2::ZERO),
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Bottom-right corner.
    #[must_use]
    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    /// Width and height.
    #[must_use]
    pub const fn size(&self) -> Vec2 {
        self.size
    }

    /// Geometric centre.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    /// Surface of the rectangle.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Surface shared with `other`, zero when disjoint.
    #[must_use]
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let overlap = (self.max().min(other.max()) - self.min.max(other.min)).max(Vec2::ZERO);
        overlap.x * overlap.y
    }

    /// Returns the rectangle moved so its top-left corner sits at `min`.
    #[must_use]
    pub fn moved_to(&self, min: Vec2) -> Self {
        Self {
            min,
            size: self.size,
        }
    }
}

/// Maps grid cells onto world-space rectangles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardLayout {
    origin: Vec2,
    tile_size: f32,
    gap: f32,
}

impl BoardLayout {
    /// Creates a layout with the board's top-left corner at `origin`.
    #[must_use]
    pub const fn new(origin: Vec2, tile_size: f32, gap: f32) -> Self {
        Self {
            origin,
            tile_size,
            gap,
        }
    }

    /// Side length of a square tile.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Resting rectangle of the tile occupying `cell`.
    #[must_use]
    pub fn cell_rect(&self, cell: CellCoord) -> Rect {
        let pitch = self.tile_size + self.gap;
        let min = self.origin
            + Vec2::new(cell.column() as f32 * pitch, cell.row() as f32 * pitch);
        Rect::new(min, Vec2::splat(self.tile_size))
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 100.0, 8.0)
    }
}
