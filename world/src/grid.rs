use merge_six_core::{CellCoord, TileId};

/// Dense row-major occupancy grid mapping cells to tile identifiers.
#[derive(Clone, Debug)]
pub(crate) struct CellGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Option<TileId>>,
}

impl CellGrid {
    pub(crate) fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![None; capacity],
        }
    }

    pub(crate) const fn columns(&self) -> u32 {
        self.columns
    }

    pub(crate) const fn rows(&self) -> u32 {
        self.rows
    }

    pub(crate) const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    pub(crate) fn occupant(&self, cell: CellCoord) -> Option<TileId> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    pub(crate) fn occupy(&mut self, cell: CellCoord, tile: TileId) {
        if let Some(index) = self.index(cell) {
            if let Some(slot) = self.cells.get_mut(index) {
                *slot = Some(tile);
            }
        }
    }

    /// Clears the cell only while it still references `tile`.
    pub(crate) fn vacate(&mut self, cell: CellCoord, tile: TileId) {
        if let Some(index) = self.index(cell) {
            if let Some(slot) = self.cells.get_mut(index) {
                if *slot == Some(tile) {
                    *slot = None;
                }
            }
        }
    }

    pub(crate) fn iter_occupied(&self) -> impl Iterator<Item = (CellCoord, TileId)> + '_ {
        let width = self.columns.max(1);
        self.cells
            .iter()
            .zip(0u32..)
            .filter_map(move |(slot, index)| {
                slot.map(|tile| (CellCoord::new(index % width, index / width), tile))
            })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if self.contains(cell) {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}
