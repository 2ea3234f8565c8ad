//! # Table Grid Machinery
//!
//! Everything structurally deep about tables lives here. The design choice
//! that keeps merge/insert/delete composable is the flatten/rebuild pattern:
//! every structural edit extracts the non-covered ("master") cells into a
//! flat list, transforms that list, and rebuilds a whole new dense grid from
//! it. Span metadata is the single source of truth; grids are replaced, never
//! patched in place, so a reader can never observe a half-updated grid.

pub mod materialize;
pub mod structure;

use crate::model::{Cell, TableWidget};

/// A rectangular range over a table's grid, as produced by the editor's
/// selection UI. End coordinates are inclusive and may be "backwards"
/// relative to start; [`Selection::normalized`] fixes the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl Selection {
    pub fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    pub fn single(row: usize, col: usize) -> Self {
        Self::new(row, col, row, col)
    }

    /// Reorder so start ≤ end on both axes.
    pub fn normalized(&self) -> Self {
        Self {
            start_row: self.start_row.min(self.end_row),
            start_col: self.start_col.min(self.end_col),
            end_row: self.start_row.max(self.end_row),
            end_col: self.start_col.max(self.end_col),
        }
    }

    /// Clamp a normalized selection to the grid. `None` if the grid is empty
    /// or the selection starts outside it.
    pub fn clamped(&self, rows: usize, cols: usize) -> Option<Self> {
        let sel = self.normalized();
        if rows == 0 || cols == 0 || sel.start_row >= rows || sel.start_col >= cols {
            return None;
        }
        Some(Self {
            start_row: sel.start_row,
            start_col: sel.start_col,
            end_row: sel.end_row.min(rows - 1),
            end_col: sel.end_col.min(cols - 1),
        })
    }

    pub fn row_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn col_count(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    pub fn cell_count(&self) -> usize {
        self.row_count() * self.col_count()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }
}

/// A non-covered cell lifted out of the grid with its position: the
/// authoritative record of content, binding, and span for its region.
#[derive(Debug, Clone)]
pub struct MasterCell {
    pub row: usize,
    pub col: usize,
    pub cell: Cell,
}

impl MasterCell {
    pub fn row_span(&self) -> usize {
        self.cell.row_span.max(1) as usize
    }

    pub fn col_span(&self) -> usize {
        self.cell.col_span.max(1) as usize
    }

    /// Last row index covered by this master's span.
    pub fn end_row(&self) -> usize {
        self.row + self.row_span() - 1
    }

    /// Last column index covered by this master's span.
    pub fn end_col(&self) -> usize {
        self.col + self.col_span() - 1
    }

    pub fn covers(&self, row: usize, col: usize) -> bool {
        row >= self.row && row <= self.end_row() && col >= self.col && col <= self.end_col()
    }
}

/// Extract the master cells of a grid, sorted by row then column.
pub fn flatten_masters(table: &TableWidget) -> Vec<MasterCell> {
    let mut masters = Vec::new();
    for (r, row) in table.cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if !cell.is_covered() {
                masters.push(MasterCell {
                    row: r,
                    col: c,
                    cell: cell.clone(),
                });
            }
        }
    }
    masters
}

/// Rebuild a dense `rows x cols` grid from a transformed master list.
/// Positions inside a master's span become covered cells; positions no master
/// reaches (e.g. a freshly inserted row) become blank independent cells.
/// Spans are clamped at the grid edge.
pub fn rebuild_grid(masters: &[MasterCell], rows: usize, cols: usize) -> Vec<Vec<Cell>> {
    let mut grid: Vec<Vec<Option<Cell>>> = vec![vec![None; cols]; rows];

    for master in masters {
        if master.row >= rows || master.col >= cols {
            continue;
        }
        let end_row = master.end_row().min(rows - 1);
        let end_col = master.end_col().min(cols - 1);

        let mut cell = master.cell.clone();
        cell.row_span = (end_row - master.row + 1) as u32;
        cell.col_span = (end_col - master.col + 1) as u32;
        grid[master.row][master.col] = Some(cell);

        for r in master.row..=end_row {
            for c in master.col..=end_col {
                if r == master.row && c == master.col {
                    continue;
                }
                grid[r][c] = Some(Cell::covered());
            }
        }
    }

    grid.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|slot| slot.unwrap_or_default())
                .collect()
        })
        .collect()
}

/// The master whose span rectangle contains `(row, col)`, if any.
pub fn dominating_master(table: &TableWidget, row: usize, col: usize) -> Option<MasterCell> {
    flatten_masters(table)
        .into_iter()
        .find(|m| m.covers(row, col))
}

/// Span-coverage check: every covered position must be dominated by exactly
/// one master, and no independent cell may sit inside a master's span.
pub fn grid_is_consistent(table: &TableWidget) -> bool {
    if table.cells.len() != table.rows || table.cells.iter().any(|r| r.len() != table.cols) {
        return false;
    }
    let masters = flatten_masters(table);
    for r in 0..table.rows {
        for c in 0..table.cols {
            let dominators = masters.iter().filter(|m| m.covers(r, c)).count();
            let cell = &table.cells[r][c];
            if cell.is_covered() {
                if dominators != 1 {
                    return false;
                }
            } else {
                // An independent cell dominates only itself.
                if dominators != 1 || !masters.iter().any(|m| m.row == r && m.col == c) {
                    return false;
                }
            }
        }
    }
    true
}
