//! # Table Structure Engine
//!
//! Merge, split, and row/column insertion and deletion over a table widget's
//! grid. Every operation goes through the same shape: flatten the master
//! cells, remap their positions and spans, rebuild a whole new grid, and
//! re-derive the fraction arrays. Invalid input never errors — the operation
//! is a no-op and the caller observes unchanged state.
//!
//! Complex-mode tables (header template + repeating body template) disallow
//! all structural edits; every operation here returns them unchanged.

use crate::model::{TableMode, TableWidget, Widget, WidgetKind};
use crate::table::{dominating_master, flatten_masters, rebuild_grid, MasterCell, Selection};

/// Tables never shrink below this edge length when geometry is recomputed.
pub const MIN_TABLE_SIZE_MM: f64 = 20.0;

/// Where to insert relative to the reference index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// Merge the selected rectangle into the top-left cell. No-op unless the
/// selection spans more than one cell, and refused when an existing merged
/// span straddles the selection edge (that would corrupt coverage).
pub fn merge_cells(widget: &Widget, selection: Selection) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let Some(sel) = selection.clamped(table.rows, table.cols) else {
        return widget.clone();
    };
    if sel.cell_count() < 2 {
        return widget.clone();
    }

    let masters = flatten_masters(table);
    let intersects = |m: &MasterCell| {
        m.row <= sel.end_row
            && m.end_row() >= sel.start_row
            && m.col <= sel.end_col
            && m.end_col() >= sel.start_col
    };
    let inside = |m: &MasterCell| {
        m.row >= sel.start_row
            && m.end_row() <= sel.end_row
            && m.col >= sel.start_col
            && m.end_col() <= sel.end_col
    };
    if masters.iter().any(|m| intersects(m) && !inside(m)) {
        return widget.clone();
    }

    // The top-left master keeps its content and binding for the merged cell.
    let mut anchor = masters
        .iter()
        .find(|m| m.row == sel.start_row && m.col == sel.start_col)
        .map(|m| m.cell.clone())
        .unwrap_or_default();
    anchor.row_span = sel.row_count() as u32;
    anchor.col_span = sel.col_count() as u32;

    let mut kept: Vec<MasterCell> = masters.into_iter().filter(|m| !intersects(m)).collect();
    kept.push(MasterCell {
        row: sel.start_row,
        col: sel.start_col,
        cell: anchor,
    });

    let mut table = table.clone();
    table.cells = rebuild_grid(&kept, table.rows, table.cols);
    replace_table(widget, table, None, None)
}

/// Split the merged cell anchored at the selection start back into 1x1
/// cells. The anchor keeps its content; the uncovered positions come back
/// blank. No-op when the anchor is not merged.
pub fn split_cells(widget: &Widget, selection: Selection) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let sel = selection.normalized();
    let Some(anchor) = dominating_master(table, sel.start_row, sel.start_col) else {
        return widget.clone();
    };
    if anchor.row_span() <= 1 && anchor.col_span() <= 1 {
        return widget.clone();
    }

    let mut kept: Vec<MasterCell> = flatten_masters(table)
        .into_iter()
        .filter(|m| (m.row, m.col) != (anchor.row, anchor.col))
        .collect();
    let mut cell = anchor.cell.clone();
    cell.row_span = 1;
    cell.col_span = 1;
    kept.push(MasterCell {
        row: anchor.row,
        col: anchor.col,
        cell,
    });

    let mut table = table.clone();
    table.cells = rebuild_grid(&kept, table.rows, table.cols);
    replace_table(widget, table, None, None)
}

/// Insert one row before or after `index`. Master cells straddling the
/// insertion point grow by one; masters at or after it shift down. The new
/// row's height fraction is split off from the row immediately before the
/// insertion point, and the table grows by one average row height.
pub fn insert_row(widget: &Widget, index: usize, position: InsertPosition) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let index = index.min(table.rows.saturating_sub(1));
    let at = match position {
        InsertPosition::Before => index,
        InsertPosition::After => index + 1,
    };

    let masters: Vec<MasterCell> = flatten_masters(table)
        .into_iter()
        .map(|mut m| {
            if m.row >= at {
                m.row += 1;
            } else if m.end_row() >= at {
                m.cell.row_span += 1;
            }
            m
        })
        .collect();

    let mut table = table.clone();
    let old_rows = table.rows;
    table.rows += 1;
    table.row_heights = split_in_fraction(&widget_row_fractions(widget), at);
    table.cells = rebuild_grid(&masters, table.rows, table.cols);

    let grown = (widget.height + widget.height / old_rows as f64).max(MIN_TABLE_SIZE_MM);
    replace_table(widget, table, None, Some(grown))
}

/// Insert one column before or after `index`; the column analogue of
/// [`insert_row`]. Column bindings at or after the insertion point shift.
pub fn insert_col(widget: &Widget, index: usize, position: InsertPosition) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let index = index.min(table.cols.saturating_sub(1));
    let at = match position {
        InsertPosition::Before => index,
        InsertPosition::After => index + 1,
    };

    let masters: Vec<MasterCell> = flatten_masters(table)
        .into_iter()
        .map(|mut m| {
            if m.col >= at {
                m.col += 1;
            } else if m.end_col() >= at {
                m.cell.col_span += 1;
            }
            m
        })
        .collect();

    let mut table = table.clone();
    let old_cols = table.cols;
    table.cols += 1;
    table.column_widths = split_in_fraction(&widget_col_fractions(widget), at);
    table.column_bindings = table
        .column_bindings
        .iter()
        .map(|(&col, name)| (if col >= at { col + 1 } else { col }, name.clone()))
        .collect();
    table.cells = rebuild_grid(&masters, table.rows, table.cols);

    let grown = (widget.width + widget.width / old_cols as f64).max(MIN_TABLE_SIZE_MM);
    replace_table(widget, table, Some(grown), None)
}

/// Delete the contiguous row range `[start, end]`. Refused when it would
/// remove every row. Masters entirely inside the range are dropped; spans
/// partially overlapping shrink by the overlap; later masters shift up. The
/// removed height fractions land on the row just before the range (or the
/// first survivor), and the header row count is clamped.
pub fn delete_rows(widget: &Widget, start: usize, end: usize) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let Some(sel) = Selection::new(start, 0, end, 0).clamped(table.rows, table.cols) else {
        return widget.clone();
    };
    let (start, end) = (sel.start_row, sel.end_row);
    let count = end - start + 1;
    if count >= table.rows {
        return widget.clone();
    }

    let masters: Vec<MasterCell> = flatten_masters(table)
        .into_iter()
        .filter_map(|mut m| {
            let overlap = overlap_len(m.row, m.end_row(), start, end);
            if overlap >= m.row_span() {
                return None;
            }
            m.cell.row_span -= overlap as u32;
            if m.row > end {
                m.row -= count;
            } else if m.row >= start {
                // Origin was deleted; the surviving tail now starts where the
                // deleted range began.
                m.row = start;
            }
            Some(m)
        })
        .collect();

    let mut table = table.clone();
    table.row_heights = redistribute_fractions(&widget_row_fractions(widget), start, end);
    table.rows -= count;
    table.header_rows = table.header_rows.min(table.rows);
    table.cells = rebuild_grid(&masters, table.rows, table.cols);
    replace_table(widget, table, None, None)
}

/// Delete the contiguous column range `[start, end]`; the column analogue of
/// [`delete_rows`]. Bindings inside the range are dropped, later ones shift.
pub fn delete_cols(widget: &Widget, start: usize, end: usize) -> Widget {
    let Some(table) = editable_table(widget) else {
        return widget.clone();
    };
    let Some(sel) = Selection::new(0, start, 0, end).clamped(table.rows, table.cols) else {
        return widget.clone();
    };
    let (start, end) = (sel.start_col, sel.end_col);
    let count = end - start + 1;
    if count >= table.cols {
        return widget.clone();
    }

    let masters: Vec<MasterCell> = flatten_masters(table)
        .into_iter()
        .filter_map(|mut m| {
            let overlap = overlap_len(m.col, m.end_col(), start, end);
            if overlap >= m.col_span() {
                return None;
            }
            m.cell.col_span -= overlap as u32;
            if m.col > end {
                m.col -= count;
            } else if m.col >= start {
                m.col = start;
            }
            Some(m)
        })
        .collect();

    let mut table = table.clone();
    table.column_widths = redistribute_fractions(&widget_col_fractions(widget), start, end);
    table.cols -= count;
    table.column_bindings = table
        .column_bindings
        .iter()
        .filter(|(&col, _)| col < start || col > end)
        .map(|(&col, name)| (if col > end { col - count } else { col }, name.clone()))
        .collect();
    table.cells = rebuild_grid(&masters, table.rows, table.cols);
    replace_table(widget, table, None, None)
}

// ── helpers ──────────────────────────────────────────────────────────

/// The widget's table, when structural edits are allowed on it.
fn editable_table(widget: &Widget) -> Option<&TableWidget> {
    match &widget.kind {
        WidgetKind::Table(table) if table.mode != TableMode::Complex => Some(table),
        _ => None,
    }
}

fn replace_table(
    widget: &Widget,
    table: TableWidget,
    width: Option<f64>,
    height: Option<f64>,
) -> Widget {
    let mut out = widget.clone();
    out.kind = WidgetKind::Table(table);
    if let Some(w) = width {
        out.width = w;
    }
    if let Some(h) = height {
        out.height = h;
    }
    out
}

fn widget_row_fractions(widget: &Widget) -> Vec<f64> {
    widget
        .as_table()
        .map(|t| t.row_fractions())
        .unwrap_or_default()
}

fn widget_col_fractions(widget: &Widget) -> Vec<f64> {
    widget
        .as_table()
        .map(|t| t.column_fractions())
        .unwrap_or_default()
}

/// Rows/cols shared between `[a_start, a_end]` and `[b_start, b_end]`.
fn overlap_len(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> usize {
    let lo = a_start.max(b_start);
    let hi = a_end.min(b_end);
    if lo > hi {
        0
    } else {
        hi - lo + 1
    }
}

/// Insert a new fraction at `at` by halving the donor immediately before the
/// insertion point (the first entry when inserting at the front), then
/// renormalize.
fn split_in_fraction(fractions: &[f64], at: usize) -> Vec<f64> {
    let mut out = fractions.to_vec();
    if out.is_empty() {
        return vec![1.0];
    }
    let donor = at.saturating_sub(1).min(out.len() - 1);
    let half = out[donor] / 2.0;
    out[donor] -= half;
    out.insert(at.min(out.len()), half);
    normalize(&mut out);
    out
}

/// Remove fractions `[start, end]`, piling their total onto the entry just
/// before the range (or the first survivor), then renormalize.
fn redistribute_fractions(fractions: &[f64], start: usize, end: usize) -> Vec<f64> {
    let removed: f64 = fractions[start..=end].iter().sum();
    let mut out: Vec<f64> = fractions
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < start || *i > end)
        .map(|(_, f)| *f)
        .collect();
    if out.is_empty() {
        return out;
    }
    let recipient = if start > 0 { start - 1 } else { 0 };
    out[recipient] += removed;
    normalize(&mut out);
    out
}

fn normalize(fractions: &mut [f64]) {
    let sum: f64 = fractions.iter().sum();
    if sum > 0.0 {
        for f in fractions.iter_mut() {
            *f /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TableMode, TableWidget, Widget};
    use crate::table::grid_is_consistent;
    use pretty_assertions::assert_eq;

    fn table_widget(rows: usize, cols: usize) -> Widget {
        Widget::table(
            "tbl",
            10.0,
            10.0,
            90.0,
            40.0,
            TableWidget::blank(TableMode::Legacy, rows, cols),
        )
    }

    fn fractions_sum(fractions: &[f64]) -> f64 {
        fractions.iter().sum()
    }

    #[test]
    fn merge_covers_rectangle() {
        let widget = merge_cells(&table_widget(3, 3), Selection::new(0, 0, 1, 1));
        let table = widget.as_table().unwrap();
        assert_eq!(table.cells[0][0].row_span, 2);
        assert_eq!(table.cells[0][0].col_span, 2);
        assert!(table.cells[0][1].is_covered());
        assert!(table.cells[1][1].is_covered());
        assert!(!table.cells[2][2].is_covered());
        assert!(grid_is_consistent(table));
    }

    #[test]
    fn merge_single_cell_is_noop() {
        let original = table_widget(3, 3);
        let widget = merge_cells(&original, Selection::single(1, 1));
        assert!(!widget.as_table().unwrap().cells[1][1].is_covered());
        assert_eq!(widget.as_table().unwrap().cells.len(), 3);
    }

    #[test]
    fn merge_refused_on_complex_mode() {
        let mut widget = table_widget(3, 3);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.mode = TableMode::Complex;
        }
        let merged = merge_cells(&widget, Selection::new(0, 0, 1, 1));
        assert!(!merged.as_table().unwrap().cells[0][1].is_covered());
    }

    #[test]
    fn merge_refused_when_span_straddles_selection() {
        let widget = merge_cells(&table_widget(3, 3), Selection::new(0, 0, 0, 2));
        // Now try to merge a rect cutting through the 1x3 span.
        let again = merge_cells(&widget, Selection::new(0, 0, 1, 0));
        assert_eq!(again.as_table().unwrap().cells[0][0].col_span, 3);
    }

    #[test]
    fn merge_keeps_top_left_content() {
        let mut widget = table_widget(2, 2);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.cells[0][0].content = "keep".to_string();
            t.cells[1][1].content = "drop".to_string();
        }
        let merged = merge_cells(&widget, Selection::new(0, 0, 1, 1));
        assert_eq!(merged.as_table().unwrap().cells[0][0].content, "keep");
    }

    #[test]
    fn split_restores_independent_blank_cells() {
        let merged = merge_cells(&table_widget(3, 3), Selection::new(0, 0, 1, 1));
        let split = split_cells(&merged, Selection::single(0, 0));
        let table = split.as_table().unwrap();
        assert!(table.cells.iter().flatten().all(|c| !c.is_covered()));
        assert!(grid_is_consistent(table));
    }

    #[test]
    fn split_via_covered_position_finds_anchor() {
        let merged = merge_cells(&table_widget(3, 3), Selection::new(0, 0, 1, 1));
        let split = split_cells(&merged, Selection::single(1, 1));
        assert!(!split.as_table().unwrap().cells[1][1].is_covered());
    }

    #[test]
    fn split_unmerged_cell_is_noop() {
        let original = table_widget(2, 2);
        let split = split_cells(&original, Selection::single(0, 0));
        assert_eq!(split.as_table().unwrap().cells[0][0].row_span, 1);
    }

    #[test]
    fn insert_row_shifts_and_grows_straddling_spans() {
        let merged = merge_cells(&table_widget(3, 2), Selection::new(0, 0, 2, 0));
        let inserted = insert_row(&merged, 1, InsertPosition::Before);
        let table = inserted.as_table().unwrap();
        assert_eq!(table.rows, 4);
        // The 3-row span straddled index 1 and grew to 4.
        assert_eq!(table.cells[0][0].row_span, 4);
        assert!(grid_is_consistent(table));
    }

    #[test]
    fn insert_row_after_shifts_later_masters() {
        let mut widget = table_widget(2, 1);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.cells[1][0].content = "last".to_string();
        }
        let inserted = insert_row(&widget, 0, InsertPosition::After);
        let table = inserted.as_table().unwrap();
        assert_eq!(table.rows, 3);
        assert_eq!(table.cells[1][0].content, "");
        assert_eq!(table.cells[2][0].content, "last");
    }

    #[test]
    fn insert_row_halves_donor_fraction() {
        let inserted = insert_row(&table_widget(2, 1), 0, InsertPosition::After);
        let table = inserted.as_table().unwrap();
        // Donor was row 0 at 0.5; it split into two 0.25 entries.
        assert!((table.row_heights[0] - 0.25).abs() < 1e-9);
        assert!((table.row_heights[1] - 0.25).abs() < 1e-9);
        assert!((table.row_heights[2] - 0.5).abs() < 1e-9);
        assert!((fractions_sum(&table.row_heights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn insert_row_grows_widget_height() {
        let widget = table_widget(2, 1); // 40mm, 2 rows
        let inserted = insert_row(&widget, 0, InsertPosition::Before);
        assert!((inserted.height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn insert_col_shifts_bindings() {
        let mut widget = table_widget(2, 3);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.column_bindings.insert(0, "a".to_string());
            t.column_bindings.insert(2, "c".to_string());
        }
        let inserted = insert_col(&widget, 1, InsertPosition::Before);
        let table = inserted.as_table().unwrap();
        assert_eq!(table.cols, 4);
        assert_eq!(table.column_bindings.get(&0).map(String::as_str), Some("a"));
        assert_eq!(table.column_bindings.get(&3).map(String::as_str), Some("c"));
        assert!(!table.column_bindings.contains_key(&2));
    }

    #[test]
    fn delete_last_row_is_refused() {
        let widget = table_widget(1, 2);
        let deleted = delete_rows(&widget, 0, 0);
        assert_eq!(deleted.as_table().unwrap().rows, 1);
    }

    #[test]
    fn delete_rows_drops_contained_spans_and_shrinks_straddlers() {
        let merged = merge_cells(&table_widget(4, 1), Selection::new(1, 0, 3, 0));
        let deleted = delete_rows(&merged, 2, 3);
        let table = deleted.as_table().unwrap();
        assert_eq!(table.rows, 2);
        // The 3-row span lost its two deleted rows.
        assert_eq!(table.cells[1][0].row_span, 1);
        assert!(grid_is_consistent(table));
    }

    #[test]
    fn delete_rows_redistributes_fraction_onto_predecessor() {
        let widget = table_widget(4, 1);
        let deleted = delete_rows(&widget, 2, 3);
        let table = deleted.as_table().unwrap();
        // Rows 2+3 held 0.5; row 1 absorbed it.
        assert!((table.row_heights[0] - 0.25).abs() < 1e-9);
        assert!((table.row_heights[1] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn delete_first_rows_redistributes_onto_first_survivor() {
        let deleted = delete_rows(&table_widget(4, 1), 0, 1);
        let table = deleted.as_table().unwrap();
        assert!((table.row_heights[0] - 0.75).abs() < 1e-9);
        assert!((fractions_sum(&table.row_heights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn delete_cols_drops_and_shifts_bindings() {
        let mut widget = table_widget(2, 4);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.column_bindings.insert(1, "gone".to_string());
            t.column_bindings.insert(3, "kept".to_string());
        }
        let deleted = delete_cols(&widget, 1, 2);
        let table = deleted.as_table().unwrap();
        assert_eq!(table.cols, 2);
        assert_eq!(
            table.column_bindings.get(&1).map(String::as_str),
            Some("kept")
        );
        assert!(!table.column_bindings.values().any(|v| v == "gone"));
    }

    #[test]
    fn delete_clamps_header_rows() {
        let mut widget = table_widget(4, 1);
        if let crate::model::WidgetKind::Table(t) = &mut widget.kind {
            t.header_rows = 3;
        }
        let deleted = delete_rows(&widget, 1, 3);
        assert_eq!(deleted.as_table().unwrap().header_rows, 1);
    }

    #[test]
    fn insert_then_delete_restores_row_count_and_fraction_sum() {
        let original = table_widget(3, 2);
        let inserted = insert_row(&original, 1, InsertPosition::After);
        let restored = delete_rows(&inserted, 2, 2);
        let table = restored.as_table().unwrap();
        assert_eq!(table.rows, 3);
        assert!((fractions_sum(&table.row_heights) - 1.0).abs() < 1e-9);
        assert!(grid_is_consistent(table));
    }
}
