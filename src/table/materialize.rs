//! # Table Preview Materializer
//!
//! Expands a table's authored template rows into the concrete rows that get
//! rendered against data. An unbound table passes through untouched so
//! manually authored content is preserved. A bound table keeps its header
//! rows verbatim and repeats its body template rows (cyclically when the
//! template has more than one) until every bound data row is represented,
//! then overwrites each produced cell with its resolved value.
//!
//! Simple-mode tables are the degenerate case: one data row fills the whole
//! table, so no expansion happens — bound cells just resolve at row 0.

use crate::data::{effective_cell_binding, longest_bound_column, resolve, DataSource};
use crate::model::{Cell, TableMode, TableWidget};

/// Row count the table will occupy once materialized against `source`:
/// header rows plus `max(longest bound column, authored body rows)`. Equal to
/// the authored row count when nothing is bound — the table never shrinks
/// below its authored size.
pub fn materialized_row_count<S: DataSource + ?Sized>(table: &TableWidget, source: &S) -> usize {
    if !table.has_bindings() || table.mode == TableMode::Simple {
        return table.rows;
    }
    let header = table.effective_header_rows();
    let body = table.body_rows();
    if body == 0 {
        return table.rows;
    }
    header + longest_bound_column(table, source).max(body)
}

/// Expand the table's cells against `source`. Pure pass-through when no
/// bindings exist.
pub fn materialize<S: DataSource + ?Sized>(table: &TableWidget, source: &S) -> Vec<Vec<Cell>> {
    if !table.has_bindings() {
        return table.cells.clone();
    }

    if table.mode == TableMode::Simple {
        return table
            .cells
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, cell)| resolved_clone(table, source, cell, r, c, 0))
                    .collect()
            })
            .collect();
    }

    let header = table.effective_header_rows();
    let body_template: Vec<&Vec<Cell>> = table.cells.iter().skip(header).collect();
    if body_template.is_empty() {
        return table.cells.clone();
    }

    let target = longest_bound_column(table, source).max(body_template.len());
    let mut out: Vec<Vec<Cell>> = table.cells.iter().take(header).cloned().collect();

    for i in 0..target {
        let template_index = i % body_template.len();
        let template_row_index = header + template_index;
        let row = body_template[template_index]
            .iter()
            .enumerate()
            .map(|(c, cell)| resolved_clone(table, source, cell, template_row_index, c, i))
            .collect();
        out.push(row);
    }

    out
}

/// Clone a template cell, overwriting its content with the resolved bound
/// value for data row `data_row` when a binding applies.
fn resolved_clone<S: DataSource + ?Sized>(
    table: &TableWidget,
    source: &S,
    cell: &Cell,
    row: usize,
    col: usize,
    data_row: usize,
) -> Cell {
    let mut out = cell.clone();
    if out.is_covered() {
        return out;
    }
    if let Some(binding) = effective_cell_binding(table, cell, row, col) {
        out.content = resolve(source, binding, data_row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EmptySource, InMemorySource};
    use crate::model::TableMode;
    use pretty_assertions::assert_eq;

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with_column("sku", vec!["A-1".into(), "A-2".into(), "A-3".into()])
            .with_column("qty", vec![3.0.into(), 7.0.into(), 11.0.into()])
    }

    fn bound_complex_table() -> TableWidget {
        let mut table = TableWidget::blank(TableMode::Complex, 2, 2);
        table.cells[0][0].content = "SKU".to_string();
        table.cells[0][1].content = "Qty".to_string();
        table.column_bindings.insert(0, "sku".to_string());
        table.column_bindings.insert(1, "qty".to_string());
        table
    }

    #[test]
    fn unbound_table_passes_through() {
        let mut table = TableWidget::blank(TableMode::Legacy, 3, 2);
        table.cells[2][1].content = "authored".to_string();
        let cells = materialize(&table, &source());
        assert_eq!(cells[2][1].content, "authored");
        assert_eq!(cells.len(), 3);
    }

    #[test]
    fn complex_table_stretches_to_data_length() {
        let table = bound_complex_table();
        assert_eq!(materialized_row_count(&table, &source()), 4);
        let cells = materialize(&table, &source());
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0][0].content, "SKU");
        assert_eq!(cells[1][0].content, "A-1");
        assert_eq!(cells[3][0].content, "A-3");
        assert_eq!(cells[3][1].content, "11");
    }

    #[test]
    fn sparse_data_never_shrinks_below_authored_size() {
        let mut table = bound_complex_table();
        table.rows = 5;
        table.cells = vec![table.cells[0].clone(), table.cells[1].clone()];
        for _ in 0..3 {
            table.cells.push(table.cells[1].clone());
        }
        let thin = InMemorySource::new().with_column("sku", vec!["only".into()]);
        assert_eq!(materialized_row_count(&table, &thin), 5);
        let cells = materialize(&table, &thin);
        assert_eq!(cells.len(), 5);
        // Rows past the data clamp to the last value.
        assert_eq!(cells[1][0].content, "only");
        assert_eq!(cells[4][0].content, "only");
    }

    #[test]
    fn multi_row_body_template_repeats_cyclically() {
        let mut table = TableWidget::blank(TableMode::Legacy, 3, 1);
        table.header_rows = 1;
        table.cells[1][0].content = "even".to_string();
        table.cells[2][0].content = "odd".to_string();
        table.cells[1][0].binding = Some("sku".to_string());
        let cells = materialize(&table, &source());
        assert_eq!(cells.len(), 4); // header + 3 data rows
        assert_eq!(cells[1][0].content, "A-1"); // template row 1, bound
        assert_eq!(cells[2][0].content, "odd"); // template row 2, unbound
        assert_eq!(cells[3][0].content, "A-3"); // cycle back to template row 1
    }

    #[test]
    fn simple_mode_fills_without_expansion() {
        let mut table = TableWidget::blank(TableMode::Simple, 2, 2);
        table.cells[0][0].binding = Some("sku".to_string());
        table.cells[1][1].binding = Some("qty".to_string());
        let cells = materialize(&table, &source());
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0][0].content, "A-1");
        assert_eq!(cells[1][1].content, "3");
    }

    #[test]
    fn missing_source_resolves_to_empty_strings() {
        let table = bound_complex_table();
        let cells = materialize(&table, &EmptySource);
        // Body template rows survive; their bound cells go blank.
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1][0].content, "");
    }

    #[test]
    fn header_only_table_passes_through() {
        let mut table = TableWidget::blank(TableMode::Legacy, 1, 2);
        table.header_rows = 1;
        table.column_bindings.insert(0, "sku".to_string());
        let cells = materialize(&table, &source());
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0][0].content, "");
    }
}
