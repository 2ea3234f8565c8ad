//! # Data Binding Resolver
//!
//! Templates reference external data by column name. This module owns the
//! lookup seam: a [`DataSource`] produces named columns of scalar values, and
//! [`resolve`] turns a `(column, row index)` pair into the literal string a
//! widget or cell displays.
//!
//! Lookup is deliberately lenient: a missing source, missing column, or
//! out-of-range row never errors. Preview rendering must not throw when a
//! template asks for more rows than the data has, so indices clamp and
//! absences resolve to the empty string.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Cell, TableMode, TableWidget};

/// A scalar value produced by a data source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            // Integral numbers print without a trailing ".0" (spreadsheet
            // columns are full of integers stored as floats).
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

/// The provider seam: named columns of equal-length scalar sequences.
/// Excel ingestion, fixtures, and tests all sit behind this trait.
pub trait DataSource {
    /// The ordered values of a named column, or `None` if absent.
    fn column(&self, name: &str) -> Option<&[Scalar]>;

    /// Length of the longest column: the row count batch printing expands
    /// against. Zero when the source is empty.
    fn row_count(&self) -> usize;

    /// A single value, clamped into range; empty string on any absence.
    fn column_value(&self, name: &str, index: usize) -> String {
        resolve(self, name, index)
    }
}

/// An in-memory data source; deserializes from a JSON object of arrays,
/// e.g. `{"sku": ["A-1", "A-2"], "qty": [3, 7]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemorySource {
    columns: BTreeMap<String, Vec<Scalar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, values: Vec<Scalar>) -> Self {
        self.columns.insert(name.to_string(), values);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl DataSource for InMemorySource {
    fn column(&self, name: &str) -> Option<&[Scalar]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    fn row_count(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// The empty data source: every lookup resolves to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl DataSource for EmptySource {
    fn column(&self, _name: &str) -> Option<&[Scalar]> {
        None
    }

    fn row_count(&self) -> usize {
        0
    }
}

/// Resolve a bound column value for a row index. Clamps the index into
/// `[0, len - 1]`; returns the empty string when the source, column, or any
/// value is absent. Never errors.
pub fn resolve<S: DataSource + ?Sized>(source: &S, name: &str, index: usize) -> String {
    match source.column(name) {
        Some(values) if !values.is_empty() => {
            let clamped = index.min(values.len() - 1);
            values[clamped].to_string()
        }
        _ => String::new(),
    }
}

/// The binding a table cell effectively carries, after precedence:
/// a cell's own binding wins over a column-level binding; in simple mode only
/// direct cell bindings are honored; in complex/legacy modes column bindings
/// apply to all non-header, non-overridden cells.
pub fn effective_cell_binding<'a>(
    table: &'a TableWidget,
    cell: &'a Cell,
    row: usize,
    col: usize,
) -> Option<&'a str> {
    if let Some(binding) = cell.binding.as_deref() {
        return Some(binding);
    }
    if table.mode == TableMode::Simple {
        return None;
    }
    if row < table.effective_header_rows() {
        return None;
    }
    table.column_bindings.get(&col).map(|s| s.as_str())
}

/// The longest bound column length across a table's cell and column bindings.
/// Zero when nothing is bound or nothing resolves.
pub fn longest_bound_column<S: DataSource + ?Sized>(table: &TableWidget, source: &S) -> usize {
    let mut longest = 0;
    let mut consider = |name: &str| {
        if let Some(values) = source.column(name) {
            longest = longest.max(values.len());
        }
    };
    for name in table.column_bindings.values() {
        if table.mode != TableMode::Simple {
            consider(name);
        }
    }
    for cell in table.cells.iter().flatten() {
        if let Some(name) = cell.binding.as_deref() {
            consider(name);
        }
    }
    longest
}
