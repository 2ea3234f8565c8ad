//! # Template Model
//!
//! The input representation for the pagination engine. A template is a paper
//! size plus a flat list of absolutely positioned widgets, designed to be
//! easily produced by a canvas editor, direct JSON construction, or a stored
//! snapshot. All geometry is authored in millimeters.
//!
//! The model is intentionally close to the editor's mental model: you have
//! text, images, barcodes, shapes — and tables, the one structurally deep
//! widget. The engine never mutates template-level geometry; it only computes
//! render-time placement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geom::Rect;

/// A complete template ready for pagination: the persistence snapshot the
/// editor stores and the engine is constructed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Physical page configuration.
    #[serde(default)]
    pub paper: PaperSize,

    /// All widgets on the template, in authoring order.
    #[serde(default)]
    pub widgets: Vec<Widget>,

    /// When set, every widget gets its own page.
    #[serde(default)]
    pub global_force_page_break: bool,

    /// Batch printing configuration (one page per bound data row).
    #[serde(default)]
    pub batch: BatchPrintConfig,
}

impl Template {
    pub fn new(paper: PaperSize, widgets: Vec<Widget>) -> Self {
        Self {
            paper,
            widgets,
            global_force_page_break: false,
            batch: BatchPrintConfig::default(),
        }
    }

    /// Collaborator-boundary sanity check for persisted snapshots. The engine
    /// itself never errors; this is for surfacing "template is corrupt" to a
    /// user before layout is attempted.
    pub fn validate(&self) -> Result<(), crate::error::PlatenError> {
        if self.paper.width <= 0.0 || self.paper.height <= 0.0 {
            return Err(crate::error::PlatenError::InvalidTemplate(format!(
                "paper size must be positive, got {}x{}mm",
                self.paper.width, self.paper.height
            )));
        }
        for widget in &self.widgets {
            if widget.width <= 0.0 || widget.height <= 0.0 {
                return Err(crate::error::PlatenError::InvalidTemplate(format!(
                    "widget '{}' has non-positive size {}x{}mm",
                    widget.id, widget.width, widget.height
                )));
            }
            if let WidgetKind::Table(table) = &widget.kind {
                if table.cells.len() != table.rows
                    || table.cells.iter().any(|row| row.len() != table.cols)
                {
                    return Err(crate::error::PlatenError::InvalidTemplate(format!(
                        "widget '{}' cell grid does not match {}x{}",
                        widget.id, table.rows, table.cols
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Physical page dimensions in millimeters, plus the page furniture the
/// renderer paints around content (gutter margins, header/footer text,
/// watermark). Drives the engine's usable content height.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,

    /// Gutter margins in millimeters.
    #[serde(default)]
    pub margin: Edges,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::a4()
    }
}

impl PaperSize {
    pub fn a4() -> Self {
        Self::custom(210.0, 297.0)
    }

    pub fn custom(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margin: Edges::default(),
            header_text: None,
            footer_text: None,
            watermark: None,
        }
    }

    /// Usable content height in millimeters.
    pub fn content_height(&self) -> f64 {
        (self.height - self.margin.vertical()).max(0.0)
    }

    /// Usable content width in millimeters.
    pub fn content_width(&self) -> f64 {
        (self.width - self.margin.horizontal()).max(0.0)
    }
}

/// Edge values (top, right, bottom, left) in millimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Watermark painted behind page content by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub text: String,
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

fn default_watermark_opacity() -> f64 {
    0.15
}

/// A positioned, sized element on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    /// Stable identifier; placements and height offsets are keyed by it.
    pub id: String,

    /// What kind of widget this is.
    pub kind: WidgetKind,

    /// Position in millimeters. May go negative transiently during a drag;
    /// persisted templates keep it non-negative.
    pub x: f64,
    pub y: f64,

    /// Size in millimeters. Always positive.
    pub width: f64,
    pub height: f64,

    /// Stacking order within a page.
    #[serde(default)]
    pub z_index: i32,

    /// Start a fresh page before this widget and close the page after it.
    #[serde(default)]
    pub force_page_break: bool,
}

/// The different kinds of widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WidgetKind {
    /// Static or data-bound text.
    Text {
        #[serde(default)]
        content: String,
        /// Bound external column name; wins over `content` when data exists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binding: Option<String>,
    },

    /// An image reference (path or data URI); the renderer resolves it.
    Image {
        #[serde(default)]
        src: String,
    },

    /// The structurally deep widget; see [`TableWidget`].
    Table(TableWidget),

    /// 1D barcode. The renderer owns symbology and rasterization.
    Barcode {
        #[serde(default)]
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binding: Option<String>,
    },

    /// QR code.
    Qrcode {
        #[serde(default)]
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binding: Option<String>,
    },

    /// A straight line spanning the widget box.
    Line,

    /// A rectangle (border/fill decided by the renderer).
    Rect,
}

impl Widget {
    /// Create a text widget with type-specific defaults.
    pub fn text(id: &str, x: f64, y: f64, width: f64, height: f64, content: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: WidgetKind::Text {
                content: content.to_string(),
                binding: None,
            },
            x,
            y,
            width,
            height,
            z_index: 0,
            force_page_break: false,
        }
    }

    /// Create a table widget.
    pub fn table(id: &str, x: f64, y: f64, width: f64, height: f64, table: TableWidget) -> Self {
        Self {
            id: id.to_string(),
            kind: WidgetKind::Table(table),
            x,
            y,
            width,
            height,
            z_index: 0,
            force_page_break: false,
        }
    }

    /// The widget's authored bounding box.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn as_table(&self) -> Option<&TableWidget> {
        match &self.kind {
            WidgetKind::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// How a table binds and repeats against external data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// No header; each cell may bind its own column; one data row fills the
    /// whole table. Column-level bindings are ignored.
    Simple,
    /// One header row template + one body row template; the body repeats once
    /// per bound data row. Manual merge/insert/delete are disallowed.
    Complex,
    /// Free-form: configurable header row count, supports both per-column and
    /// per-cell bindings and all structural operations.
    #[default]
    Legacy,
}

/// The table widget's internal grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableWidget {
    #[serde(default)]
    pub mode: TableMode,

    pub rows: usize,
    pub cols: usize,

    /// Dense `rows x cols` grid. Covered positions (inside another cell's
    /// merge span) carry `row_span == 0 && col_span == 0`.
    pub cells: Vec<Vec<Cell>>,

    /// Per-column width fractions summing to 1. Missing or mismatched length
    /// means uniform.
    #[serde(default)]
    pub column_widths: Vec<f64>,

    /// Per-row height fractions summing to 1. Same leniency as columns.
    #[serde(default)]
    pub row_heights: Vec<f64>,

    /// Sparse column-index → bound column name (legacy/complex modes).
    #[serde(default, deserialize_with = "deserialize_column_bindings")]
    pub column_bindings: BTreeMap<usize, String>,

    /// Leading rows treated as header. Repeated on every split fragment.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
}

fn default_header_rows() -> usize {
    1
}

/// JSON object keys are strings; the internally tagged [`WidgetKind`] enum
/// buffers values during deserialization, which bypasses serde_json's usual
/// string→integer map-key handling, so parse the indices manually.
fn deserialize_column_bindings<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<usize, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<usize>()
                .map(|index| (index, value))
                .map_err(|_| D::Error::custom(format!("invalid column index key '{key}'")))
        })
        .collect()
}

impl TableWidget {
    /// A blank `rows x cols` grid with uniform fractions and no bindings.
    pub fn blank(mode: TableMode, rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            mode,
            rows,
            cols,
            cells: vec![vec![Cell::default(); cols]; rows],
            column_widths: uniform_fractions(cols),
            row_heights: uniform_fractions(rows),
            column_bindings: BTreeMap::new(),
            header_rows: if mode == TableMode::Simple { 0 } else { 1 },
        }
    }

    /// Effective column fractions: normalized, or uniform when the stored
    /// array is missing or the wrong length.
    pub fn column_fractions(&self) -> Vec<f64> {
        effective_fractions(&self.column_widths, self.cols)
    }

    /// Effective row fractions, with the same leniency.
    pub fn row_fractions(&self) -> Vec<f64> {
        effective_fractions(&self.row_heights, self.rows)
    }

    /// Header row count clamped to the grid.
    pub fn effective_header_rows(&self) -> usize {
        self.header_rows.min(self.rows)
    }

    /// Authored body (non-header) row count, at least zero.
    pub fn body_rows(&self) -> usize {
        self.rows.saturating_sub(self.effective_header_rows())
    }

    /// Does any cell or column carry a data binding?
    pub fn has_bindings(&self) -> bool {
        !self.column_bindings.is_empty()
            || self
                .cells
                .iter()
                .flatten()
                .any(|cell| cell.binding.is_some())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }
}

/// A single grid position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub content: String,

    /// Span over rows. 0 marks a covered position.
    #[serde(default = "default_span")]
    pub row_span: u32,

    /// Span over columns. 0 marks a covered position.
    #[serde(default = "default_span")]
    pub col_span: u32,

    /// Direct data-column binding; wins over any column-level binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,

    /// Per-cell style overrides the renderer applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
}

fn default_span() -> u32 {
    1
}

impl Default for Cell {
    /// A blank 1x1 cell, never a covered position.
    fn default() -> Self {
        Self {
            content: String::new(),
            row_span: 1,
            col_span: 1,
            binding: None,
            style: None,
        }
    }
}

impl Cell {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            row_span: 1,
            col_span: 1,
            binding: None,
            style: None,
        }
    }

    pub fn bound(column: &str) -> Self {
        Self {
            content: String::new(),
            row_span: 1,
            col_span: 1,
            binding: Some(column.to_string()),
            style: None,
        }
    }

    /// A position inside another cell's merge span; never rendered.
    pub fn covered() -> Self {
        Self {
            content: String::new(),
            row_span: 0,
            col_span: 0,
            binding: None,
            style: None,
        }
    }

    pub fn is_covered(&self) -> bool {
        self.row_span == 0 || self.col_span == 0
    }
}

/// Per-cell style overrides. Interpreted by the renderer, transported here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<CellAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAlign {
    Left,
    Center,
    Right,
}

/// Batch printing: one full page per selected data row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPrintConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Name of the data source file feeding the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_file: Option<String>,

    #[serde(default)]
    pub print_range: PrintRange,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintRange {
    #[default]
    All,
    Range,
}

impl BatchPrintConfig {
    /// Resolve the selected data-row indices against the available row count.
    /// Range bounds are clamped here, at resolution time, never at
    /// config-write time. Empty when no rows are available.
    pub fn selected_rows(&self, available: usize) -> Vec<usize> {
        if available == 0 {
            return Vec::new();
        }
        match self.print_range {
            PrintRange::All => (0..available).collect(),
            PrintRange::Range => {
                let start = self.range_start.unwrap_or(0).min(available - 1);
                let end = self.range_end.unwrap_or(start).min(available - 1);
                if end < start {
                    return Vec::new();
                }
                (start..=end).collect()
            }
        }
    }
}

/// Uniform `1/n` fractions.
pub fn uniform_fractions(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Normalize `raw` to sum to 1, falling back to uniform when the array is
/// missing, the wrong length, or degenerate.
pub fn effective_fractions(raw: &[f64], n: usize) -> Vec<f64> {
    if raw.len() != n {
        return uniform_fractions(n);
    }
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 || raw.iter().any(|f| *f < 0.0) {
        return uniform_fractions(n);
    }
    raw.iter().map(|f| f / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn widget_kind_round_trips_through_json() {
        let widget = Widget::text("t1", 10.0, 20.0, 50.0, 8.0, "hello");
        let json = serde_json::to_string(&widget).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        let back: Widget = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "t1");
        assert_eq!(back.y, 20.0);
    }

    #[test]
    fn table_widget_round_trips() {
        let table = TableWidget::blank(TableMode::Complex, 2, 3);
        let widget = Widget::table("tbl", 0.0, 0.0, 90.0, 20.0, table);
        let json = serde_json::to_string(&widget).unwrap();
        let back: Widget = serde_json::from_str(&json).unwrap();
        let table = back.as_table().unwrap();
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 3);
        assert_eq!(table.mode, TableMode::Complex);
    }

    #[test]
    fn missing_fraction_array_means_uniform() {
        let mut table = TableWidget::blank(TableMode::Legacy, 4, 2);
        table.row_heights.clear();
        let fractions = table.row_fractions();
        assert_eq!(fractions.len(), 4);
        assert!((fractions[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mismatched_fraction_array_means_uniform() {
        let mut table = TableWidget::blank(TableMode::Legacy, 3, 3);
        table.column_widths = vec![0.5, 0.5]; // one short
        let fractions = table.column_fractions();
        assert!((fractions.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn unnormalized_fraction_array_is_renormalized() {
        let fractions = effective_fractions(&[2.0, 2.0, 4.0], 3);
        assert!((fractions[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn batch_range_clamps_at_resolution_time() {
        let batch = BatchPrintConfig {
            enabled: true,
            data_source_file: Some("orders.xlsx".into()),
            print_range: PrintRange::Range,
            range_start: Some(2),
            range_end: Some(50),
        };
        assert_eq!(batch.selected_rows(10), vec![2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(batch.selected_rows(0), Vec::<usize>::new());
    }

    #[test]
    fn batch_all_selects_everything() {
        let batch = BatchPrintConfig {
            enabled: true,
            ..Default::default()
        };
        assert_eq!(batch.selected_rows(3), vec![0, 1, 2]);
    }

    #[test]
    fn validate_rejects_degenerate_sizes() {
        let mut template = Template::new(
            PaperSize::a4(),
            vec![Widget::text("a", 0.0, 0.0, 10.0, 5.0, "x")],
        );
        assert!(template.validate().is_ok());
        template.widgets[0].height = 0.0;
        assert!(template.validate().is_err());
    }

    #[test]
    fn validate_rejects_ragged_grid() {
        let mut table = TableWidget::blank(TableMode::Legacy, 2, 2);
        table.cells[1].pop();
        let template = Template::new(
            PaperSize::a4(),
            vec![Widget::table("tbl", 0.0, 0.0, 80.0, 20.0, table)],
        );
        assert!(template.validate().is_err());
    }

    #[test]
    fn paper_content_height_subtracts_margins() {
        let mut paper = PaperSize::custom(100.0, 150.0);
        paper.margin = Edges::uniform(10.0);
        assert_eq!(paper.content_height(), 130.0);
        assert_eq!(paper.content_width(), 80.0);
    }
}
