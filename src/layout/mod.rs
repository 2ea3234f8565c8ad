//! # Pagination Engine
//!
//! This is the heart of the crate and the reason it exists.
//!
//! A template is a set of absolutely positioned widgets; data binding can
//! grow a table to a row count nobody knew at authoring time. The engine
//! takes the height-resolved widget list and deterministically partitions it
//! into physical pages — never slicing after the fact, always deciding with
//! the page boundary as a hard constraint:
//!
//! 1. Walk the widgets in authored vertical order
//! 2. Before placing, ask: "does this fit in the space left on this page?"
//! 3. If it fits: place it, advance the cursor
//! 4. If it doesn't and it cannot split: close the page, place it fresh
//! 5. If it is a data-driven table: place the rows that fit, then keep
//!    emitting row-window fragments onto fresh pages, repeating the header
//!    rows on every fragment
//!
//! The engine is a pure function of (widget list, paper size, batch config,
//! height-offset map, data snapshot). It never errors: missing data resolves
//! to zero rows, missing offsets to zero, and at worst a page overflows
//! visually. Recomputation is the host's concern — call it again whenever
//! any input changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::data::DataSource;
use crate::geom::{mm_to_px, px_to_mm, units_that_fit, FIT_EPSILON};
use crate::model::{PaperSize, TableMode, TableWidget, Template, Widget, WidgetKind};
use crate::table::materialize::materialized_row_count;

/// Hard cap on fragments per table. A widget taller than anything sane would
/// otherwise loop; when the cap trips, the remaining rows land in one final
/// oversized fragment.
pub const MAX_FRAGMENTS: usize = 512;

/// One physical output page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Zero-based page number.
    pub index: usize,

    /// The paper this page is rendered on, echoed per page so the renderer
    /// can paint margins, header/footer text, and watermark without reaching
    /// back into the template.
    pub paper: PaperSize,

    /// Widgets on this page, in placement order.
    pub placements: Vec<Placement>,
}

/// A widget placed on a page: the renderer contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// The template widget (template-level geometry, untouched).
    pub widget: Widget,

    /// Top edge within the page content area, millimeters.
    pub top_in_page_mm: f64,

    /// How far pagination pushed the widget down from its authored y on
    /// this page. Zero when it rendered exactly where authored.
    pub page_offset_mm: f64,

    /// For split tables: first materialized row index painted here.
    /// Header rows are additionally repeated on every fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_start_row: Option<usize>,

    /// For split tables: last materialized row index painted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_end_row: Option<usize>,

    /// In batch mode, the data row every binding on this page resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_row: Option<usize>,
}

/// Explicit two-pass height feedback. The renderer measures what actually
/// got painted and reports it back here; the next pagination pass folds the
/// offsets in. Until the first report arrives, offsets are zero and authored
/// heights stand — an accepted one-frame imprecision, not a bug.
#[derive(Debug, Clone, Default)]
pub struct LayoutContext {
    height_offsets: HashMap<String, f64>,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measured height for a widget. Stores `measured - authored`.
    pub fn report_height(&mut self, widget_id: &str, measured_mm: f64, authored_mm: f64) {
        self.height_offsets
            .insert(widget_id.to_string(), measured_mm - authored_mm);
    }

    /// The stored offset for a widget, zero when never reported.
    pub fn offset_for(&self, widget_id: &str) -> f64 {
        self.height_offsets.get(widget_id).copied().unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.height_offsets.clear();
    }
}

/// Tracks the in-progress page during flow layout.
#[derive(Debug, Clone)]
struct PageCursor {
    index: usize,
    placements: Vec<Placement>,
    /// Bottom edge, in pixels, of the last-placed widget on this page.
    next_min_top_px: f64,
}

impl PageCursor {
    fn new(index: usize) -> Self {
        Self {
            index,
            placements: Vec::new(),
            next_min_top_px: 0.0,
        }
    }

    fn finalize(&self, paper: &PaperSize) -> Page {
        Page {
            index: self.index,
            paper: paper.clone(),
            placements: self.placements.clone(),
        }
    }

    /// Emit the current page and start a fresh one.
    fn close(&mut self, pages: &mut Vec<Page>, paper: &PaperSize) {
        debug!(
            page = self.index,
            widgets = self.placements.len(),
            "closing page"
        );
        pages.push(self.finalize(paper));
        *self = PageCursor::new(self.index + 1);
    }
}

/// The pagination engine. Stateless; every call is a full pure computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator;

impl Paginator {
    pub fn new() -> Self {
        Self
    }

    /// Partition the template's widgets into pages against a data snapshot
    /// and the current height-offset context.
    pub fn paginate(
        &self,
        template: &Template,
        source: &dyn DataSource,
        ctx: &LayoutContext,
    ) -> Vec<Page> {
        if let Some(pages) = self.batch_pages(template, source) {
            return pages;
        }
        self.flow_pages(template, source, ctx)
    }

    /// Batch mode: one full page per selected data row; no reflow, no
    /// splitting. Active only when batch printing is enabled and the bound
    /// source has at least one row; otherwise falls through to flow mode.
    fn batch_pages(&self, template: &Template, source: &dyn DataSource) -> Option<Vec<Page>> {
        if !template.batch.enabled {
            return None;
        }
        let rows = template.batch.selected_rows(source.row_count());
        if rows.is_empty() {
            return None;
        }
        debug!(pages = rows.len(), "batch expansion");

        let pages = rows
            .iter()
            .enumerate()
            .map(|(index, &data_row)| Page {
                index,
                paper: template.paper.clone(),
                placements: template
                    .widgets
                    .iter()
                    .map(|widget| Placement {
                        widget: widget.clone(),
                        top_in_page_mm: widget.y,
                        page_offset_mm: 0.0,
                        table_start_row: None,
                        table_end_row: None,
                        data_row: Some(data_row),
                    })
                    .collect(),
            })
            .collect();
        Some(pages)
    }

    /// Flow mode: pack widgets top-to-bottom with automatic page breaks and
    /// mid-table row splitting.
    fn flow_pages(
        &self,
        template: &Template,
        source: &dyn DataSource,
        ctx: &LayoutContext,
    ) -> Vec<Page> {
        let paper = &template.paper;
        let content_px = mm_to_px(paper.content_height());

        let mut ordered: Vec<&Widget> = template.widgets.iter().collect();
        ordered.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));

        let mut pages: Vec<Page> = Vec::new();
        let mut cursor = PageCursor::new(0);

        for widget in ordered {
            let actual_px = mm_to_px(self.actual_height_mm(widget, source, ctx));
            let authored_px = mm_to_px(widget.y);
            let force = template.global_force_page_break || widget.force_page_break;
            let is_table = matches!(widget.kind, WidgetKind::Table(_));

            // A widget never renders above where the previous one ended, but
            // also never moves above its authored position: deliberate
            // manual gaps are preserved.
            let mut candidate_px = authored_px.max(cursor.next_min_top_px);

            // Tables are exempt from the simple doesn't-fit rule; they split
            // instead.
            let fits = candidate_px + actual_px <= content_px + FIT_EPSILON;
            if !cursor.placements.is_empty() && (force || (!is_table && !fits)) {
                cursor.close(&mut pages, paper);
                candidate_px = authored_px.max(cursor.next_min_top_px);
            }

            if let Some(table) = widget.as_table() {
                if table.mode == TableMode::Complex
                    && candidate_px + actual_px > content_px + FIT_EPSILON
                {
                    self.place_split_table(
                        widget,
                        table,
                        source,
                        actual_px,
                        candidate_px,
                        authored_px,
                        content_px,
                        &mut cursor,
                        &mut pages,
                        paper,
                    );
                    if force {
                        cursor.close(&mut pages, paper);
                    }
                    continue;
                }
            }

            trace!(widget = %widget.id, page = cursor.index, top_px = candidate_px, "place");
            cursor.placements.push(Placement {
                widget: widget.clone(),
                top_in_page_mm: px_to_mm(candidate_px),
                page_offset_mm: px_to_mm(candidate_px - authored_px).max(0.0),
                table_start_row: None,
                table_end_row: None,
                data_row: None,
            });
            cursor.next_min_top_px = candidate_px + actual_px;

            // A forced widget owns its page: close right after placing so
            // the next widget starts fresh.
            if force {
                cursor.close(&mut pages, paper);
            }
        }

        if !cursor.placements.is_empty() {
            pages.push(cursor.finalize(paper));
        }
        if pages.is_empty() {
            // Best-effort single page so the renderer always has something.
            pages.push(PageCursor::new(0).finalize(paper));
        }
        pages
    }

    /// Data-driven (complex) table that exceeds the space left on its
    /// candidate page: emit row-window fragments. Every fragment repeats the
    /// header rows; the `(start, end)` window tells the renderer which
    /// materialized rows to paint.
    #[allow(clippy::too_many_arguments)]
    fn place_split_table(
        &self,
        widget: &Widget,
        table: &TableWidget,
        source: &dyn DataSource,
        actual_px: f64,
        candidate_px: f64,
        authored_px: f64,
        content_px: f64,
        cursor: &mut PageCursor,
        pages: &mut Vec<Page>,
        paper: &PaperSize,
    ) {
        let total_rows = materialized_row_count(table, source).max(1);
        let header_rows = table.effective_header_rows();
        let row_px = actual_px / total_rows as f64;

        let push_fragment =
            |cursor: &mut PageCursor, top_px: f64, offset_px: f64, start: usize, end: usize| {
                trace!(
                    widget = %widget.id,
                    page = cursor.index,
                    start,
                    end,
                    "table fragment"
                );
                cursor.placements.push(Placement {
                    widget: widget.clone(),
                    top_in_page_mm: px_to_mm(top_px),
                    page_offset_mm: px_to_mm(offset_px).max(0.0),
                    table_start_row: Some(start),
                    table_end_row: Some(end),
                    data_row: None,
                });
            };

        let remaining_px = (content_px - candidate_px).max(0.0);
        let leading = units_that_fit(remaining_px, row_px);

        let mut next_row;
        if leading >= header_rows + 1 {
            // Header plus at least one data row fit: split here.
            push_fragment(
                cursor,
                candidate_px,
                candidate_px - authored_px,
                0,
                leading - 1,
            );
            cursor.close(pages, paper);
            next_row = leading;
        } else {
            // Not even one data row fits under the widgets already placed:
            // the whole table starts fresh on a new page.
            if !cursor.placements.is_empty() {
                cursor.close(pages, paper);
            }
            next_row = 0;
        }

        if next_row == 0 && actual_px <= content_px + FIT_EPSILON {
            // The fresh page holds the whole table; no window needed.
            cursor.placements.push(Placement {
                widget: widget.clone(),
                top_in_page_mm: 0.0,
                page_offset_mm: 0.0,
                table_start_row: None,
                table_end_row: None,
                data_row: None,
            });
            cursor.next_min_top_px = actual_px;
            return;
        }

        // Continuation fragments: up to a full content height of rows each.
        let capacity = units_that_fit(content_px, row_px).max(1);
        let mut fragments = 0;
        while next_row < total_rows {
            fragments += 1;
            let end = if fragments >= MAX_FRAGMENTS {
                total_rows - 1
            } else {
                (next_row + capacity - 1).min(total_rows - 1)
            };
            push_fragment(cursor, 0.0, 0.0, next_row, end);

            let window = end - next_row + 1;
            // The repeated header is painted in addition to the window, so
            // the cursor advances past both.
            cursor.next_min_top_px = (window + header_rows) as f64 * row_px;
            next_row = end + 1;
            if next_row < total_rows {
                cursor.close(pages, paper);
            }
        }
        debug!(widget = %widget.id, fragments, total_rows, "table split");
    }

    /// A widget's render height. Complex tables scale analytically with the
    /// materialized row count; everything else is authored height plus the
    /// measured offset reported through the feedback loop.
    fn actual_height_mm(
        &self,
        widget: &Widget,
        source: &dyn DataSource,
        ctx: &LayoutContext,
    ) -> f64 {
        if let Some(table) = widget.as_table() {
            if table.mode == TableMode::Complex && table.rows > 0 {
                let materialized = materialized_row_count(table, source);
                return widget.height * materialized as f64 / table.rows as f64;
            }
        }
        widget.height + ctx.offset_for(&widget.id)
    }
}
