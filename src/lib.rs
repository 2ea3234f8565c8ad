//! # Platen
//!
//! A pagination engine for fixed-layout print templates.
//!
//! Label and form editors place widgets at absolute millimeter positions,
//! then bind them to tabular data — and suddenly a table authored with two
//! rows needs two hundred, a receipt needs five hundred copies, and the
//! single design canvas has to become an ordered list of physical pages.
//! Most editors bolt this on by measuring rendered DOM and slicing it after
//! the fact, which breaks tables at the wrong rows and loses repeated
//! headers.
//!
//! Platen does the opposite: **the page is the fundamental unit of layout.**
//! Widgets flow *into* pages; a data-driven table splits at row boundaries
//! with its header repeated on every fragment, and batch printing expands
//! one template into one page per data row before any of that starts.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]    — Template: paper, widgets, table grids, batch config
//!       ↓
//!   [table]    — Structure edits + preview materialization against data
//!       ↓
//!   [layout]   — The pagination engine: widgets → ordered pages
//!       ↓
//!   Renderer (external) — paints pages, reports measured heights back
//! ```
//!
//! The engine is pure and infallible: it never touches I/O, never errors,
//! and recomputes from scratch whenever any input changes.

pub mod data;
pub mod error;
pub mod geom;
pub mod layout;
pub mod model;
pub mod table;

pub use error::PlatenError;

use data::{DataSource, InMemorySource};
use layout::{LayoutContext, Page, Paginator};
use model::Template;

/// Paginate a template against a data snapshot.
///
/// This is the primary entry point. Re-invoke it whenever the template, the
/// data, or the height-offset context changes; the result is deterministic
/// for a given set of inputs.
pub fn paginate(template: &Template, source: &dyn DataSource, ctx: &LayoutContext) -> Vec<Page> {
    Paginator::new().paginate(template, source, ctx)
}

/// Paginate a template described as JSON, with an optional data snapshot
/// (a JSON object of column arrays), returning the page plan as JSON.
pub fn paginate_json(template_json: &str, data_json: Option<&str>) -> Result<String, PlatenError> {
    let template: Template = serde_json::from_str(template_json)?;
    template.validate()?;
    let source = match data_json {
        Some(json) => InMemorySource::from_json(json)?,
        None => InMemorySource::new(),
    };
    let pages = paginate(&template, &source, &LayoutContext::new());
    Ok(serde_json::to_string_pretty(&pages)?)
}
