//! Structured error types for the public API surface.
//!
//! The pagination engine itself never fails — missing data and malformed
//! bindings degrade to empty values and best-effort pages. Errors exist only
//! at the boundary: parsing a persisted template and validating it before
//! layout is attempted.

use thiserror::Error;

/// The unified error type returned by the public API functions.
#[derive(Debug, Error)]
pub enum PlatenError {
    /// JSON input failed to parse as a template or data snapshot.
    #[error("failed to parse input: {source}{}", format_hint(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    /// A persisted template is structurally unusable (corrupt snapshot,
    /// degenerate paper or widget geometry).
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  hint: {hint}")
    }
}

impl From<serde_json::Error> for PlatenError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the template schema. Check field names and types."
                    .to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input — is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        PlatenError::Parse { source: e, hint }
    }
}
