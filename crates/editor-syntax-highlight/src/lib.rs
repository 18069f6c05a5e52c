#![warn(missing_docs)]
//! `editor-syntax-highlight` - Highlighting driver for `editor-syntax` definitions.
//!
//! [`highlight_line`] tokenizes one line given the [`State`] the previous
//! line ended in. [`highlight_document`] runs it over a whole text and turns
//! the result into char-offset [`Interval`]s and [`FoldRegion`]s, and
//! [`DocumentHighlighter`] keeps per-line results so edits only re-highlight
//! the lines they affect.

mod document;
mod error;
mod incremental;
mod intervals;
mod line;
mod state;

pub use document::{HighlightResult, highlight_document, split_lines};
pub use error::HighlightError;
pub use incremental::DocumentHighlighter;
pub use intervals::{FoldRegion, Interval, format_at};
pub use line::{FoldingMarker, LineHighlight, Span, highlight_line};
pub use state::{Frame, State};
