//! Visual line layout for Stoat.
//!
//! This crate turns document text into the list of visual lines an editor paints, and
//! keeps that list up to date as the text and its annotations change:
//!
//! - **Soft wrap**: hard lines longer than the box are broken at word boundaries
//! - **Folds**: hidden ranges collapse into a placeholder and join the lines they span
//! - **Inlays**: inline hints widen the line they sit on
//! - **Interlines**: block decorations add height above or below a line
//!
//! # Architecture
//!
//! ```text
//! Rope + Annotations
//!   | layout_lines / build_lines      (segment into hard lines)
//! HardLine
//!   | SoftWrapBuilder                 (wrap into visual lines)
//! LineData
//!   | LinesTreeExt::push_lines        (pack 64 per leaf)
//! LinesCache = SumTree<LineArray>
//!   | LinesCacheLinesLayout           (seek by offset, height or index)
//! Line
//! ```
//!
//! Every [`LinesCache`] is an immutable snapshot. [`LinesCache::edit`] maps an
//! [`Operation`] to the hard lines it touches, lays out only those again and splices
//! them into a new snapshot that shares every other leaf with the old one.
//!
//! Offsets are character offsets, heights are [`LineBasedHeight`] (hundredths of a text
//! row) and widths are pixels.
//!
//! # Usage
//!
//! ```ignore
//! let builder = Arc::new(FixedWidthSoftWrapBuilder::new(config));
//! let cache = layout_lines(&text, &Annotations::empty(), builder, &NeverCancelled)?;
//!
//! let new_text = operation.apply(&text)?;
//! let cache = cache.edit(&text, &new_text, &operation, &annotations)?;
//!
//! let mut layout = cache.lines_layout();
//! let line = layout.line_at_height(scroll_top);
//! ```

mod annotations;
mod config;
mod dimensions;
mod edit;
mod error;
mod height;
mod layout;
mod line_array;
mod lines_cache;
mod lines_layout;
mod soft_wrap;

pub use annotations::{
    interlines_above_line, interlines_below_line, is_fold_covered, line_inlays,
    resolve_folds, Annotations, Fold, GutterWidget, Inlay, InlayBinding, Interline,
    InterlineBinding, Interval, IntervalQuery, Intervals, NoIntervals, ResolvedFold,
    ResolvedInlay,
};
pub use config::LayoutConfig;
pub use dimensions::{ByHeight, ByIndex, ByOffset, LineIndex, LinePosition, Metric, TextOffset};
pub use edit::{EditRange, Op, Operation};
pub use error::LayoutError;
pub use height::LineBasedHeight;
pub use layout::{build_lines, layout_lines, Cancellation, NeverCancelled};
pub use line_array::{LineArray, LineData, LinesSummary, LinesTreeExt, MAX_LINES, MIN_LINES};
pub use lines_cache::LinesCache;
pub use lines_layout::{Line, LinesCacheLinesLayout, LinesLayout};
pub use soft_wrap::{
    char_geom_length, FixedWidthSoftWrapBuilder, HardLine, OffsetWidth, SoftWrapBuilder,
};
pub use sum_tree::Bias;
