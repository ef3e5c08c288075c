//! Immutable snapshot of the document's visual lines.
//!
//! [`LinesCache`] owns a [`SumTree`] of [`LineArray`] leaves plus the
//! [`SoftWrapBuilder`] that produced them. Every update returns a new snapshot that
//! shares every untouched subtree with the old one, so snapshots are cheap to keep
//! around and safe to read from other threads.

use crate::{
    annotations::Annotations,
    dimensions::LineIndex,
    layout::{hard_line, layout_lines, NeverCancelled},
    line_array::{MAX_LINES, MIN_LINES},
    LayoutError, LineArray, LineBasedHeight, LineData, LinesCacheLinesLayout, LinesSummary,
    LinesTreeExt, OffsetWidth, SoftWrapBuilder,
};
use ropey::Rope;
use std::{fmt, ops::Range, sync::Arc};
use sum_tree::{Bias, SumTree};

#[derive(Clone)]
pub struct LinesCache {
    pub(crate) lines: SumTree<LineArray>,
    builder: Arc<dyn SoftWrapBuilder>,
}

impl fmt::Debug for LinesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinesCache")
            .field("summary", self.summary())
            .field("leaves", &self.lines.iter().count())
            .finish()
    }
}

impl LinesCache {
    pub fn from_lines(
        lines: impl IntoIterator<Item = LineData>,
        builder: Arc<dyn SoftWrapBuilder>,
    ) -> Self {
        let mut tree = SumTree::new(());
        tree.push_lines(lines);
        Self {
            lines: tree,
            builder,
        }
    }

    pub fn builder(&self) -> &Arc<dyn SoftWrapBuilder> {
        &self.builder
    }

    pub fn summary(&self) -> &LinesSummary {
        self.lines.summary()
    }

    /// Number of characters covered by the lines.
    pub fn text_len(&self) -> usize {
        self.summary().len
    }

    pub fn lines_count(&self) -> usize {
        self.summary().count
    }

    pub fn lines_height(&self) -> LineBasedHeight {
        self.summary().height
    }

    /// Width of the widest line.
    pub fn preferred_width(&self) -> f32 {
        self.summary().width
    }

    /// Query handle over this snapshot.
    pub fn lines_layout(&self) -> LinesCacheLinesLayout<'_> {
        LinesCacheLinesLayout::new(self)
    }

    /// Every line, in document order.
    pub fn line_data(&self) -> Vec<LineData> {
        self.lines.iter().flat_map(|leaf| leaf.iter()).collect()
    }

    /// New snapshot with the lines at indices `[from, to)` replaced by `new_lines`.
    ///
    /// Leaves before the leaf containing `from` and after the leaf containing `to` are
    /// shared with `self`; only the leaves in between are rebuilt.
    pub fn replace_lines(&self, from: usize, to: usize, new_lines: &[LineData]) -> Self {
        debug_assert!(from <= to && to <= self.lines_count());

        let mut cursor = self.lines.cursor::<LineIndex>(());
        let mut tree = cursor.slice(&LineIndex(from), Bias::Right);

        let mut middle: Vec<LineData> = Vec::with_capacity(new_lines.len() + MAX_LINES);
        if let Some(leaf) = cursor.item() {
            let head = from - cursor.start().0;
            middle.extend((0..head).map(|index| leaf.get(index)));
        }
        middle.extend_from_slice(new_lines);

        cursor.seek_forward(&LineIndex(to), Bias::Right);
        if let Some(leaf) = cursor.item() {
            let tail = to - cursor.start().0;
            let underfull =
                middle.len() % MAX_LINES != 0 && middle.len() % MAX_LINES < MIN_LINES;
            if tail > 0 || underfull {
                middle.extend((tail..leaf.len()).map(|index| leaf.get(index)));
                cursor.next();
            }
        }

        tracing::trace!(
            from,
            to,
            inserted = new_lines.len(),
            repacked = middle.len(),
            "replace lines"
        );

        tree.push_lines(middle);
        tree.append(cursor.suffix(), ());
        Self {
            lines: tree,
            builder: self.builder.clone(),
        }
    }

    /// Offset in the single visual line `range` closest to `target_width`.
    pub fn offset_of_width(
        &self,
        text: &Rope,
        range: Range<usize>,
        target_width: f32,
        annotations: &Annotations<'_>,
    ) -> OffsetWidth {
        let line = hard_line(text, range, annotations);
        self.builder.offset_of_width(&line, target_width)
    }

    /// Check structural invariants against a document of `text_len` characters.
    ///
    /// Panics on a violation. Compiled to a no-op without debug assertions.
    #[cfg(debug_assertions)]
    pub fn check_invariants(&self, text_len: usize) {
        let lines = self.line_data();
        assert!(!lines.is_empty(), "layout has no lines");
        assert_eq!(self.text_len(), text_len, "layout length disagrees with document");
        for (index, line) in lines.iter().enumerate() {
            assert!(
                line.length > 0 || index + 1 == lines.len(),
                "empty line {index} is not the last line"
            );
            assert!(!line.interline_height_above.is_negative());
            assert!(!line.interline_height_below.is_negative());
        }
        for leaf in self.lines.iter() {
            assert!(!leaf.is_empty() && leaf.len() <= MAX_LINES);
        }
    }

    #[cfg(not(debug_assertions))]
    pub fn check_invariants(&self, _text_len: usize) {}

    /// Rebuild the snapshot from scratch with `builder`, e.g. after the box width or
    /// the font changed.
    pub fn relayout(
        &self,
        text: &Rope,
        annotations: &Annotations<'_>,
        builder: Arc<dyn SoftWrapBuilder>,
    ) -> Result<Self, LayoutError> {
        layout_lines(text, annotations, builder, &NeverCancelled)
    }
}
