//! Dimension types for seeking through the lines tree.
//!
//! Each metric of [`LinesSummary`] gets a dimension so a [`sum_tree::Cursor`] can seek
//! by it:
//!
//! - [`TextOffset`]: characters before the cursor (length metric)
//! - [`LineIndex`]: visual lines before the cursor (count metric)
//! - [`LinePosition`]: all three running sums at once, used by the query engine
//!
//! [`LinePosition`] is positioned with the seek targets [`ByOffset`], [`ByHeight`] and
//! [`ByIndex`], which pick which running sum the cursor compares against. That is how
//! one cursor type answers offset, height and index lookups uniformly.
//!
//! ```ignore
//! let mut cursor = tree.cursor::<LinePosition>(());
//! cursor.seek(&ByHeight(y), Bias::Right);
//! let leaf_top = cursor.start().height;
//! ```

use crate::{LineBasedHeight, LinesSummary};
use std::{
    cmp::Ordering,
    ops::{Add, AddAssign, Sub, SubAssign},
};
use sum_tree::SeekTarget;

/// Character offset into the document.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq, Hash)]
pub struct TextOffset(pub usize);

impl Add for TextOffset {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TextOffset {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for TextOffset {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for TextOffset {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl<'a> sum_tree::Dimension<'a, LinesSummary> for TextOffset {
    fn zero(_cx: ()) -> Self {
        Default::default()
    }

    fn add_summary(&mut self, summary: &'a LinesSummary, _: ()) {
        self.0 += summary.len;
    }
}

/// Index of a visual line.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq, Hash)]
pub struct LineIndex(pub usize);

impl Add for LineIndex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for LineIndex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl<'a> sum_tree::Dimension<'a, LinesSummary> for LineIndex {
    fn zero(_cx: ()) -> Self {
        Default::default()
    }

    fn add_summary(&mut self, summary: &'a LinesSummary, _: ()) {
        self.0 += summary.count;
    }
}

/// Running offset, height and line index at a point in the tree.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct LinePosition {
    pub offset: usize,
    pub height: LineBasedHeight,
    pub index: usize,
}

impl LinePosition {
    /// Position just past `line`'s contribution.
    pub(crate) fn advance(&mut self, length: usize, height: LineBasedHeight) {
        self.offset += length;
        self.height += height;
        self.index += 1;
    }
}

impl<'a> sum_tree::Dimension<'a, LinesSummary> for LinePosition {
    fn zero(_cx: ()) -> Self {
        Default::default()
    }

    fn add_summary(&mut self, summary: &'a LinesSummary, _: ()) {
        self.offset += summary.len;
        self.height += summary.height;
        self.index += summary.count;
    }
}

/// Seek a [`LinePosition`] cursor by character offset.
#[derive(Copy, Clone, Debug)]
pub struct ByOffset(pub usize);

/// Seek a [`LinePosition`] cursor by vertical position.
#[derive(Copy, Clone, Debug)]
pub struct ByHeight(pub LineBasedHeight);

/// Seek a [`LinePosition`] cursor by visual line index.
#[derive(Copy, Clone, Debug)]
pub struct ByIndex(pub usize);

impl<'a> SeekTarget<'a, LinesSummary, LinePosition> for ByOffset {
    fn cmp(&self, cursor_location: &LinePosition, _: ()) -> Ordering {
        self.0.cmp(&cursor_location.offset)
    }
}

impl<'a> SeekTarget<'a, LinesSummary, LinePosition> for ByHeight {
    fn cmp(&self, cursor_location: &LinePosition, _: ()) -> Ordering {
        self.0.cmp(&cursor_location.height)
    }
}

impl<'a> SeekTarget<'a, LinesSummary, LinePosition> for ByIndex {
    fn cmp(&self, cursor_location: &LinePosition, _: ()) -> Ordering {
        self.0.cmp(&cursor_location.index)
    }
}

/// Line metric a lookup is expressed in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Metric {
    Offset(usize),
    Height(LineBasedHeight),
    Index(usize),
}

impl Metric {
    /// Whether the line ending at `end` (exclusive) already passes this value.
    pub(crate) fn is_before(&self, end: &LinePosition) -> bool {
        match *self {
            Metric::Offset(offset) => offset < end.offset,
            Metric::Height(height) => height < end.height,
            Metric::Index(index) => index < end.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LineArray, LineData, LinesTreeExt};
    use sum_tree::{Bias, SumTree};

    fn tree(lengths: &[usize]) -> SumTree<LineArray> {
        let mut tree = SumTree::new(());
        tree.push_lines(lengths.iter().map(|len| LineData::plain(*len, *len as f32)));
        tree
    }

    #[test]
    fn offsets_support_arithmetic() {
        let mut offset = TextOffset(10);
        offset += TextOffset(5);
        assert_eq!(offset, TextOffset(15));
        offset -= TextOffset(3);
        assert_eq!(offset - TextOffset(2), TextOffset(10));
        assert_eq!(LineIndex(3) + LineIndex(4), LineIndex(7));
    }

    #[test]
    fn seek_by_each_metric_lands_in_containing_leaf() {
        let lengths: Vec<usize> = (0..200).map(|_| 3).collect();
        let tree = tree(&lengths);

        let mut cursor = tree.cursor::<LinePosition>(());
        cursor.seek(&ByIndex(130), Bias::Right);
        assert_eq!(cursor.start().index, 128);
        assert_eq!(cursor.start().offset, 128 * 3);

        cursor.seek(&ByOffset(3 * 64), Bias::Right);
        assert_eq!(cursor.start().index, 64);

        cursor.seek(&ByHeight(LineBasedHeight::new(100 * 70)), Bias::Right);
        assert_eq!(cursor.start().index, 64);
        assert_eq!(cursor.start().height.ratio(), 100 * 64);
    }

    #[test]
    fn text_offset_and_line_index_dimensions() {
        let tree = tree(&[2, 2, 2]);
        let mut cursor = tree.cursor::<TextOffset>(());
        cursor.seek(&TextOffset(6), Bias::Left);
        assert_eq!(cursor.start().0, 0);
        assert_eq!(cursor.end().0, 6);

        let mut cursor = tree.cursor::<LineIndex>(());
        cursor.seek(&LineIndex(3), Bias::Right);
        assert!(cursor.item().is_none());
    }
}
