//! Folds, inlays, interlines and gutter widgets.
//!
//! Annotations are owned by the editor and handed to the layout engine per call through
//! [`Annotations`], as [`IntervalQuery`] capabilities. None of them contribute text; they
//! only change how the text is measured:
//!
//! - **Folds** hide a character range behind a placeholder of measured width. A fold is
//!   atomic: the wrapper never breaks inside it.
//! - **Inlays** add width at an offset.
//! - **Interlines** add height above or below the visual line that owns their offset.
//! - **Gutter widgets** are placed on a visual line, see
//!   [`LinesCacheLinesLayout::gutter_widgets`](crate::LinesCacheLinesLayout::gutter_widgets).
//!
//! # Fold cover
//!
//! An annotation sitting exactly on a fold boundary is hidden when the side it binds to
//! is folded away. With a fold over `[from, to)`:
//!
//! ```text
//! Bias::Left  (Inlay Before, Interline Above)  hidden when from <  offset <= to
//! Bias::Right (Inlay After,  Interline Below)  hidden when from <= offset <  to
//! ```
//!
//! # Storage
//!
//! [`Intervals`] is the default persistent store: a [`SumTree`] ordered by start offset
//! whose summary tracks the maximum end, so a query skips every subtree that ends before
//! the queried range.

use crate::{LayoutError, LineBasedHeight};
use std::{cmp::Ordering, ops::Range};
use sum_tree::{Bias, Item, SumTree};

/// Annotation payload positioned over a character range.
#[derive(Clone, Debug, PartialEq)]
pub struct Interval<T> {
    pub range: Range<usize>,
    pub data: T,
}

impl<T> Interval<T> {
    pub fn new(range: Range<usize>, data: T) -> Self {
        Self { range, data }
    }

    /// Collapsed interval at `offset`.
    pub fn at(offset: usize, data: T) -> Self {
        Self::new(offset..offset, data)
    }

    pub fn offset(&self) -> usize {
        self.range.start
    }
}

/// Read access to an annotation store.
pub trait IntervalQuery<T> {
    /// Intervals touching `range`, i.e. `start <= range.end && end >= range.start`,
    /// ordered by start offset. Collapsed intervals on either boundary are included.
    fn query(&self, range: Range<usize>) -> Vec<Interval<T>>;
}

impl<T: Clone> IntervalQuery<T> for [Interval<T>] {
    fn query(&self, range: Range<usize>) -> Vec<Interval<T>> {
        let mut result: Vec<_> = self
            .iter()
            .filter(|interval| touches(&interval.range, &range))
            .cloned()
            .collect();
        result.sort_by_key(|interval| interval.range.start);
        result
    }
}

impl<T: Clone> IntervalQuery<T> for Vec<Interval<T>> {
    fn query(&self, range: Range<usize>) -> Vec<Interval<T>> {
        self.as_slice().query(range)
    }
}

/// Store with no annotations.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIntervals;

impl<T> IntervalQuery<T> for NoIntervals {
    fn query(&self, _range: Range<usize>) -> Vec<Interval<T>> {
        Vec::new()
    }
}

fn touches(interval: &Range<usize>, range: &Range<usize>) -> bool {
    interval.start <= range.end && interval.end >= range.start
}

#[derive(Clone, Debug)]
struct IntervalItem<T> {
    interval: Interval<T>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct IntervalSummary {
    max_start: usize,
    max_end: usize,
    count: usize,
}

impl sum_tree::ContextLessSummary for IntervalSummary {
    fn zero() -> Self {
        Self::default()
    }

    fn add_summary(&mut self, other: &Self) {
        if other.count > 0 {
            self.max_start = self.max_start.max(other.max_start);
            self.max_end = self.max_end.max(other.max_end);
            self.count += other.count;
        }
    }
}

impl<T: Clone> Item for IntervalItem<T> {
    type Summary = IntervalSummary;

    fn summary(&self, _cx: ()) -> Self::Summary {
        IntervalSummary {
            max_start: self.interval.range.start,
            max_end: self.interval.range.end,
            count: 1,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq)]
struct MaxStart(usize);

impl<'a> sum_tree::Dimension<'a, IntervalSummary> for MaxStart {
    fn zero(_cx: ()) -> Self {
        Default::default()
    }

    fn add_summary(&mut self, summary: &'a IntervalSummary, _: ()) {
        self.0 = self.0.max(summary.max_start);
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq)]
struct MaxEnd(usize);

impl<'a> sum_tree::Dimension<'a, IntervalSummary> for MaxEnd {
    fn zero(_cx: ()) -> Self {
        Default::default()
    }

    fn add_summary(&mut self, summary: &'a IntervalSummary, _: ()) {
        self.0 = self.0.max(summary.max_end);
    }
}

/// Persistent interval store ordered by start offset.
///
/// Cheap to clone; every clone is an independent snapshot.
#[derive(Clone)]
pub struct Intervals<T: Clone> {
    tree: SumTree<IntervalItem<T>>,
}

impl<T: Clone> Default for Intervals<T> {
    fn default() -> Self {
        Self {
            tree: SumTree::new(()),
        }
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Intervals<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Clone> Intervals<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_intervals(intervals: impl IntoIterator<Item = Interval<T>>) -> Self {
        let mut intervals: Vec<_> = intervals.into_iter().collect();
        intervals.sort_by_key(|interval| interval.range.start);
        Self {
            tree: SumTree::from_iter(
                intervals
                    .into_iter()
                    .map(|interval| IntervalItem { interval }),
                (),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.summary().count
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval<T>> + '_ {
        self.tree.iter().map(|item| &item.interval)
    }

    /// Insert after every interval with the same start.
    pub fn insert(&mut self, range: Range<usize>, data: T) {
        let tree = {
            let mut cursor = self.tree.cursor::<MaxStart>(());
            let mut tree = cursor.slice(&MaxStart(range.start), Bias::Right);
            tree.push(
                IntervalItem {
                    interval: Interval::new(range, data),
                },
                (),
            );
            tree.append(cursor.suffix(), ());
            tree
        };
        self.tree = tree;
    }

    /// Keep only intervals matching `predicate`.
    pub fn retain(&mut self, mut predicate: impl FnMut(&Interval<T>) -> bool) {
        self.tree = SumTree::from_iter(
            self.tree
                .iter()
                .filter(|item| predicate(&item.interval))
                .cloned(),
            (),
        );
    }
}

impl<T: Clone> IntervalQuery<T> for Intervals<T> {
    fn query(&self, range: Range<usize>) -> Vec<Interval<T>> {
        let mut cursor = self.tree.cursor::<MaxEnd>(());
        cursor.seek(&MaxEnd(range.start), Bias::Left);

        let mut result = Vec::new();
        while let Some(item) = cursor.item() {
            if item.interval.range.start > range.end {
                break;
            }
            if item.interval.range.end >= range.start {
                result.push(item.interval.clone());
            }
            cursor.next();
        }
        result
    }
}

/// Collapsed region rendered as a placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fold {
    pub placeholder: String,
}

impl Fold {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }
}

impl Default for Fold {
    fn default() -> Self {
        Self::new("...")
    }
}

/// Side of its offset an inlay attaches to. At equal offsets `Before < After`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InlayBinding {
    /// Attached to the text before the offset.
    Before,
    /// Attached to the text after the offset.
    After,
}

impl InlayBinding {
    pub fn bias(self) -> Bias {
        match self {
            InlayBinding::Before => Bias::Left,
            InlayBinding::After => Bias::Right,
        }
    }
}

/// Inline hint adding width at an offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inlay {
    pub binding: InlayBinding,
    pub text: String,
}

impl Inlay {
    pub fn new(binding: InlayBinding, text: impl Into<String>) -> Self {
        Self {
            binding,
            text: text.into(),
        }
    }
}

/// Side of its visual line an interline is drawn on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterlineBinding {
    Above,
    Below,
}

impl InterlineBinding {
    pub fn bias(self) -> Bias {
        match self {
            InterlineBinding::Above => Bias::Left,
            InterlineBinding::Below => Bias::Right,
        }
    }
}

/// Block decoration adding height to the line owning its offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interline {
    pub binding: InterlineBinding,
    pub height: LineBasedHeight,
}

impl Interline {
    pub fn above(height: LineBasedHeight) -> Self {
        Self {
            binding: InterlineBinding::Above,
            height,
        }
    }

    pub fn below(height: LineBasedHeight) -> Self {
        Self {
            binding: InterlineBinding::Below,
            height,
        }
    }
}

/// Widget drawn in the gutter next to a range of text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GutterWidget {
    pub id: usize,
    /// Stick to the top of the viewport while any line of the range is visible.
    pub follow_on_scroll: bool,
}

/// Fold with its range clipped to the laid out fragment and its width measured.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedFold {
    pub range: Range<usize>,
    pub width: f32,
}

/// Visible inlay with its width measured.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedInlay {
    pub offset: usize,
    pub binding: InlayBinding,
    pub width: f32,
}

/// Annotation stores and measurers for one layout call.
pub struct Annotations<'a> {
    pub folds: &'a dyn IntervalQuery<Fold>,
    pub fold_measurer: &'a dyn Fn(&Interval<Fold>) -> f32,
    pub inlays: &'a dyn IntervalQuery<Inlay>,
    pub inlay_measurer: &'a dyn Fn(&Interval<Inlay>) -> f32,
    pub interlines: &'a dyn IntervalQuery<Interline>,
}

static NO_INTERVALS: NoIntervals = NoIntervals;
static NO_FOLD_WIDTH: fn(&Interval<Fold>) -> f32 = |_| 0.0;
static NO_INLAY_WIDTH: fn(&Interval<Inlay>) -> f32 = |_| 0.0;

impl Annotations<'static> {
    /// No folds, inlays or interlines.
    pub fn empty() -> Self {
        Self {
            folds: &NO_INTERVALS,
            fold_measurer: &NO_FOLD_WIDTH,
            inlays: &NO_INTERVALS,
            inlay_measurer: &NO_INLAY_WIDTH,
            interlines: &NO_INTERVALS,
        }
    }
}

/// Whether an annotation at `offset` binding to `side` is hidden by a fold.
pub fn is_fold_covered(folds: &[ResolvedFold], offset: usize, side: Bias) -> bool {
    folds.iter().any(|fold| match side {
        Bias::Left => fold.range.start < offset && offset <= fold.range.end,
        Bias::Right => fold.range.start <= offset && offset < fold.range.end,
    })
}

fn in_line(range: &Range<usize>, offset: usize, is_last: bool) -> bool {
    range.start <= offset && (offset < range.end || (is_last && offset == range.end))
}

fn interline_height(
    interlines: &[Interval<Interline>],
    folds: &[ResolvedFold],
    range: &Range<usize>,
    is_last: bool,
    binding: InterlineBinding,
) -> Result<LineBasedHeight, LayoutError> {
    let mut height = LineBasedHeight::ZERO;
    for interline in interlines {
        let offset = interline.offset();
        if interline.data.binding != binding
            || !in_line(range, offset, is_last)
            || is_fold_covered(folds, offset, binding.bias())
        {
            continue;
        }
        if interline.data.height.is_negative() {
            return Err(LayoutError::NegativeInterlineHeight {
                offset,
                height: interline.data.height,
            });
        }
        height += interline.data.height;
    }
    Ok(height)
}

/// Accumulated height of the interlines drawn above the visual line `range`.
///
/// `is_last` extends the line to include its end offset, for the last line of the
/// document.
pub fn interlines_above_line(
    interlines: &[Interval<Interline>],
    folds: &[ResolvedFold],
    range: Range<usize>,
    is_last: bool,
) -> Result<LineBasedHeight, LayoutError> {
    interline_height(interlines, folds, &range, is_last, InterlineBinding::Above)
}

/// Accumulated height of the interlines drawn below the visual line `range`.
pub fn interlines_below_line(
    interlines: &[Interval<Interline>],
    folds: &[ResolvedFold],
    range: Range<usize>,
    is_last: bool,
) -> Result<LineBasedHeight, LayoutError> {
    interline_height(interlines, folds, &range, is_last, InterlineBinding::Below)
}

/// Visible inlays of the line `range`, ordered by offset and then `Before < After`.
pub fn line_inlays(
    inlays: &[Interval<Inlay>],
    folds: &[ResolvedFold],
    range: Range<usize>,
    is_last: bool,
    measure: &dyn Fn(&Interval<Inlay>) -> f32,
) -> Vec<ResolvedInlay> {
    let mut visible: Vec<ResolvedInlay> = inlays
        .iter()
        .filter(|inlay| {
            in_line(&range, inlay.offset(), is_last)
                && !is_fold_covered(folds, inlay.offset(), inlay.data.binding.bias())
        })
        .map(|inlay| ResolvedInlay {
            offset: inlay.offset(),
            binding: inlay.data.binding,
            width: measure(inlay),
        })
        .collect();
    visible.sort_by(|a, b| match a.offset.cmp(&b.offset) {
        Ordering::Equal => a.binding.cmp(&b.binding),
        ordering => ordering,
    });
    visible
}

/// Folds touching `range`, clipped to it and measured.
///
/// A fold clipped down to nothing is dropped unless `range` itself is empty.
pub fn resolve_folds(annotations: &Annotations<'_>, range: Range<usize>) -> Vec<ResolvedFold> {
    annotations
        .folds
        .query(range.clone())
        .into_iter()
        .filter_map(|fold| {
            let clipped = fold.range.start.max(range.start)..fold.range.end.min(range.end);
            if clipped.start > clipped.end || (clipped.is_empty() && !range.is_empty()) {
                return None;
            }
            Some(ResolvedFold {
                width: (annotations.fold_measurer)(&fold),
                range: clipped,
            })
        })
        .collect()
}
