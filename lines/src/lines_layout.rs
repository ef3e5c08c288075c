//! Queries over a [`LinesCache`] snapshot.
//!
//! [`LinesCacheLinesLayout`] answers "which visual line contains X" for X an offset, a
//! vertical position or a line index. Each lookup seeks the tree to the containing leaf
//! and then scans that leaf. The last leaf touched is cached, so runs of nearby queries
//! (as issued while painting or while mapping an edit) only scan.

use crate::{
    annotations::{GutterWidget, Interval, IntervalQuery},
    dimensions::{ByHeight, ByIndex, ByOffset, LinePosition, Metric},
    LineArray, LineBasedHeight, LinesCache,
};
use std::ops::Range;
use sum_tree::Bias;

/// A visual line, positioned in the document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    /// Start offset, inclusive.
    pub from: usize,
    /// End offset, exclusive. Includes a trailing newline.
    pub to: usize,
    /// Top of the line including its interline above.
    pub line_top: LineBasedHeight,
    pub total_height: LineBasedHeight,
    pub interline_height_above: LineBasedHeight,
    pub interline_height_below: LineBasedHeight,
    pub line_idx: usize,
    pub width: f32,
}

impl Line {
    pub fn range(&self) -> Range<usize> {
        self.from..self.to
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Top of the text row, below the interline above.
    pub fn text_top(&self) -> LineBasedHeight {
        self.line_top + self.interline_height_above
    }

    pub fn line_bottom(&self) -> LineBasedHeight {
        self.line_top + self.total_height
    }

    fn from_leaf(position: LinePosition, leaf: &LineArray, index: usize) -> Self {
        let length = leaf.length(index);
        Self {
            from: position.offset,
            to: position.offset + length,
            line_top: position.height,
            total_height: leaf.total_height(index),
            interline_height_above: leaf.interline_height_above(index),
            interline_height_below: leaf.interline_height_below(index),
            line_idx: position.index,
            width: leaf.width(index),
        }
    }
}

/// Read access to visual lines.
pub trait LinesLayout {
    /// Lines in document order, starting with the one containing `from`.
    fn lines(&self, from: usize) -> impl Iterator<Item = Line> + '_;

    /// Line containing `offset`. `offset == len` yields the last line.
    fn line_at_offset(&mut self, offset: usize) -> Option<Line>;

    fn line_at_height(&mut self, height: LineBasedHeight) -> Option<Line>;

    fn line_at_index(&mut self, index: usize) -> Option<Line>;

    fn lines_count(&self) -> usize;

    fn lines_height(&self) -> LineBasedHeight;

    fn preferred_width(&self) -> f32;
}

#[derive(Clone, Copy)]
struct CachedLeaf<'a> {
    start: LinePosition,
    end: LinePosition,
    leaf: &'a LineArray,
}

impl CachedLeaf<'_> {
    fn contains(&self, metric: Metric) -> bool {
        match metric {
            Metric::Offset(offset) => self.start.offset <= offset && offset < self.end.offset,
            Metric::Height(height) => self.start.height <= height && height < self.end.height,
            Metric::Index(index) => self.start.index <= index && index < self.end.index,
        }
    }

    /// Line containing `metric`, or the last line of the leaf.
    fn line(&self, metric: Metric) -> Line {
        let mut position = self.start;
        let last = self.leaf.len().saturating_sub(1);
        for index in 0..last {
            let mut end = position;
            end.advance(self.leaf.length(index), self.leaf.total_height(index));
            if metric.is_before(&end) {
                return Line::from_leaf(position, self.leaf, index);
            }
            position = end;
        }
        Line::from_leaf(position, self.leaf, last)
    }
}

/// [`LinesLayout`] over one [`LinesCache`] snapshot.
#[derive(Clone)]
pub struct LinesCacheLinesLayout<'a> {
    cache: &'a LinesCache,
    cached: Option<CachedLeaf<'a>>,
}

impl<'a> LinesCacheLinesLayout<'a> {
    pub fn new(cache: &'a LinesCache) -> Self {
        Self {
            cache,
            cached: None,
        }
    }

    /// Clamp `metric` into the document, or `None` when it lies outside.
    fn normalize(&self, metric: Metric) -> Option<Metric> {
        let summary = self.cache.summary();
        if summary.count == 0 {
            return None;
        }
        match metric {
            Metric::Offset(offset) if offset > summary.len => None,
            Metric::Offset(offset) if offset == summary.len => {
                Some(Metric::Index(summary.count - 1))
            }
            Metric::Height(height) if height.is_negative() || height >= summary.height => None,
            Metric::Index(index) if index >= summary.count => None,
            metric => Some(metric),
        }
    }

    fn seek(&self, metric: Metric) -> Option<CachedLeaf<'a>> {
        let cache: &'a LinesCache = self.cache;
        let mut cursor = cache.lines.cursor::<LinePosition>(());
        match metric {
            Metric::Offset(offset) => cursor.seek(&ByOffset(offset), Bias::Right),
            Metric::Height(height) => cursor.seek(&ByHeight(height), Bias::Right),
            Metric::Index(index) => cursor.seek(&ByIndex(index), Bias::Right),
        };
        let leaf = cursor.item()?;
        Some(CachedLeaf {
            start: *cursor.start(),
            end: cursor.end(),
            leaf,
        })
    }

    fn line_at(&mut self, metric: Metric) -> Option<Line> {
        let metric = self.normalize(metric)?;
        let cached = match self.cached {
            Some(cached) if cached.contains(metric) => cached,
            _ => {
                let cached = self.seek(metric)?;
                self.cached = Some(cached);
                cached
            }
        };
        Some(cached.line(metric))
    }

    fn lines_from(&self, metric: Metric) -> impl Iterator<Item = Line> + 'a {
        let start = self.normalize(metric);
        let cache: &'a LinesCache = self.cache;
        let mut cursor = cache.lines.cursor::<LinePosition>(());
        let mut position = LinePosition::default();
        let mut index = 0;

        if let Some(start) = start {
            match start {
                Metric::Offset(offset) => cursor.seek(&ByOffset(offset), Bias::Right),
                Metric::Height(height) => cursor.seek(&ByHeight(height), Bias::Right),
                Metric::Index(line) => cursor.seek(&ByIndex(line), Bias::Right),
            };
            if let Some(leaf) = cursor.item() {
                let first = CachedLeaf {
                    start: *cursor.start(),
                    end: cursor.end(),
                    leaf,
                }
                .line(start);
                position = LinePosition {
                    offset: first.from,
                    height: first.line_top,
                    index: first.line_idx,
                };
                index = first.line_idx - cursor.start().index;
            }
        } else {
            cursor.seek(&ByIndex(usize::MAX), Bias::Right);
        }

        std::iter::from_fn(move || loop {
            let leaf = cursor.item()?;
            if index < leaf.len() {
                let line = Line::from_leaf(position, leaf, index);
                position.advance(line.len(), line.total_height);
                index += 1;
                return Some(line);
            }
            cursor.next();
            index = 0;
        })
    }

    /// Lines intersecting the vertical range `heights`.
    pub fn lines_in_height_range(
        &self,
        heights: Range<LineBasedHeight>,
    ) -> impl Iterator<Item = Line> + 'a {
        let end = heights.end;
        self.lines_from(Metric::Height(heights.start.max(LineBasedHeight::ZERO)))
            .take_while(move |line| line.line_top < end)
    }

    /// Place gutter widgets on the lines visible in `viewport`.
    ///
    /// A widget is drawn on the line containing the start of its range. A
    /// `follow_on_scroll` widget whose first line scrolled above the viewport sticks to
    /// the first visible line, for as long as its range is still visible.
    pub fn gutter_widgets(
        &mut self,
        widgets: &dyn IntervalQuery<GutterWidget>,
        viewport: Range<LineBasedHeight>,
    ) -> Vec<(Line, Interval<GutterWidget>)> {
        let visible: Vec<Line> = self.lines_in_height_range(viewport).collect();
        let (Some(first), Some(last)) = (visible.first().copied(), visible.last().copied())
        else {
            return Vec::new();
        };

        let mut placed = Vec::new();
        for widget in widgets.query(first.from..last.to) {
            let Some(head) = self.line_at_offset(widget.range.start) else {
                continue;
            };
            if !widget.data.follow_on_scroll {
                if (first.line_idx..=last.line_idx).contains(&head.line_idx) {
                    placed.push((head, widget));
                }
                continue;
            }

            let tail_offset = widget.range.end.saturating_sub(1).max(widget.range.start);
            let Some(tail) = self.line_at_offset(tail_offset) else {
                continue;
            };
            let index = head.line_idx.max(first.line_idx);
            if index <= tail.line_idx && index <= last.line_idx {
                if let Some(line) = self.line_at_index(index) {
                    placed.push((line, widget));
                }
            }
        }
        placed
    }
}

impl LinesLayout for LinesCacheLinesLayout<'_> {
    fn lines(&self, from: usize) -> impl Iterator<Item = Line> + '_ {
        self.lines_from(Metric::Offset(from))
    }

    fn line_at_offset(&mut self, offset: usize) -> Option<Line> {
        self.line_at(Metric::Offset(offset))
    }

    fn line_at_height(&mut self, height: LineBasedHeight) -> Option<Line> {
        self.line_at(Metric::Height(height))
    }

    fn line_at_index(&mut self, index: usize) -> Option<Line> {
        self.line_at(Metric::Index(index))
    }

    fn lines_count(&self) -> usize {
        self.cache.lines_count()
    }

    fn lines_height(&self) -> LineBasedHeight {
        self.cache.lines_height()
    }

    fn preferred_width(&self) -> f32 {
        self.cache.preferred_width()
    }
}
