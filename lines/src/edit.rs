//! Incremental updates of a [`LinesCache`].
//!
//! An edit is described by an [`Operation`]: a sequence of retains and replacements that
//! spans the whole document before the edit. Each replacement is widened to the hard
//! lines it touches, expressed as an [`EditRange`] over the old visual lines, and only
//! those lines are laid out again:
//!
//! ```text
//! before  | a\n | bc d\n | ef\n |      replace "c" with "xyz"
//!               ^^^^^^^^           visual lines [1, 2), text [2, 7)
//! after   | a\n | bxyz d\n | ef\n |   relaid text [2, 9)
//! ```
//!
//! Widening to whole hard lines keeps word wrapping and fold joins correct, since a
//! replacement can move every break of its hard line but none outside of it.

use crate::{
    annotations::{
        interlines_above_line, interlines_below_line, is_fold_covered, resolve_folds, Annotations,
    },
    layout::{build_lines, NeverCancelled},
    LayoutError, LineData, LinesCache, LinesCacheLinesLayout, LinesLayout,
};
use ropey::Rope;
use std::ops::Range;
use sum_tree::Bias;

/// One step of an [`Operation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Keep this many characters.
    Retain(usize),
    /// Replace `deleted` with `inserted`.
    Replace { deleted: String, inserted: String },
}

/// Text change spanning the whole document it applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Operation {
    pub ops: Vec<Op>,
}

impl Operation {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// Single replacement of `range` in `text` with `inserted`.
    pub fn replace(text: &Rope, range: Range<usize>, inserted: impl Into<String>) -> Self {
        let len = text.len_chars();
        let mut ops = Vec::with_capacity(3);
        if range.start > 0 {
            ops.push(Op::Retain(range.start));
        }
        ops.push(Op::Replace {
            deleted: text.slice(range.clone()).to_string(),
            inserted: inserted.into(),
        });
        if range.end < len {
            ops.push(Op::Retain(len - range.end));
        }
        Self { ops }
    }

    /// Whether applying the operation leaves the text unchanged.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| match op {
            Op::Retain(_) => true,
            Op::Replace { deleted, inserted } => deleted == inserted,
        })
    }

    /// Length of the text the operation applies to.
    pub fn len_before(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Retain(len) => *len,
                Op::Replace { deleted, .. } => deleted.chars().count(),
            })
            .sum()
    }

    /// Length of the text the operation produces.
    pub fn len_after(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Retain(len) => *len,
                Op::Replace { inserted, .. } => inserted.chars().count(),
            })
            .sum()
    }

    /// Apply to `text`.
    pub fn apply(&self, text: &Rope) -> Result<Rope, LayoutError> {
        self.check_len(text)?;
        let mut result = text.clone();
        let mut offset = 0;
        for op in &self.ops {
            match op {
                Op::Retain(len) => offset += len,
                Op::Replace { deleted, inserted } => {
                    result.remove(offset..offset + deleted.chars().count());
                    result.insert(offset, inserted);
                    offset += inserted.chars().count();
                }
            }
        }
        Ok(result)
    }

    fn check_len(&self, text: &Rope) -> Result<(), LayoutError> {
        let actual = self.len_before();
        let expected = text.len_chars();
        if actual != expected {
            return Err(LayoutError::OperationLength { expected, actual });
        }
        Ok(())
    }

    /// Replacements that change the text, in old offsets.
    fn replacements(&self) -> Vec<Replacement> {
        let mut replacements = Vec::new();
        let mut offset = 0;
        let mut delta: isize = 0;
        for op in &self.ops {
            match op {
                Op::Retain(len) => offset += len,
                Op::Replace { deleted, inserted } => {
                    let deleted_len = deleted.chars().count();
                    if deleted != inserted {
                        delta += inserted.chars().count() as isize - deleted_len as isize;
                        replacements.push(Replacement {
                            range: offset..offset + deleted_len,
                            delta,
                        });
                    }
                    offset += deleted_len;
                }
            }
        }
        replacements
    }
}

/// Replaced old range, with the length change of every replacement up to and including
/// this one.
struct Replacement {
    range: Range<usize>,
    delta: isize,
}

/// New offset of the old `offset`, or `None` when the character there was replaced.
fn map_offset(replacements: &[Replacement], offset: usize) -> Option<usize> {
    let ix = replacements.partition_point(|replacement| replacement.range.end <= offset);
    if replacements
        .get(ix)
        .is_some_and(|replacement| replacement.range.start <= offset)
    {
        return None;
    }
    let delta = ix
        .checked_sub(1)
        .map_or(0, |prev| replacements[prev].delta);
    Some(offset.saturating_add_signed(delta))
}

/// Whether the newline at `offset` is hidden by a fold.
fn is_folded_newline(annotations: &Annotations<'_>, offset: usize) -> bool {
    let folds = resolve_folds(annotations, offset..offset + 1);
    is_fold_covered(&folds, offset, Bias::Right)
}

/// Stretch of old visual lines to rebuild, with the text it covers before and after the
/// edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditRange {
    /// Old visual line indices.
    pub lines: Range<usize>,
    /// Offsets in the text before the edit.
    pub before: Range<usize>,
    /// Offsets in the text after the edit.
    pub after: Range<usize>,
}

fn push_range(ranges: &mut Vec<EditRange>, range: EditRange) {
    match ranges.last_mut() {
        Some(last) if range.before.start <= last.before.end => {
            let delta = range.after.end as isize - range.before.end as isize;
            last.lines.end = last.lines.end.max(range.lines.end);
            last.before.end = last.before.end.max(range.before.end);
            last.after.end = last.before.end.saturating_add_signed(delta);
        }
        _ => ranges.push(range),
    }
}

fn out_of_sync(cache: &LinesCache, text: &Rope) -> LayoutError {
    LayoutError::LengthMismatch {
        expected: text.len_chars(),
        actual: cache.text_len(),
    }
}

/// First visual line of the layout line containing `offset`: `(line index, start
/// offset)`. `is_break(n)` tells whether the character at `n` ends a layout line.
fn hard_line_start(
    layout: &mut LinesCacheLinesLayout<'_>,
    text: &Rope,
    offset: usize,
    is_break: &dyn Fn(usize) -> bool,
) -> Option<(usize, usize)> {
    let start = text.line_to_char(text.char_to_line(offset));
    let mut line = layout.line_at_offset(start)?;
    while line.from > 0 && !is_break(line.from - 1) {
        line = layout.line_at_index(line.line_idx.checked_sub(1)?)?;
    }
    Some((line.line_idx, line.from))
}

/// End of the layout line containing `offset`: `(exclusive line index, end offset)`.
fn hard_line_end(
    layout: &mut LinesCacheLinesLayout<'_>,
    offset: usize,
    is_break: &dyn Fn(usize) -> bool,
) -> Option<(usize, usize)> {
    let count = layout.lines_count();
    let mut line = layout.line_at_offset(offset)?;
    while line.line_idx + 1 < count && !(line.to > line.from && is_break(line.to - 1)) {
        line = layout.line_at_index(line.line_idx + 1)?;
    }
    Some((line.line_idx + 1, line.to))
}

impl LinesCache {
    /// Map `operation`, applied to `before`, to the visual lines it invalidates.
    ///
    /// `annotations` are those of the edited text; a newline hidden by one of their folds
    /// does not end a layout line. Replacements whose deleted and inserted text are equal
    /// are skipped. Overlapping or adjacent ranges are coalesced.
    pub fn operation_to_ranges(
        &self,
        before: &Rope,
        operation: &Operation,
        annotations: &Annotations<'_>,
    ) -> Result<Vec<EditRange>, LayoutError> {
        operation.check_len(before)?;
        if self.text_len() != before.len_chars() {
            return Err(out_of_sync(self, before));
        }

        let replacements = operation.replacements();
        // Replaced characters never end a layout line; the range they belong to is
        // widened on its own.
        let is_break = |offset: usize| {
            before.char(offset) == '\n'
                && map_offset(&replacements, offset)
                    .is_some_and(|offset| !is_folded_newline(annotations, offset))
        };

        let mut layout = self.lines_layout();
        let mut ranges: Vec<EditRange> = Vec::new();
        let mut delta: isize = 0;

        for replacement in &replacements {
            let (first_line, start) =
                hard_line_start(&mut layout, before, replacement.range.start, &is_break)
                    .ok_or_else(|| out_of_sync(self, before))?;
            let (end_line, end) = hard_line_end(&mut layout, replacement.range.end, &is_break)
                .ok_or_else(|| out_of_sync(self, before))?;

            let new_start = start.saturating_add_signed(delta);
            delta = replacement.delta;
            let new_end = end.saturating_add_signed(delta);

            push_range(
                &mut ranges,
                EditRange {
                    lines: first_line..end_line,
                    before: start..end,
                    after: new_start..new_end,
                },
            );
        }
        Ok(ranges)
    }

    /// Lay out every range again in `after` and splice the result in.
    ///
    /// `ranges` must be ordered and disjoint, as produced by
    /// [`operation_to_ranges`](Self::operation_to_ranges).
    pub fn rebuild_lines(
        &self,
        after: &Rope,
        ranges: &[EditRange],
        annotations: &Annotations<'_>,
    ) -> Result<Self, LayoutError> {
        let old_count = self.lines_count();
        let mut cache = self.clone();
        let mut shift: isize = 0;

        for range in ranges {
            let lines = build_lines(
                after,
                range.after.clone(),
                annotations,
                &**self.builder(),
                &NeverCancelled,
                range.lines.end == old_count,
            )?;
            let from = range.lines.start.saturating_add_signed(shift);
            let to = range.lines.end.saturating_add_signed(shift);
            tracing::trace!(
                ?range,
                from,
                to,
                new_lines = lines.len(),
                "rebuild lines"
            );
            cache = cache.replace_lines(from, to, &lines);
            shift += lines.len() as isize - range.lines.len() as isize;
        }
        Ok(cache)
    }

    /// Snapshot for `after`, the result of applying `operation` to `before`.
    pub fn edit(
        &self,
        before: &Rope,
        after: &Rope,
        operation: &Operation,
        annotations: &Annotations<'_>,
    ) -> Result<Self, LayoutError> {
        if operation.is_identity() {
            return Ok(self.clone());
        }
        let ranges = self.operation_to_ranges(before, operation, annotations)?;
        let cache = self.rebuild_lines(after, &ranges, annotations)?;

        if cache.text_len() != after.len_chars() {
            tracing::warn!(
                expected = after.len_chars(),
                actual = cache.text_len(),
                "layout out of sync after edit"
            );
            return Err(out_of_sync(&cache, after));
        }
        tracing::debug!(
            ranges = ranges.len(),
            lines = cache.lines_count(),
            "applied edit"
        );
        Ok(cache)
    }

    /// Recompute the interline heights of the lines containing `offsets`, keeping their
    /// length and width.
    pub fn update_heights(
        &self,
        annotations: &Annotations<'_>,
        offsets: &[usize],
    ) -> Result<Self, LayoutError> {
        let mut cache = self.clone();
        for &offset in offsets {
            let Some(line) = cache.lines_layout().line_at_offset(offset) else {
                continue;
            };
            let is_last = line.line_idx + 1 == cache.lines_count();
            let range = line.range();
            // A fold ending at the line start still hides what binds to its end.
            let folds = resolve_folds(annotations, line.from.saturating_sub(1)..line.to);
            let interlines = annotations.interlines.query(range.clone());
            let above = interlines_above_line(&interlines, &folds, range.clone(), is_last)?;
            let below = interlines_below_line(&interlines, &folds, range, is_last)?;
            if above == line.interline_height_above && below == line.interline_height_below {
                continue;
            }
            cache = cache.replace_lines(
                line.line_idx,
                line.line_idx + 1,
                &[LineData::new(line.len(), above, below, line.width)],
            );
        }
        Ok(cache)
    }

    /// Lay out again the hard lines containing `offsets`, whose inlays changed.
    pub fn update_inlay_hints(
        &self,
        text: &Rope,
        annotations: &Annotations<'_>,
        offsets: &[usize],
    ) -> Result<Self, LayoutError> {
        if self.text_len() != text.len_chars() {
            return Err(out_of_sync(self, text));
        }
        let mut offsets = offsets.to_vec();
        offsets.sort_unstable();
        offsets.dedup();

        let is_break =
            |offset: usize| text.char(offset) == '\n' && !is_folded_newline(annotations, offset);
        let mut layout = self.lines_layout();
        let mut ranges: Vec<EditRange> = Vec::new();
        for offset in offsets {
            if offset > text.len_chars() {
                continue;
            }
            if ranges.last().is_some_and(|last| offset < last.before.end) {
                continue;
            }
            let (first_line, start) = hard_line_start(&mut layout, text, offset, &is_break)
                .ok_or_else(|| out_of_sync(self, text))?;
            let (end_line, end) = hard_line_end(&mut layout, offset, &is_break)
                .ok_or_else(|| out_of_sync(self, text))?;
            push_range(
                &mut ranges,
                EditRange {
                    lines: first_line..end_line,
                    before: start..end,
                    after: start..end,
                },
            );
        }
        self.rebuild_lines(text, &ranges, annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        annotations::{Interline, Interval},
        layout_lines, FixedWidthSoftWrapBuilder, LayoutConfig, LineBasedHeight,
    };
    use std::sync::Arc;

    fn layout(text: &Rope, box_width: Option<f32>) -> LinesCache {
        let config = LayoutConfig {
            char_width: 1.0,
            box_width,
            ..LayoutConfig::default()
        };
        layout_lines(
            text,
            &Annotations::empty(),
            Arc::new(FixedWidthSoftWrapBuilder::new(config)),
            &NeverCancelled,
        )
        .unwrap()
    }

    fn lengths(cache: &LinesCache) -> Vec<usize> {
        cache.line_data().iter().map(|line| line.length).collect()
    }

    #[test]
    fn operation_lengths_and_apply() {
        let text = Rope::from_str("hello world");
        let operation = Operation::replace(&text, 6..11, "there");
        assert_eq!(operation.len_before(), 11);
        assert_eq!(operation.len_after(), 11);
        assert!(!operation.is_identity());
        assert_eq!(operation.apply(&text).unwrap().to_string(), "hello there");

        let identity = Operation::replace(&text, 0..5, "hello");
        assert!(identity.is_identity());

        let bad = Operation::new(vec![Op::Retain(3)]);
        assert_eq!(
            bad.apply(&text).unwrap_err(),
            LayoutError::OperationLength {
                expected: 11,
                actual: 3
            }
        );
    }

    #[test]
    fn ranges_widen_to_hard_lines() {
        let text = Rope::from_str("a\nbc d\nef\n");
        let cache = layout(&text, None);
        let operation = Operation::replace(&text, 3..4, "xyz");

        let ranges = cache
            .operation_to_ranges(&text, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(
            ranges,
            vec![EditRange {
                lines: 1..2,
                before: 2..7,
                after: 2..9,
            }]
        );
    }

    #[test]
    fn ranges_cover_wrapped_continuations() {
        let text = Rope::from_str("aaaa bbbb cccc\nz");
        let cache = layout(&text, Some(5.0));
        assert_eq!(lengths(&cache), vec![5, 5, 5, 1]);

        let operation = Operation::replace(&text, 11..12, "");
        let ranges = cache
            .operation_to_ranges(&text, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].lines, 0..3);
        assert_eq!(ranges[0].before, 0..15);
        assert_eq!(ranges[0].after, 0..14);
    }

    #[test]
    fn adjacent_replacements_coalesce() {
        let text = Rope::from_str("ab\ncd\nef");
        let cache = layout(&text, None);
        let operation = Operation::new(vec![
            Op::Retain(1),
            Op::Replace {
                deleted: "b".into(),
                inserted: "B".into(),
            },
            Op::Retain(2),
            Op::Replace {
                deleted: "d".into(),
                inserted: "DD".into(),
            },
            Op::Retain(3),
        ]);

        let ranges = cache
            .operation_to_ranges(&text, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(
            ranges,
            vec![EditRange {
                lines: 0..2,
                before: 0..6,
                after: 0..7,
            }]
        );
    }

    #[test]
    fn edit_matches_cold_layout() {
        let before = Rope::from_str("first line\nsecond\nthird one here\n");
        let cache = layout(&before, Some(8.0));
        let operation = Operation::replace(&before, 11..17, "a much longer second line");
        let after = operation.apply(&before).unwrap();

        let edited = cache
            .edit(&before, &after, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(edited.line_data(), layout(&after, Some(8.0)).line_data());
        edited.check_invariants(after.len_chars());
    }

    #[test]
    fn deleting_final_newline_drops_trailing_line() {
        let before = Rope::from_str("ab\n");
        let cache = layout(&before, None);
        assert_eq!(lengths(&cache), vec![3, 0]);

        let operation = Operation::replace(&before, 2..3, "");
        let after = operation.apply(&before).unwrap();
        let edited = cache
            .edit(&before, &after, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(lengths(&edited), vec![2]);
    }

    #[test]
    fn typing_before_final_newline_keeps_one_trailing_line() {
        let before = Rope::from_str("abc\n");
        let cache = layout(&before, None);
        let operation = Operation::replace(&before, 1..1, "x");
        let after = operation.apply(&before).unwrap();

        let edited = cache
            .edit(&before, &after, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(lengths(&edited), vec![5, 0]);
    }

    #[test]
    fn identity_edit_returns_same_lines() {
        let text = Rope::from_str("same\ntext");
        let cache = layout(&text, None);
        let operation = Operation::replace(&text, 0..4, "same");

        let edited = cache
            .edit(&text, &text, &operation, &Annotations::empty())
            .unwrap();
        assert_eq!(edited.line_data(), cache.line_data());
    }

    #[test]
    fn mismatched_operation_is_rejected() {
        let text = Rope::from_str("abc");
        let cache = layout(&text, None);
        let operation = Operation::new(vec![Op::Replace {
            deleted: "abcd".into(),
            inserted: String::new(),
        }]);

        let err = cache
            .edit(&text, &Rope::new(), &operation, &Annotations::empty())
            .unwrap_err();
        assert!(matches!(err, LayoutError::OperationLength { .. }));
    }

    #[test]
    fn update_heights_reads_each_side() {
        let text = Rope::from_str("ab\ncd\n");
        let cache = layout(&text, None);
        let interlines = vec![
            Interval::at(1, Interline::above(LineBasedHeight::new(50))),
            Interval::at(4, Interline::below(LineBasedHeight::new(30))),
        ];
        let annotations = Annotations {
            interlines: &interlines,
            ..Annotations::empty()
        };

        let updated = cache.update_heights(&annotations, &[1, 4]).unwrap();
        let lines = updated.line_data();
        assert_eq!(lines[0].interline_height_above.ratio(), 50);
        assert_eq!(lines[0].interline_height_below, LineBasedHeight::ZERO);
        assert_eq!(lines[1].interline_height_above, LineBasedHeight::ZERO);
        assert_eq!(lines[1].interline_height_below.ratio(), 30);
        assert_eq!(updated.lines_height().ratio(), 380);
    }

    #[test]
    fn update_inlay_hints_relayouts_touched_lines() {
        use crate::annotations::{Inlay, InlayBinding};

        let text = Rope::from_str("abc\ndef\n");
        let cache = layout(&text, None);
        let inlays = vec![Interval::at(5, Inlay::new(InlayBinding::After, ": i32"))];
        let measure = |inlay: &Interval<Inlay>| inlay.data.text.chars().count() as f32;
        let annotations = Annotations {
            inlays: &inlays,
            inlay_measurer: &measure,
            ..Annotations::empty()
        };

        let updated = cache.update_inlay_hints(&text, &annotations, &[5]).unwrap();
        let widths: Vec<f32> = updated.line_data().iter().map(|line| line.width).collect();
        assert_eq!(widths, vec![3.0, 8.0, 0.0]);
        assert_eq!(lengths(&updated), lengths(&cache));
    }

    fn layout_with(
        text: &Rope,
        config: LayoutConfig,
        annotations: &Annotations<'_>,
    ) -> LinesCache {
        layout_lines(
            text,
            annotations,
            Arc::new(FixedWidthSoftWrapBuilder::new(config)),
            &NeverCancelled,
        )
        .unwrap()
    }

    fn narrow_config() -> LayoutConfig {
        LayoutConfig {
            char_width: 1.0,
            box_width: Some(6.0),
            prefer_wrap_by_words: false,
            wrap_indent: true,
        }
    }

    #[test]
    fn edit_after_folded_newline_relays_whole_layout_line() {
        use crate::annotations::Fold;

        let before = Rope::from_str("  abc\nde fgh\n");
        let folds = vec![Interval::new(4..6, Fold::default())];
        let measure = |_: &Interval<Fold>| 2.0;
        let annotations = Annotations {
            folds: &folds,
            fold_measurer: &measure,
            ..Annotations::empty()
        };
        let cache = layout_with(&before, narrow_config(), &annotations);
        assert_eq!(lengths(&cache), vec![6, 4, 3, 0]);

        let operation = Operation::replace(&before, 9..9, "X");
        let ranges = cache
            .operation_to_ranges(&before, &operation, &annotations)
            .unwrap();
        assert_eq!(
            ranges,
            vec![EditRange {
                lines: 0..3,
                before: 0..13,
                after: 0..14,
            }]
        );

        let after = operation.apply(&before).unwrap();
        let edited = cache.edit(&before, &after, &operation, &annotations).unwrap();
        let expected = layout_with(&after, narrow_config(), &annotations);
        assert_eq!(lengths(&edited), vec![6, 4, 4, 0]);
        assert_eq!(edited.line_data(), expected.line_data());
    }

    #[test]
    fn inlay_after_folded_newline_relays_whole_layout_line() {
        use crate::annotations::{Fold, Inlay, InlayBinding};

        let text = Rope::from_str("  abc\nde fgh\n");
        let folds = vec![Interval::new(4..6, Fold::default())];
        let fold_width = |_: &Interval<Fold>| 2.0;
        let cache = layout_with(
            &text,
            narrow_config(),
            &Annotations {
                folds: &folds,
                fold_measurer: &fold_width,
                ..Annotations::empty()
            },
        );

        let inlays = vec![Interval::at(8, Inlay::new(InlayBinding::After, "::"))];
        let inlay_width = |inlay: &Interval<Inlay>| inlay.data.text.chars().count() as f32;
        let annotations = Annotations {
            folds: &folds,
            fold_measurer: &fold_width,
            inlays: &inlays,
            inlay_measurer: &inlay_width,
            ..Annotations::empty()
        };

        let updated = cache.update_inlay_hints(&text, &annotations, &[8]).unwrap();
        let expected = layout_with(&text, narrow_config(), &annotations);
        assert_eq!(updated.line_data(), expected.line_data());
    }

    #[test]
    fn update_heights_hides_interline_at_fold_end() {
        use crate::annotations::Fold;

        let text = Rope::from_str("abcdef");
        let folds = vec![Interval::new(0..2, Fold::default())];
        let measure = |_: &Interval<Fold>| 10.0;
        let interlines = vec![
            Interval::at(2, Interline::above(LineBasedHeight::new(50))),
            Interval::at(4, Interline::above(LineBasedHeight::new(30))),
        ];
        let without = Annotations {
            folds: &folds,
            fold_measurer: &measure,
            ..Annotations::empty()
        };
        let with = Annotations {
            interlines: &interlines,
            ..without
        };

        let cache = layout_with(&text, narrow_config(), &without);
        let expected = layout_with(&text, narrow_config(), &with);
        assert_eq!(lengths(&expected), vec![2, 4]);

        let updated = cache.update_heights(&with, &[2, 4]).unwrap();
        assert_eq!(updated.line_data(), expected.line_data());
        assert_eq!(updated.line_data()[1].interline_height_above.ratio(), 30);
    }
}
