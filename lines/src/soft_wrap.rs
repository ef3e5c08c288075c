//! Splitting hard lines into visual lines.
//!
//! A [`SoftWrapBuilder`] turns one hard line (a run of text ending at an uncovered
//! newline, with its annotations already resolved) into the [`LineData`] of its visual
//! lines. The builder is stateless and shared across threads through an `Arc`.
//!
//! [`FixedWidthSoftWrapBuilder`] is a greedy monospace wrapper. It walks the line in
//! units; a unit is one character, or one whole fold, plus any inlays sitting at its
//! offset:
//!
//! ```text
//! "fn main() {  [...]  }\n"
//!  ^^^^^^^^^^^  ^^^^^  ^^
//!  characters   fold   characters; the newline is zero width
//! ```
//!
//! When a unit would overflow the box width the line is broken at the last word break
//! (a whitespace to non-whitespace transition) if there is one, otherwise right before
//! the unit. A unit wider than the box is placed alone and allowed to overflow, so a
//! fold is never split and no empty visual line is ever produced.

use crate::{
    annotations::{
        interlines_above_line, interlines_below_line, Interline, Interval, ResolvedFold,
        ResolvedInlay,
    },
    LayoutConfig, LayoutError, LineData,
};
use ropey::RopeSlice;
use smallvec::SmallVec;
use std::ops::Range;
use unicode_width::UnicodeWidthChar;

/// One hard line with its annotations resolved, ready to be wrapped.
#[derive(Clone, Debug)]
pub struct HardLine<'a> {
    /// Text of `range`.
    pub text: RopeSlice<'a>,
    pub range: Range<usize>,
    /// Folds inside `range`, sorted by start.
    pub folds: SmallVec<[ResolvedFold; 2]>,
    /// Visible inlays of the line, sorted by offset then binding.
    pub inlays: SmallVec<[ResolvedInlay; 4]>,
    /// Interlines touching `range`; ownership is decided per visual line.
    pub interlines: SmallVec<[Interval<Interline>; 2]>,
    /// Last line of the document.
    pub is_last: bool,
}

impl<'a> HardLine<'a> {
    /// Hard line without annotations starting at `start`.
    pub fn plain(text: RopeSlice<'a>, start: usize, is_last: bool) -> Self {
        Self {
            range: start..start + text.len_chars(),
            text,
            folds: SmallVec::new(),
            inlays: SmallVec::new(),
            interlines: SmallVec::new(),
            is_last,
        }
    }

    /// End of the line's content, before a trailing newline.
    pub fn content_end(&self) -> usize {
        let len = self.text.len_chars();
        if len > 0 && self.text.char(len - 1) == '\n' {
            self.range.end - 1
        } else {
            self.range.end
        }
    }
}

/// Offset reached by a horizontal position, and the width up to it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OffsetWidth {
    pub offset: usize,
    pub width: f32,
}

/// Strategy splitting hard lines into visual lines.
pub trait SoftWrapBuilder: Send + Sync {
    /// Append the visual lines of `line` to `lines`. Their lengths sum to the length of
    /// `line.range`, and only an empty hard line yields a zero-length visual line.
    fn build(&self, line: &HardLine<'_>, lines: &mut Vec<LineData>) -> Result<(), LayoutError>;

    /// Offset in `line` closest to `target_width`, measured without wrapping. Never lands
    /// inside a fold or after a trailing newline.
    fn offset_of_width(&self, line: &HardLine<'_>, target_width: f32) -> OffsetWidth;
}

/// Geometric width of `c` in character cells.
pub fn char_geom_length(c: char) -> f32 {
    match c {
        '\n' | '\r' => 0.0,
        '\t' => 4.0,
        c if c.width() == Some(2) => 1.65,
        _ => 1.0,
    }
}

struct Span {
    range: Range<usize>,
    width: f32,
}

/// Greedy wrapper for monospace text.
#[derive(Clone, Debug, Default)]
pub struct FixedWidthSoftWrapBuilder {
    config: LayoutConfig,
}

impl FixedWidthSoftWrapBuilder {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Leading whitespace width carried onto continuation lines. Ignored once it eats
    /// half the box.
    fn wrap_indent(&self, line: &HardLine<'_>, box_width: f32) -> f32 {
        if !self.config.wrap_indent || !box_width.is_finite() {
            return 0.0;
        }
        let limit = line
            .folds
            .first()
            .map_or(line.range.end, |fold| fold.range.start)
            .saturating_sub(line.range.start);
        let indent: f32 = line
            .text
            .chars()
            .take(limit)
            .take_while(|c| *c == ' ' || *c == '\t')
            .map(|c| char_geom_length(c) * self.config.char_width)
            .sum();
        if indent * 2.0 >= box_width {
            0.0
        } else {
            indent
        }
    }

    /// Walk `line` unit by unit.
    ///
    /// Without a target, wraps to the box width and records every visual line in
    /// `spans`. With a target, stops at the unit boundary closest to it.
    fn walk(
        &self,
        line: &HardLine<'_>,
        target_width: Option<f32>,
        spans: &mut SmallVec<[Span; 4]>,
    ) -> OffsetWidth {
        let char_width = self.config.char_width;
        let box_width = match target_width {
            Some(_) => f32::INFINITY,
            None => self.config.wrap_width(),
        };
        let indent = self.wrap_indent(line, box_width);
        let end = line.range.end;

        let mut chars = line.text.chars();
        let mut folds = line.folds.iter().peekable();
        let mut inlays = line.inlays.iter().peekable();

        let mut offset = line.range.start;
        let mut line_start = offset;
        let mut line_width = 0.0;
        let mut word_break: Option<(usize, f32)> = None;
        let mut after_whitespace = false;

        loop {
            let mut inlay_width = 0.0;
            while let Some(inlay) = inlays.next_if(|inlay| inlay.offset <= offset) {
                if inlay.offset == offset {
                    inlay_width += inlay.width;
                }
            }

            if offset >= end {
                if let Some(target) = target_width {
                    let overshoot = line_width + inlay_width - target;
                    if overshoot > 0.0 && overshoot >= target - line_width {
                        return OffsetWidth {
                            offset,
                            width: line_width,
                        };
                    }
                }
                line_width += inlay_width;
                break;
            }

            while folds.next_if(|fold| fold.range.start < offset).is_some() {}
            let (unit_len, glyph_width, is_whitespace) =
                match folds.next_if(|fold| fold.range.start == offset && fold.range.end > offset) {
                    Some(fold) => {
                        let len = fold.range.end - offset;
                        chars.nth(len - 1);
                        (len, fold.width, false)
                    }
                    None => {
                        let Some(c) = chars.next() else { break };
                        (1, char_geom_length(c) * char_width, c.is_whitespace())
                    }
                };

            if self.config.prefer_wrap_by_words
                && after_whitespace
                && !is_whitespace
                && offset > line_start
            {
                word_break = Some((offset, line_width));
            }

            let unit_width = inlay_width + glyph_width;
            match target_width {
                Some(target) => {
                    if line_width + unit_width > target {
                        let overshoot = line_width + unit_width - target;
                        let undershoot = target - line_width;
                        return if overshoot < undershoot {
                            OffsetWidth {
                                offset: offset + unit_len,
                                width: line_width + unit_width,
                            }
                        } else {
                            OffsetWidth {
                                offset,
                                width: line_width,
                            }
                        };
                    }
                }
                None => {
                    while unit_width > 0.0
                        && line_width + unit_width > box_width
                        && offset > line_start
                    {
                        match word_break.take().filter(|(at, _)| *at > line_start) {
                            Some((at, width)) => {
                                spans.push(Span {
                                    range: line_start..at,
                                    width,
                                });
                                line_width = indent + (line_width - width);
                                line_start = at;
                            }
                            None => {
                                spans.push(Span {
                                    range: line_start..offset,
                                    width: line_width,
                                });
                                line_width = indent;
                                line_start = offset;
                            }
                        }
                    }
                }
            }

            line_width += unit_width;
            offset += unit_len;
            after_whitespace = is_whitespace;
        }

        if target_width.is_none() {
            spans.push(Span {
                range: line_start..end,
                width: line_width,
            });
        }
        OffsetWidth {
            offset: end,
            width: line_width,
        }
    }
}

impl SoftWrapBuilder for FixedWidthSoftWrapBuilder {
    fn build(&self, line: &HardLine<'_>, lines: &mut Vec<LineData>) -> Result<(), LayoutError> {
        let mut spans = SmallVec::new();
        self.walk(line, None, &mut spans);

        let last = spans.len().saturating_sub(1);
        for (ix, span) in spans.into_iter().enumerate() {
            let is_last = line.is_last && ix == last;
            let above =
                interlines_above_line(&line.interlines, &line.folds, span.range.clone(), is_last)?;
            let below =
                interlines_below_line(&line.interlines, &line.folds, span.range.clone(), is_last)?;
            lines.push(LineData::new(span.range.len(), above, below, span.width));
        }
        Ok(())
    }

    fn offset_of_width(&self, line: &HardLine<'_>, target_width: f32) -> OffsetWidth {
        let mut spans = SmallVec::new();
        let hit = self.walk(line, Some(target_width), &mut spans);
        OffsetWidth {
            offset: hit.offset.min(line.content_end()),
            width: hit.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{annotations::InlayBinding, LineBasedHeight};
    use ropey::Rope;

    fn builder(box_width: Option<f32>, words: bool) -> FixedWidthSoftWrapBuilder {
        FixedWidthSoftWrapBuilder::new(LayoutConfig {
            char_width: 1.0,
            box_width,
            prefer_wrap_by_words: words,
            wrap_indent: true,
        })
    }

    fn build(builder: &FixedWidthSoftWrapBuilder, line: &HardLine<'_>) -> Vec<LineData> {
        let mut lines = Vec::new();
        builder.build(line, &mut lines).unwrap();
        lines
    }

    fn lengths(lines: &[LineData]) -> Vec<usize> {
        lines.iter().map(|line| line.length).collect()
    }

    #[test]
    fn char_geometry() {
        assert_eq!(char_geom_length('a'), 1.0);
        assert_eq!(char_geom_length('\t'), 4.0);
        assert_eq!(char_geom_length('\n'), 0.0);
        assert_eq!(char_geom_length('\r'), 0.0);
        assert_eq!(char_geom_length('中'), 1.65);
    }

    #[test]
    fn force_breaks_without_word_wrap() {
        let rope = Rope::from_str("abcdef");
        let line = HardLine::plain(rope.slice(..), 0, true);
        let lines = build(&builder(Some(3.0), false), &line);

        assert_eq!(lengths(&lines), vec![3, 3]);
        assert_eq!(lines[0].width, 3.0);
        assert_eq!(lines[1].width, 3.0);
    }

    #[test]
    fn fold_is_never_split() {
        let rope = Rope::from_str("abcdef");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.folds.push(ResolvedFold {
            range: 2..4,
            width: 10.0,
        });
        let lines = build(&builder(Some(3.0), false), &line);

        assert_eq!(lengths(&lines), vec![2, 2, 2]);
        assert_eq!(lines[1].width, 10.0);
    }

    #[test]
    fn fold_fitting_the_box_stays_on_one_line() {
        let rope = Rope::from_str("abcdef");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.folds.push(ResolvedFold {
            range: 2..4,
            width: 10.0,
        });
        let lines = build(&builder(Some(20.0), false), &line);

        assert_eq!(lengths(&lines), vec![6]);
        assert_eq!(lines[0].width, 14.0);
    }

    #[test]
    fn breaks_after_whitespace() {
        let rope = Rope::from_str("aaaa bbbb");
        let line = HardLine::plain(rope.slice(..), 0, true);
        let lines = build(&builder(Some(6.0), true), &line);

        assert_eq!(lengths(&lines), vec![5, 4]);
        assert_eq!(lines[0].width, 5.0);
        assert_eq!(lines[1].width, 4.0);
    }

    #[test]
    fn newline_after_overflowing_tab_stays_on_its_line() {
        let rope = Rope::from_str("\t\n");
        let line = HardLine::plain(rope.slice(..), 0, false);
        let lines = build(&builder(Some(3.0), false), &line);

        assert_eq!(lengths(&lines), vec![2]);
        assert_eq!(lines[0].width, 4.0);
    }

    #[test]
    fn unbounded_box_keeps_hard_line_whole() {
        let rope = Rope::from_str("a fairly long line that would wrap\n");
        let line = HardLine::plain(rope.slice(..), 0, false);
        let lines = build(&builder(None, true), &line);

        assert_eq!(lengths(&lines), vec![rope.len_chars()]);
    }

    #[test]
    fn continuation_lines_carry_indent() {
        let rope = Rope::from_str("    abcdefgh");
        let line = HardLine::plain(rope.slice(..), 0, true);
        let lines = build(&builder(Some(10.0), false), &line);

        assert_eq!(lengths(&lines), vec![10, 2]);
        assert_eq!(lines[1].width, 6.0);
    }

    #[test]
    fn interlines_sum_on_owning_line() {
        let rope = Rope::from_str("abcdef");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.interlines
            .push(Interval::at(1, Interline::above(LineBasedHeight::new(50))));
        line.interlines
            .push(Interval::at(4, Interline::above(LineBasedHeight::new(30))));
        let lines = build(&builder(None, true), &line);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].interline_height_above.ratio(), 80);
        assert_eq!(lines[0].total_height().ratio(), 180);
    }

    #[test]
    fn interline_follows_wrapped_offset() {
        let rope = Rope::from_str("abcdef");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.interlines
            .push(Interval::at(3, Interline::below(LineBasedHeight::new(40))));
        let lines = build(&builder(Some(3.0), false), &line);

        assert_eq!(lines[0].interline_height_below, LineBasedHeight::ZERO);
        assert_eq!(lines[1].interline_height_below.ratio(), 40);
    }

    #[test]
    fn inlays_add_width() {
        let rope = Rope::from_str("abc");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.inlays.push(ResolvedInlay {
            offset: 1,
            binding: InlayBinding::Before,
            width: 5.0,
        });
        let lines = build(&builder(None, true), &line);

        assert_eq!(lines[0].width, 8.0);
    }

    #[test]
    fn offset_of_width_picks_closest_boundary() {
        let rope = Rope::from_str("abcdef\n");
        let line = HardLine::plain(rope.slice(..), 10, false);
        let builder = builder(None, true);

        assert_eq!(
            builder.offset_of_width(&line, 2.4),
            OffsetWidth {
                offset: 12,
                width: 2.0
            }
        );
        assert_eq!(
            builder.offset_of_width(&line, 2.6),
            OffsetWidth {
                offset: 13,
                width: 3.0
            }
        );
        assert_eq!(
            builder.offset_of_width(&line, 100.0),
            OffsetWidth {
                offset: 16,
                width: 6.0
            }
        );
    }

    #[test]
    fn offset_of_width_never_enters_a_fold() {
        let rope = Rope::from_str("abcdef");
        let mut line = HardLine::plain(rope.slice(..), 0, true);
        line.folds.push(ResolvedFold {
            range: 1..5,
            width: 10.0,
        });
        let hit = builder(None, true).offset_of_width(&line, 4.0);
        assert_eq!(hit, OffsetWidth { offset: 1, width: 1.0 });

        let hit = builder(None, true).offset_of_width(&line, 9.0);
        assert_eq!(hit, OffsetWidth { offset: 5, width: 11.0 });
    }
}
