//! Cold layout of a text fragment.
//!
//! A fragment is split into hard lines at every newline that is not hidden by a fold, so
//! a fold spanning several lines joins them into one layout line. Each hard line gets its
//! annotations resolved into a [`HardLine`] and is handed to the [`SoftWrapBuilder`].
//!
//! ```text
//! "a\nb[c\nd]e\nf"   fold over [c\nd]
//!  a\n | b[c\nd]e\n | f
//! ```

use crate::{
    annotations::{line_inlays, resolve_folds, Annotations, ResolvedFold},
    HardLine, LayoutError, LineData, LinesCache, SoftWrapBuilder,
};
use ropey::Rope;
use smallvec::SmallVec;
use std::{
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Cooperative cancellation for cold layout, checked once per hard line.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;

    fn check(&self) -> Result<(), LayoutError> {
        if self.is_cancelled() {
            Err(LayoutError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancelled;

impl Cancellation for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Segment {
    range: Range<usize>,
    /// Ends with a newline not covered by a fold.
    ends_with_break: bool,
}

/// Hard lines of a fragment.
struct HardLines<'a> {
    text: &'a Rope,
    folds: &'a [ResolvedFold],
    fold_ix: usize,
    position: usize,
    end: usize,
    emit_trailing: bool,
    done: bool,
}

impl<'a> HardLines<'a> {
    fn new(
        text: &'a Rope,
        folds: &'a [ResolvedFold],
        range: Range<usize>,
        emit_trailing: bool,
    ) -> Self {
        Self {
            text,
            folds,
            fold_ix: 0,
            position: range.start,
            end: range.end,
            emit_trailing,
            done: false,
        }
    }

    fn next_break(&mut self) -> Option<usize> {
        let mut position = self.position;
        while position < self.end {
            let row = self.text.char_to_line(position);
            if row + 1 >= self.text.len_lines() {
                return None;
            }
            let newline = self.text.line_to_char(row + 1) - 1;
            if newline >= self.end {
                return None;
            }

            while self
                .folds
                .get(self.fold_ix)
                .is_some_and(|fold| fold.range.end <= newline)
            {
                self.fold_ix += 1;
            }
            match self.folds.get(self.fold_ix) {
                Some(fold) if fold.range.start <= newline => position = fold.range.end,
                _ => return Some(newline),
            }
        }
        None
    }
}

impl Iterator for HardLines<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.done {
            return None;
        }
        let start = self.position;
        match self.next_break() {
            Some(newline) => {
                self.position = newline + 1;
                if self.position == self.end && !self.emit_trailing {
                    self.done = true;
                }
                Some(Segment {
                    range: start..self.position,
                    ends_with_break: true,
                })
            }
            None => {
                self.done = true;
                Some(Segment {
                    range: start..self.end,
                    ends_with_break: false,
                })
            }
        }
    }
}

/// Resolve the annotations of the hard line `range`. `folds` are the resolved folds of
/// the enclosing fragment, sorted by start.
fn resolve_hard_line<'a>(
    text: &'a Rope,
    range: Range<usize>,
    folds: &[ResolvedFold],
    annotations: &Annotations<'_>,
    is_last: bool,
) -> HardLine<'a> {
    let lo = folds.partition_point(|fold| fold.range.start < range.start);
    let hi = folds.partition_point(|fold| fold.range.start < range.end);
    let folds: SmallVec<[ResolvedFold; 2]> = folds[lo..hi].iter().cloned().collect();

    let inlays = line_inlays(
        &annotations.inlays.query(range.clone()),
        &folds,
        range.clone(),
        is_last,
        annotations.inlay_measurer,
    );
    let interlines = annotations.interlines.query(range.clone());

    HardLine {
        text: text.slice(range.clone()),
        range,
        folds,
        inlays: inlays.into_iter().collect(),
        interlines: interlines.into_iter().collect(),
        is_last,
    }
}

/// Resolve `range` as a single hard line, for horizontal queries.
pub(crate) fn hard_line<'a>(
    text: &'a Rope,
    range: Range<usize>,
    annotations: &Annotations<'_>,
) -> HardLine<'a> {
    let folds = resolve_folds(annotations, range.clone());
    let is_last = range.end == text.len_chars();
    resolve_hard_line(text, range, &folds, annotations, is_last)
}

/// Lay out the fragment `range` of `text` into visual lines.
///
/// `emit_trailing` adds the empty line that follows a final newline; pass it only when
/// the fragment replaces the document's last line, otherwise that empty line is already
/// in the cache.
pub fn build_lines(
    text: &Rope,
    range: Range<usize>,
    annotations: &Annotations<'_>,
    builder: &dyn SoftWrapBuilder,
    cancellation: &dyn Cancellation,
    emit_trailing: bool,
) -> Result<Vec<LineData>, LayoutError> {
    let len = text.len_chars();
    let emit_trailing = emit_trailing && range.end == len;
    let folds = resolve_folds(annotations, range.clone());

    let mut lines = Vec::new();
    for segment in HardLines::new(text, &folds, range, emit_trailing) {
        cancellation.check()?;
        let is_last = segment.range.end == len && !segment.ends_with_break;
        let hard_line = resolve_hard_line(text, segment.range, &folds, annotations, is_last);
        builder.build(&hard_line, &mut lines)?;
    }
    Ok(lines)
}

/// Cold layout of the whole document.
pub fn layout_lines(
    text: &Rope,
    annotations: &Annotations<'_>,
    builder: Arc<dyn SoftWrapBuilder>,
    cancellation: &dyn Cancellation,
) -> Result<LinesCache, LayoutError> {
    let lines = build_lines(
        text,
        0..text.len_chars(),
        annotations,
        &*builder,
        cancellation,
        true,
    )?;
    tracing::debug!(
        lines = lines.len(),
        len = text.len_chars(),
        "laid out document"
    );
    Ok(LinesCache::from_lines(lines, builder))
}
