//! Packed leaves of the lines tree.
//!
//! Every visual line is described by four integers: its length in characters, the
//! interline height above it, the interline height below it, and its rendered width
//! (stored as `f32` bits). A [`LineArray`] packs up to [`MAX_LINES`] of them into one
//! flat buffer, and the lines tree is a [`SumTree`] of those arrays:
//!
//! ```text
//! SumTree<LineArray>
//!   [len,above,below,width][len,above,below,width]...  <= 64 lines per leaf
//! ```
//!
//! [`LinesSummary`] aggregates a leaf (and every subtree) into the four metrics the
//! query engine seeks by: total length, total height, line count and maximum width.

use crate::LineBasedHeight;
use std::mem;
use sum_tree::{Item, SumTree};

/// Upper bound on lines per leaf.
pub const MAX_LINES: usize = 64;

/// Leaves below this size absorb a neighbour when they are rewritten.
pub const MIN_LINES: usize = MAX_LINES / 2;

const FIELDS: usize = 4;
const LENGTH: usize = 0;
const ABOVE: usize = 1;
const BELOW: usize = 2;
const WIDTH: usize = 3;

/// Layout of a single visual line, as produced by a
/// [`SoftWrapBuilder`](crate::SoftWrapBuilder).
///
/// Transient: it only lives until it is packed into a [`LineArray`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineData {
    /// Number of characters, including a trailing newline.
    pub length: usize,
    pub interline_height_above: LineBasedHeight,
    pub interline_height_below: LineBasedHeight,
    /// Rendered width in pixels.
    pub width: f32,
}

impl LineData {
    pub fn new(
        length: usize,
        interline_height_above: LineBasedHeight,
        interline_height_below: LineBasedHeight,
        width: f32,
    ) -> Self {
        Self {
            length,
            interline_height_above,
            interline_height_below,
            width,
        }
    }

    /// A line with no interlines.
    pub fn plain(length: usize, width: f32) -> Self {
        Self::new(length, LineBasedHeight::ZERO, LineBasedHeight::ZERO, width)
    }

    /// Height of the text row plus both interlines.
    pub fn total_height(&self) -> LineBasedHeight {
        self.interline_height_above + LineBasedHeight::ONE_LINE + self.interline_height_below
    }
}

/// Contiguous batch of visual lines in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineArray {
    data: Vec<u32>,
}

impl LineArray {
    pub fn from_lines(lines: &[LineData]) -> Self {
        let mut array = Self {
            data: Vec::with_capacity(lines.len() * FIELDS),
        };
        for line in lines {
            array.push(*line);
        }
        array
    }

    /// Number of lines in this leaf.
    pub fn len(&self) -> usize {
        self.data.len() / FIELDS
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= MAX_LINES
    }

    pub fn length(&self, index: usize) -> usize {
        self.data[index * FIELDS + LENGTH] as usize
    }

    pub fn interline_height_above(&self, index: usize) -> LineBasedHeight {
        LineBasedHeight::new(self.data[index * FIELDS + ABOVE] as i32)
    }

    pub fn interline_height_below(&self, index: usize) -> LineBasedHeight {
        LineBasedHeight::new(self.data[index * FIELDS + BELOW] as i32)
    }

    pub fn width(&self, index: usize) -> f32 {
        f32::from_bits(self.data[index * FIELDS + WIDTH])
    }

    pub fn total_height(&self, index: usize) -> LineBasedHeight {
        self.interline_height_above(index)
            + LineBasedHeight::ONE_LINE
            + self.interline_height_below(index)
    }

    pub fn get(&self, index: usize) -> LineData {
        LineData::new(
            self.length(index),
            self.interline_height_above(index),
            self.interline_height_below(index),
            self.width(index),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = LineData> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    pub fn push(&mut self, line: LineData) {
        self.data.extend_from_slice(&[
            line.length as u32,
            line.interline_height_above.ratio() as u32,
            line.interline_height_below.ratio() as u32,
            line.width.to_bits(),
        ]);
    }

    /// Replace the lines in `range` with `lines`. The result may exceed
    /// [`MAX_LINES`]; callers repack through [`LinesTreeExt::push_lines`].
    pub fn splice(&mut self, range: std::ops::Range<usize>, lines: &[LineData]) {
        let mut tail = self.data.split_off(range.end * FIELDS);
        self.data.truncate(range.start * FIELDS);
        for line in lines {
            self.push(*line);
        }
        self.data.append(&mut tail);
    }
}

/// Aggregated metrics of a run of visual lines.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinesSummary {
    /// Sum of line lengths in characters.
    pub len: usize,
    /// Sum of total line heights.
    pub height: LineBasedHeight,
    /// Number of lines.
    pub count: usize,
    /// Maximum line width.
    pub width: f32,
}

impl sum_tree::ContextLessSummary for LinesSummary {
    fn zero() -> Self {
        Self::default()
    }

    fn add_summary(&mut self, other: &Self) {
        self.len += other.len;
        self.height += other.height;
        self.count += other.count;
        self.width = self.width.max(other.width);
    }
}

impl Item for LineArray {
    type Summary = LinesSummary;

    fn summary(&self, _cx: ()) -> Self::Summary {
        let mut summary = LinesSummary {
            count: self.len(),
            ..LinesSummary::default()
        };
        for index in 0..self.len() {
            summary.len += self.length(index);
            summary.height += self.total_height(index);
            summary.width = summary.width.max(self.width(index));
        }
        summary
    }
}

/// Packing policy for the lines tree.
pub trait LinesTreeExt {
    /// Append lines, topping up the last leaf before starting new ones.
    fn push_lines<I: IntoIterator<Item = LineData>>(&mut self, lines: I);
}

impl LinesTreeExt for SumTree<LineArray> {
    fn push_lines<I: IntoIterator<Item = LineData>>(&mut self, lines: I) {
        let mut lines = lines.into_iter().peekable();
        if lines.peek().is_none() {
            return;
        }

        self.update_last(
            |last| {
                while !last.is_full() {
                    match lines.next() {
                        Some(line) => last.push(line),
                        None => break,
                    }
                }
            },
            (),
        );

        let mut chunk = LineArray::default();
        for line in lines {
            chunk.push(line);
            if chunk.is_full() {
                self.push(mem::take(&mut chunk), ());
            }
        }
        if !chunk.is_empty() {
            self.push(chunk, ());
        }
    }
}
