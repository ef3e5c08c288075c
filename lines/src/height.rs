//! Fixed-point height unit used by the layout tree.
//!
//! Heights are stored as hundredths of a text line so that summing them across
//! every line of a large document never accumulates floating point error. The
//! height channel of [`LinesSummary`](crate::LinesSummary) is therefore an exact
//! integer metric, just like the length and count channels.
//!
//! ```text
//! ONE_LINE        = 100
//! half a line     =  50
//! 1.5 lines       = 150
//! ```

use serde::Deserialize;
use std::{
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

/// Height measured in hundredths of one text line.
#[derive(
    Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq, Hash, Deserialize,
)]
#[serde(transparent)]
pub struct LineBasedHeight(i32);

impl LineBasedHeight {
    pub const ZERO: Self = Self(0);

    /// Height of a single text row.
    pub const ONE_LINE: Self = Self(100);

    pub const fn new(ratio: i32) -> Self {
        Self(ratio)
    }

    /// Nearest height to a fractional number of lines.
    pub fn from_ratio(lines: f32) -> Self {
        Self((lines * Self::ONE_LINE.0 as f32).round() as i32)
    }

    /// Raw hundredths-of-a-line value.
    pub const fn ratio(self) -> i32 {
        self.0
    }

    /// Height as a number of lines.
    pub fn to_ratio(self) -> f32 {
        self.0 as f32 / Self::ONE_LINE.0 as f32
    }

    /// Height in pixels for the given text row height.
    pub fn to_height(self, line_height_px: f32) -> f32 {
        self.to_ratio() * line_height_px
    }

    /// Clamp into `[min, max]`.
    pub fn coerce_in(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for LineBasedHeight {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for LineBasedHeight {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for LineBasedHeight {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for LineBasedHeight {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for LineBasedHeight {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for LineBasedHeight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_sub_is_identity() {
        let a = LineBasedHeight::new(137);
        let b = LineBasedHeight::new(45);
        assert_eq!(a + b - b, a);

        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn one_line_ratio() {
        assert_eq!(LineBasedHeight::ONE_LINE.to_ratio(), 1.0);
        assert_eq!(LineBasedHeight::ONE_LINE.to_height(18.0), 18.0);
        assert_eq!(LineBasedHeight::from_ratio(1.5).ratio(), 150);
    }

    #[test]
    fn coerce_in_clamps_both_sides() {
        let min = LineBasedHeight::ZERO;
        let max = LineBasedHeight::ONE_LINE;
        assert_eq!(LineBasedHeight::new(-20).coerce_in(min, max), min);
        assert_eq!(LineBasedHeight::new(250).coerce_in(min, max), max);
        assert_eq!(
            LineBasedHeight::new(40).coerce_in(min, max),
            LineBasedHeight::new(40)
        );
    }

    #[test]
    fn ordering_and_sum() {
        let heights = [
            LineBasedHeight::new(50),
            LineBasedHeight::new(30),
            LineBasedHeight::new(20),
        ];
        assert_eq!(heights.iter().copied().sum::<LineBasedHeight>(), LineBasedHeight::ONE_LINE);
        assert_eq!(heights[0].max(heights[1]), heights[0]);
        assert_eq!(heights[0].min(heights[1]), heights[1]);
        assert!(LineBasedHeight::new(-1).is_negative());
    }
}
