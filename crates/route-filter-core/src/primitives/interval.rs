// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::math::cap::{cap_add, cap_sub};
use std::ops::{Add, BitAnd, BitAndAssign, Sub};

/// A closed interval `[min, max]` over `i64`. Empty iff `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub min: i64,
    pub max: i64,
}

impl Interval {
    #[inline]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// The interval covering all of `i64`.
    #[inline]
    pub const fn full() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    #[inline]
    pub const fn point(value: i64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.min > self.max
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// An interval augmented with counts of plus/minus infinity contributions.
///
/// Transit sums along a path may pass through unbounded transits; tracking
/// how many `-inf` / `+inf` bounds were accumulated keeps the interval
/// algebra associative: a later `delta` can cancel an infinity against the
/// one that introduced it and recover the finite bounds, which plain
/// clamping at `i64::MIN` / `i64::MAX` would lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedInterval {
    pub min: i64,
    pub max: i64,
    pub num_negative_infinity: i32,
    pub num_positive_infinity: i32,
}

impl ExtendedInterval {
    #[inline]
    pub const fn new(
        min: i64,
        max: i64,
        num_negative_infinity: i32,
        num_positive_infinity: i32,
    ) -> Self {
        Self {
            min,
            max,
            num_negative_infinity,
            num_positive_infinity,
        }
    }

    /// The additive identity: `[0, 0]` with no infinities.
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        let minimum_value = if self.num_negative_infinity == 0 {
            self.min
        } else {
            i64::MIN
        };
        let maximum_value = if self.num_positive_infinity == 0 {
            self.max
        } else {
            i64::MAX
        };
        minimum_value > maximum_value
    }

    /// The interval `delta` such that `from + delta == to`.
    ///
    /// Not the same as `to - from`: infinity counts subtract instead of
    /// adding, so a transit through an unbounded arc cancels out.
    #[inline]
    pub fn delta(from: Self, to: Self) -> Self {
        Self {
            min: cap_sub(to.min, from.min),
            max: cap_sub(to.max, from.max),
            num_negative_infinity: to.num_negative_infinity - from.num_negative_infinity,
            num_positive_infinity: to.num_positive_infinity - from.num_positive_infinity,
        }
    }
}

impl From<Interval> for ExtendedInterval {
    #[inline]
    fn from(interval: Interval) -> Self {
        let is_negative_infinity = interval.min == i64::MIN;
        let is_positive_infinity = interval.max == i64::MAX;
        Self {
            min: if is_negative_infinity { 0 } else { interval.min },
            max: if is_positive_infinity { 0 } else { interval.max },
            num_negative_infinity: i32::from(is_negative_infinity),
            num_positive_infinity: i32::from(is_positive_infinity),
        }
    }
}

impl BitAnd for ExtendedInterval {
    type Output = Self;

    /// Intersection.
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self {
            min: std::cmp::max(
                if self.num_negative_infinity == 0 {
                    self.min
                } else {
                    i64::MIN
                },
                if rhs.num_negative_infinity == 0 {
                    rhs.min
                } else {
                    i64::MIN
                },
            ),
            max: std::cmp::min(
                if self.num_positive_infinity == 0 {
                    self.max
                } else {
                    i64::MAX
                },
                if rhs.num_positive_infinity == 0 {
                    rhs.max
                } else {
                    i64::MAX
                },
            ),
            num_negative_infinity: std::cmp::min(
                self.num_negative_infinity,
                rhs.num_negative_infinity,
            ),
            num_positive_infinity: std::cmp::min(
                self.num_positive_infinity,
                rhs.num_positive_infinity,
            ),
        }
    }
}

impl BitAndAssign for ExtendedInterval {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}

impl Add for ExtendedInterval {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            min: cap_add(self.min, rhs.min),
            max: cap_add(self.max, rhs.max),
            num_negative_infinity: self.num_negative_infinity + rhs.num_negative_infinity,
            num_positive_infinity: self.num_positive_infinity + rhs.num_positive_infinity,
        }
    }
}

impl Sub for ExtendedInterval {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            min: cap_sub(self.min, rhs.max),
            max: cap_sub(self.max, rhs.min),
            num_negative_infinity: self.num_negative_infinity + rhs.num_positive_infinity,
            num_positive_infinity: self.num_positive_infinity + rhs.num_negative_infinity,
        }
    }
}
