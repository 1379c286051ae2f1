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

use crate::math::cap::{cap_add, cap_prod, cap_sub};

/// One segment of a piecewise-linear function, valid on `[start_x, next
/// segment's start_x)`, or to `+inf` for the last segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_x: i64,
    pub y_at_start: i64,
    pub slope: i64,
}

/// Piecewise-linear cost over `i64`, evaluated with saturating arithmetic.
/// Inputs below the first segment evaluate to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiecewiseLinearFunction {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnsortedSegmentsError;

impl std::fmt::Display for UnsortedSegmentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Piecewise segments must have strictly increasing start_x.")
    }
}

impl std::error::Error for UnsortedSegmentsError {}

impl PiecewiseLinearFunction {
    pub fn new(segments: Vec<Segment>) -> Result<Self, UnsortedSegmentsError> {
        if segments
            .windows(2)
            .any(|pair| pair[0].start_x >= pair[1].start_x)
        {
            return Err(UnsortedSegmentsError);
        }
        Ok(Self { segments })
    }

    /// Single-segment convenience: `coefficient * max(0, x - bound)`.
    pub fn soft_upper_bound_penalty(bound: i64, coefficient: i64) -> Self {
        Self {
            segments: vec![Segment {
                start_x: bound,
                y_at_start: 0,
                slope: coefficient,
            }],
        }
    }

    pub fn value(&self, x: i64) -> i64 {
        let position = self.segments.partition_point(|s| s.start_x <= x);
        if position == 0 {
            return 0;
        }
        let segment = self.segments[position - 1];
        cap_add(
            segment.y_at_start,
            cap_prod(segment.slope, cap_sub(x, segment.start_x)),
        )
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsorted_segments() {
        let result = PiecewiseLinearFunction::new(vec![
            Segment {
                start_x: 5,
                y_at_start: 0,
                slope: 1,
            },
            Segment {
                start_x: 5,
                y_at_start: 3,
                slope: 2,
            },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_across_segments() {
        let f = PiecewiseLinearFunction::new(vec![
            Segment {
                start_x: 0,
                y_at_start: 0,
                slope: 2,
            },
            Segment {
                start_x: 10,
                y_at_start: 20,
                slope: 5,
            },
        ])
        .unwrap();
        assert_eq!(f.value(-1), 0);
        assert_eq!(f.value(0), 0);
        assert_eq!(f.value(4), 8);
        assert_eq!(f.value(10), 20);
        assert_eq!(f.value(12), 30);
    }

    #[test]
    fn test_soft_upper_bound_penalty_shape() {
        let f = PiecewiseLinearFunction::soft_upper_bound_penalty(30, 7);
        assert_eq!(f.value(29), 0);
        assert_eq!(f.value(30), 0);
        assert_eq!(f.value(33), 21);
    }

    #[test]
    fn test_value_saturates() {
        let f = PiecewiseLinearFunction::soft_upper_bound_penalty(0, i64::MAX);
        assert_eq!(f.value(2), i64::MAX);
    }
}
