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

/// Position of the most significant set bit, i.e. `floor(log2(x))`.
/// Returns 0 for `x == 0`.
#[inline]
pub const fn most_significant_bit_position(x: usize) -> usize {
    if x == 0 {
        0
    } else {
        (usize::BITS - 1 - x.leading_zeros()) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_significant_bit_position() {
        assert_eq!(most_significant_bit_position(0), 0);
        assert_eq!(most_significant_bit_position(1), 0);
        assert_eq!(most_significant_bit_position(2), 1);
        assert_eq!(most_significant_bit_position(3), 1);
        assert_eq!(most_significant_bit_position(4), 2);
        assert_eq!(most_significant_bit_position(255), 7);
        assert_eq!(most_significant_bit_position(256), 8);
    }
}
