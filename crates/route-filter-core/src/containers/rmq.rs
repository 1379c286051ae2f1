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

use crate::math::bits::most_significant_bit_position;

/// Sparse-table range-minimum query over an append-only `i64` sequence.
///
/// Elements are pushed in batches; `make_table_from_new_elements` builds the
/// table rows for the pending batch. Queries must not span two batches: the
/// callers index one committed path per batch, and a chain never crosses a
/// path boundary.
#[derive(Debug, Clone, Default)]
pub struct RangeMinimumQuery {
    array: Vec<i64>,
    // table[l][i] = min of array[i..i + 2^l], windows confined to one batch.
    table: Vec<Vec<i64>>,
    batch_begin: usize,
}

impl RangeMinimumQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push_back(&mut self, value: i64) {
        self.array.push(value);
    }

    #[inline]
    pub fn table_size(&self) -> usize {
        self.array.len()
    }

    #[inline]
    pub fn array(&self) -> &[i64] {
        &self.array
    }

    pub fn clear(&mut self) {
        self.array.clear();
        for layer in &mut self.table {
            layer.clear();
        }
        self.batch_begin = 0;
    }

    /// Builds table rows for elements pushed since the last call.
    pub fn make_table_from_new_elements(&mut self) {
        let begin = self.batch_begin;
        let end = self.array.len();
        self.batch_begin = end;
        if begin >= end {
            return;
        }
        let max_layer = most_significant_bit_position(end - begin);
        if self.table.len() <= max_layer {
            self.table.resize(max_layer + 1, Vec::new());
        }
        self.table[0].resize(end, 0);
        self.table[0][begin..end].copy_from_slice(&self.array[begin..end]);
        for layer in 1..=max_layer {
            let window = 1usize << layer;
            let half = window / 2;
            // Split borrow: previous layer is read-only while this layer fills.
            let (previous_layers, current_layers) = self.table.split_at_mut(layer);
            let previous = &previous_layers[layer - 1];
            let current = &mut current_layers[0];
            current.resize(end, 0);
            for i in begin..end {
                current[i] = if i + window <= end {
                    std::cmp::min(previous[i], previous[i + half])
                } else {
                    previous[i]
                };
            }
        }
    }

    /// Minimum of `array[first..=last]`. Both bounds inclusive and within
    /// one batch.
    pub fn range_minimum(&self, first: usize, last: usize) -> i64 {
        debug_assert!(first <= last);
        debug_assert!(last < self.array.len());
        let length = last - first + 1;
        let layer = most_significant_bit_position(length);
        let window = 1usize << layer;
        std::cmp::min(self.table[layer][first], self.table[layer][last + 1 - window])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_single_batch_queries() {
        let mut rmq = RangeMinimumQuery::new();
        for value in [5, 3, 8, 1, 9, 2] {
            rmq.push_back(value);
        }
        rmq.make_table_from_new_elements();
        assert_eq!(rmq.range_minimum(0, 5), 1);
        assert_eq!(rmq.range_minimum(0, 2), 3);
        assert_eq!(rmq.range_minimum(4, 5), 2);
        assert_eq!(rmq.range_minimum(4, 4), 9);
    }

    #[test]
    fn test_batched_queries_match_naive_scan() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut rmq = RangeMinimumQuery::new();
        let mut batches: Vec<(usize, usize)> = Vec::new();
        for _ in 0..5 {
            let begin = rmq.table_size();
            let batch_len = rng.gen_range(1..20);
            for _ in 0..batch_len {
                rmq.push_back(rng.gen_range(-1000..1000));
            }
            rmq.make_table_from_new_elements();
            batches.push((begin, rmq.table_size()));
        }
        for &(begin, end) in &batches {
            for first in begin..end {
                for last in first..end {
                    let expected = *rmq.array()[first..=last].iter().min().unwrap();
                    assert_eq!(rmq.range_minimum(first, last), expected);
                }
            }
        }
    }
}
