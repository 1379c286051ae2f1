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

//! Weighted wavelet tree over an append-only sequence of (height, weight)
//! pairs, answering `sum of weights with height >= threshold` on a range.
//!
//! Elements are appended in batches; each batch builds its own subtree
//! (its own range of pivot nodes) and extends all layers, so queries must
//! stay within one batch. Callers index one committed path per batch.

use route_filter_core::prelude::{cap_add, most_significant_bit_position};

#[derive(Debug, Clone, Copy)]
struct Element {
    height: i64,
    weight: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TreeNode {
    pivot_height: i64,
    // Sequence index where this pivot's right child begins; filled during
    // construction.
    pivot_index: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct ElementInfo {
    // Prefix sum of weights within the node's range at this layer.
    prefix_sum: i64,
    // Index in the next layer of this element's image if it goes left,
    // otherwise of the next left-going element.
    left_index: usize,
    is_left: bool,
}

#[derive(Debug, Clone, Copy)]
struct TreeLocation {
    node_begin: usize,
    node_end: usize,
    sequence_first: usize,
}

/// Range of elements within one tree node's sequence slice, inclusive.
#[derive(Debug, Clone, Copy)]
struct ElementRange {
    first: i64,
    last: i64,
    first_is_node_first: bool,
}

impl ElementRange {
    #[inline]
    fn is_empty(&self) -> bool {
        self.first > self.last
    }

    #[inline]
    fn sum(&self, layer: &[ElementInfo]) -> i64 {
        let last_sum = layer[self.last as usize].prefix_sum;
        if self.first_is_node_first {
            last_sum
        } else {
            last_sum - layer[(self.first - 1) as usize].prefix_sum
        }
    }

    fn left_sub_range(&self, layer: &[ElementInfo], node_first_sequence: i64) -> ElementRange {
        let first = layer[self.first as usize].left_index as i64;
        let last_info = layer[self.last as usize];
        let last = if last_info.is_left {
            last_info.left_index as i64
        } else {
            last_info.left_index as i64 - 1
        };
        ElementRange {
            first,
            last,
            first_is_node_first: first == node_first_sequence,
        }
    }

    fn right_sub_range(&self, layer: &[ElementInfo], pivot_index: usize) -> ElementRange {
        let pivot_index = pivot_index as i64;
        let first = pivot_index + (self.first - layer[self.first as usize].left_index as i64);
        let last_info = layer[self.last as usize];
        let last = pivot_index + (self.last - last_info.left_index as i64)
            - i64::from(last_info.is_left);
        ElementRange {
            first,
            last,
            first_is_node_first: first == pivot_index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightedWaveletTree {
    elements: Vec<Element>,
    tree_location: Vec<TreeLocation>,
    nodes: Vec<TreeNode>,
    tree_layers: Vec<Vec<ElementInfo>>,
}

impl WeightedWaveletTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of indexed or pending elements.
    #[inline]
    pub fn tree_size(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn push_back(&mut self, height: i64, weight: i64) {
        self.elements.push(Element { height, weight });
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.tree_location.clear();
        self.nodes.clear();
        for layer in &mut self.tree_layers {
            layer.clear();
        }
    }

    /// Indexes the batch of elements pushed since the last call.
    pub fn make_tree_from_new_elements(&mut self) {
        let begin_index = self.tree_location.len();
        let end_index = self.elements.len();
        debug_assert!(begin_index <= end_index);
        if begin_index >= end_index {
            return;
        }
        // The batch's pivot heights are its distinct element heights, in
        // order; an in-order traversal of the subtree.
        let old_node_size = self.nodes.len();
        for i in begin_index..end_index {
            self.nodes.push(TreeNode {
                pivot_height: self.elements[i].height,
                pivot_index: usize::MAX,
            });
        }
        self.nodes[old_node_size..].sort_unstable_by_key(|node| node.pivot_height);
        self.dedup_new_nodes(old_node_size);
        let new_node_size = self.nodes.len();

        self.tree_location.resize(
            end_index,
            TreeLocation {
                node_begin: old_node_size,
                node_end: new_node_size,
                sequence_first: begin_index,
            },
        );

        // 1 + ceil(log2(number of pivots)) layers serve this batch.
        let num_layers = 2 + most_significant_bit_position(new_node_size - old_node_size - 1);
        if self.tree_layers.len() < num_layers {
            self.tree_layers.resize(num_layers, Vec::new());
        }
        for layer in &mut self.tree_layers {
            layer.resize(end_index, ElementInfo::default());
        }

        self.fill_subtree(0, old_node_size, new_node_size, begin_index, end_index);
    }

    fn dedup_new_nodes(&mut self, old_node_size: usize) {
        let mut write = old_node_size;
        for read in old_node_size..self.nodes.len() {
            if write == old_node_size
                || self.nodes[write - 1].pivot_height != self.nodes[read].pivot_height
            {
                self.nodes[write] = self.nodes[read];
                write += 1;
            }
        }
        self.nodes.truncate(write);
    }

    fn fill_subtree(
        &mut self,
        layer: usize,
        node_begin: usize,
        node_end: usize,
        range_begin: usize,
        range_end: usize,
    ) {
        debug_assert!(node_begin < node_end);
        debug_assert!(range_begin < range_end);
        let mut sum = 0;
        for i in range_begin..range_end {
            sum = cap_add(sum, self.elements[i].weight);
            self.tree_layers[layer][i].prefix_sum = sum;
        }
        if node_begin + 1 == node_end {
            return;
        }
        // More than one pivot height: partition around the median pivot and
        // record where each element lands in the next layer.
        let node_mid = node_begin + (node_end - node_begin) / 2;
        let pivot_height = self.nodes[node_mid].pivot_height;
        let mut pivot_index = range_begin;
        for i in range_begin..range_end {
            let is_left = self.elements[i].height < pivot_height;
            self.tree_layers[layer][i].left_index = pivot_index;
            self.tree_layers[layer][i].is_left = is_left;
            if is_left {
                pivot_index += 1;
            }
        }
        self.nodes[node_mid].pivot_index = pivot_index;
        self.stable_partition(range_begin, range_end, pivot_height);

        self.fill_subtree(layer + 1, node_begin, node_mid, range_begin, pivot_index);
        self.fill_subtree(layer + 1, node_mid, node_end, pivot_index, range_end);
    }

    fn stable_partition(&mut self, range_begin: usize, range_end: usize, pivot_height: i64) {
        let mut left: Vec<Element> = Vec::with_capacity(range_end - range_begin);
        let mut right: Vec<Element> = Vec::new();
        for i in range_begin..range_end {
            let element = self.elements[i];
            if element.height < pivot_height {
                left.push(element);
            } else {
                right.push(element);
            }
        }
        self.elements[range_begin..range_begin + left.len()].copy_from_slice(&left);
        self.elements[range_begin + left.len()..range_end].copy_from_slice(&right);
    }

    /// `sum { weight[i] : begin_index <= i < end_index, height[i] >=
    /// threshold }`. The range must lie within a single batch.
    pub fn range_sum_with_threshold(
        &self,
        threshold_height: i64,
        begin_index: usize,
        end_index: usize,
    ) -> i64 {
        debug_assert!(begin_index <= end_index);
        debug_assert!(end_index <= self.tree_location.len());
        // No pending elements.
        debug_assert_eq!(self.tree_location.len(), self.elements.len());
        if begin_index >= end_index {
            return 0;
        }
        let TreeLocation {
            mut node_begin,
            mut node_end,
            sequence_first,
        } = self.tree_location[begin_index];
        debug_assert_eq!(
            self.tree_location[end_index - 1].sequence_first,
            sequence_first
        );
        let mut range = ElementRange {
            first: begin_index as i64,
            last: end_index as i64 - 1,
            first_is_node_first: begin_index == sequence_first,
        };
        // O(1) when every height is below the threshold.
        if self.nodes[node_end - 1].pivot_height < threshold_height {
            return 0;
        }

        let mut sum = 0;
        let mut node_first_sequence = sequence_first as i64;
        let mut min_height_of_current_node = self.nodes[node_begin].pivot_height;
        let mut layer = 0;
        while !range.is_empty() {
            let elements = &self.tree_layers[layer];
            if threshold_height <= min_height_of_current_node {
                // The threshold covers every element of this node.
                sum = cap_add(sum, range.sum(elements));
                return sum;
            } else if node_begin + 1 == node_end {
                // Leaf below the threshold.
                return sum;
            }

            let node_mid = node_begin + (node_end - node_begin) / 2;
            let TreeNode {
                pivot_height,
                pivot_index,
            } = self.nodes[node_mid];
            let right = range.right_sub_range(elements, pivot_index);
            if threshold_height < pivot_height {
                // Everything right of the pivot clears the threshold; count
                // it wholesale and descend left.
                if !right.is_empty() {
                    sum = cap_add(sum, right.sum(&self.tree_layers[layer + 1]));
                }
                range = range.left_sub_range(elements, node_first_sequence);
                node_end = node_mid;
            } else {
                range = right;
                node_begin = node_mid;
                node_first_sequence = pivot_index as i64;
                min_height_of_current_node = pivot_height;
            }
            layer += 1;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn tree_of(pairs: &[(i64, i64)]) -> WeightedWaveletTree {
        let mut tree = WeightedWaveletTree::new();
        for &(height, weight) in pairs {
            tree.push_back(height, weight);
        }
        tree.make_tree_from_new_elements();
        tree
    }

    #[test]
    fn test_threshold_sums_over_full_range() {
        let tree = tree_of(&[(5, 1), (2, 2), (7, 3), (5, 4)]);
        assert_eq!(tree.range_sum_with_threshold(5, 0, 4), 8);
        assert_eq!(tree.range_sum_with_threshold(6, 0, 4), 3);
        assert_eq!(tree.range_sum_with_threshold(8, 0, 4), 0);
        assert_eq!(tree.range_sum_with_threshold(i64::MIN, 0, 4), 10);
    }

    #[test]
    fn test_threshold_sums_over_subranges() {
        let tree = tree_of(&[(5, 1), (2, 2), (7, 3), (5, 4)]);
        assert_eq!(tree.range_sum_with_threshold(5, 1, 3), 3);
        assert_eq!(tree.range_sum_with_threshold(2, 1, 3), 5);
        assert_eq!(tree.range_sum_with_threshold(5, 2, 2), 0);
        assert_eq!(tree.range_sum_with_threshold(5, 3, 4), 4);
    }

    #[test]
    fn test_single_height_batch() {
        let tree = tree_of(&[(4, 10), (4, 20), (4, 30)]);
        assert_eq!(tree.range_sum_with_threshold(4, 0, 3), 60);
        assert_eq!(tree.range_sum_with_threshold(5, 0, 3), 0);
        assert_eq!(tree.range_sum_with_threshold(4, 1, 2), 20);
    }

    #[test]
    fn test_batches_are_independent() {
        let mut tree = WeightedWaveletTree::new();
        for &(height, weight) in &[(1i64, 1i64), (9, 2)] {
            tree.push_back(height, weight);
        }
        tree.make_tree_from_new_elements();
        for &(height, weight) in &[(3i64, 5i64), (8, 6), (2, 7)] {
            tree.push_back(height, weight);
        }
        tree.make_tree_from_new_elements();
        assert_eq!(tree.range_sum_with_threshold(2, 0, 2), 2);
        assert_eq!(tree.range_sum_with_threshold(2, 2, 5), 18);
        assert_eq!(tree.range_sum_with_threshold(4, 2, 5), 6);
        assert_eq!(tree.range_sum_with_threshold(3, 3, 5), 6);
    }

    #[test]
    fn test_random_queries_match_naive_sum() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut tree = WeightedWaveletTree::new();
        let mut batches: Vec<(usize, usize, Vec<(i64, i64)>)> = Vec::new();
        let mut total = 0;
        for _ in 0..6 {
            let batch_len = rng.gen_range(1..30);
            let mut batch = Vec::new();
            for _ in 0..batch_len {
                let height = rng.gen_range(-10..10);
                let weight = rng.gen_range(-100..100);
                tree.push_back(height, weight);
                batch.push((height, weight));
            }
            tree.make_tree_from_new_elements();
            batches.push((total, total + batch_len, batch));
            total += batch_len;
        }
        for (begin, _end, batch) in &batches {
            for _ in 0..200 {
                let a = rng.gen_range(0..=batch.len());
                let b = rng.gen_range(a..=batch.len());
                let threshold = rng.gen_range(-12..12);
                let expected: i64 = batch[a..b]
                    .iter()
                    .filter(|&&(height, _)| height >= threshold)
                    .map(|&(_, weight)| weight)
                    .sum();
                assert_eq!(
                    tree.range_sum_with_threshold(threshold, begin + a, begin + b),
                    expected,
                    "batch {begin} range [{a}, {b}) threshold {threshold}"
                );
            }
        }
    }
}
