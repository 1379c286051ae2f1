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

/// Bitset with O(1) set and O(changed) sparse clearing.
///
/// `positions_set_at_least_once` records every bit that was set since the
/// last clear, even if the bit was cleared again afterwards. This is the
/// enumeration filters iterate to find touched paths/nodes without paying
/// O(capacity) per neighbor.
#[derive(Debug, Clone, Default)]
pub struct SparseBitset {
    bits: Vec<bool>,
    positions: Vec<usize>,
}

impl SparseBitset {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![false; capacity],
            positions: Vec::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.bits.len());
        if !self.bits[bit] {
            self.bits[bit] = true;
            self.positions.push(bit);
        }
    }

    /// Clears the bit but keeps it in `positions_set_at_least_once`.
    #[inline]
    pub fn clear_bit(&mut self, bit: usize) {
        debug_assert!(bit < self.bits.len());
        self.bits[bit] = false;
    }

    #[inline]
    pub fn contains(&self, bit: usize) -> bool {
        self.bits.get(bit).copied().unwrap_or(false)
    }

    #[inline]
    pub fn positions_set_at_least_once(&self) -> &[usize] {
        &self.positions
    }

    /// Clears only the recorded positions. O(changed).
    #[inline]
    pub fn sparse_clear_all(&mut self) {
        for &bit in &self.positions {
            self.bits[bit] = false;
        }
        self.positions.clear();
    }

    /// Clears everything. O(capacity).
    #[inline]
    pub fn clear_all(&mut self) {
        self.bits.fill(false);
        self.positions.clear();
    }
}
