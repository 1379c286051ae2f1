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

//! Static path topology: which node starts and ends each vehicle's path.
//!
//! Node ids live in `[0, num_nodes)`. Every node except the per-vehicle
//! ends carries a next variable, so `size()` (the next-variable count)
//! equals `num_nodes - num_paths`, and `node < size()` tests "not an end".

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsMetadata {
    starts: Vec<usize>,
    ends: Vec<usize>,
    is_start: Vec<bool>,
    is_end: Vec<bool>,
    vehicle_of: Vec<Option<usize>>,
    size: usize,
    num_nodes: usize,
}

impl PathsMetadata {
    /// `size` is the number of next variables; ends must all be `>= size`.
    pub fn new(size: usize, num_nodes: usize, starts: Vec<usize>, ends: Vec<usize>) -> Self {
        debug_assert_eq!(starts.len(), ends.len());
        let mut is_start = vec![false; num_nodes];
        let mut is_end = vec![false; num_nodes];
        let mut vehicle_of = vec![None; num_nodes];
        for (vehicle, (&start, &end)) in starts.iter().zip(ends.iter()).enumerate() {
            debug_assert!(start < size);
            debug_assert!(end < num_nodes);
            is_start[start] = true;
            is_end[end] = true;
            vehicle_of[start] = Some(vehicle);
            vehicle_of[end] = Some(vehicle);
        }
        Self {
            starts,
            ends,
            is_start,
            is_end,
            vehicle_of,
            size,
            num_nodes,
        }
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.starts.len()
    }

    /// Number of next variables.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline]
    pub fn start(&self, vehicle: usize) -> usize {
        self.starts[vehicle]
    }

    #[inline]
    pub fn end(&self, vehicle: usize) -> usize {
        self.ends[vehicle]
    }

    #[inline]
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    #[inline]
    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    #[inline]
    pub fn is_start(&self, node: usize) -> bool {
        self.is_start[node]
    }

    #[inline]
    pub fn is_end(&self, node: usize) -> bool {
        self.is_end[node]
    }

    /// The vehicle owning `node`, when `node` is a start or an end.
    #[inline]
    pub fn vehicle_of(&self, node: usize) -> Option<usize> {
        self.vehicle_of[node]
    }
}
