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

/// A vector with revertible per-index edits.
///
/// Reads prefer the shadow value when an index was written since the last
/// `commit`/`revert`; `changed_indices` enumerates exactly those indices.
/// Epoch-marking makes `revert` O(changed), so an abandoned neighbor costs
/// only as much as the delta that produced it.
#[derive(Debug, Clone)]
pub struct CommittableVector<T: Copy> {
    committed: Vec<T>,
    shadow: Vec<T>,
    marks: Vec<u32>,
    epoch: u32,
    changed: Vec<usize>,
}

impl<T: Copy> CommittableVector<T> {
    pub fn new(len: usize, value: T) -> Self {
        Self {
            committed: vec![value; len],
            shadow: vec![value; len],
            marks: vec![0; len],
            epoch: 1,
            changed: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> T {
        if self.marks[index] == self.epoch {
            self.shadow[index]
        } else {
            self.committed[index]
        }
    }

    #[inline]
    pub fn get_committed(&self, index: usize) -> T {
        self.committed[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        if self.marks[index] != self.epoch {
            self.marks[index] = self.epoch;
            self.changed.push(index);
        }
        self.shadow[index] = value;
    }

    #[inline]
    pub fn changed_indices(&self) -> &[usize] {
        &self.changed
    }

    /// Flushes shadow values into the committed array.
    pub fn commit(&mut self) {
        for &index in &self.changed {
            self.committed[index] = self.shadow[index];
        }
        self.bump_epoch();
    }

    /// Drops all shadow values.
    pub fn revert(&mut self) {
        self.bump_epoch();
    }

    fn bump_epoch(&mut self) {
        self.changed.clear();
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.marks.fill(0);
            self.epoch = 1;
        }
    }
}
