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

//! Read-only view onto the search engine's variable substrate.
//!
//! Filters never own or mutate solver variables; they only iterate delta
//! elements and snapshot committed values. A `VarValue` with `min != max`
//! is an unbound variable, which filters interpret as large-neighborhood
//! search.

/// One element of an assignment: the domain of a next variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarValue {
    pub var: usize,
    pub min: i64,
    pub max: i64,
}

impl VarValue {
    #[inline]
    pub fn bound(var: usize, value: i64) -> Self {
        Self {
            var,
            min: value,
            max: value,
        }
    }

    #[inline]
    pub fn unbound(var: usize, min: i64, max: i64) -> Self {
        Self { var, min, max }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.min == self.max
    }

    /// The bound value. Only meaningful when `is_bound()`.
    #[inline]
    pub fn value(&self) -> i64 {
        debug_assert!(self.is_bound());
        self.min
    }
}

/// An ordered collection of variable elements. Serves both as the full
/// committed assignment and as the per-neighbor delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    elements: Vec<VarValue>,
}

impl Assignment {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<VarValue>) -> Self {
        Self { elements }
    }

    /// Builds a fully bound assignment from consecutive next values.
    pub fn from_next_values(values: &[i64]) -> Self {
        Self {
            elements: values
                .iter()
                .enumerate()
                .map(|(var, &value)| VarValue::bound(var, value))
                .collect(),
        }
    }

    #[inline]
    pub fn push(&mut self, element: VarValue) {
        self.elements.push(element);
    }

    #[inline]
    pub fn elements(&self) -> &[VarValue] {
        &self.elements
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_detection() {
        assert!(VarValue::bound(0, 5).is_bound());
        assert!(!VarValue::unbound(0, 1, 5).is_bound());
        assert_eq!(VarValue::bound(3, 9).value(), 9);
    }

    #[test]
    fn test_from_next_values() {
        let assignment = Assignment::from_next_values(&[1, 2, 0]);
        assert_eq!(assignment.len(), 3);
        assert_eq!(assignment.elements()[2], VarValue::bound(2, 0));
    }
}
