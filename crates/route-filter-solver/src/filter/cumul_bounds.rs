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

//! Cumul-bounds propagation filter (priority 2): delegates to an external
//! propagator that runs bound tightening over the dimension's precedence
//! graph under a candidate next assignment.

use crate::filter::filter_trait::{LocalSearchFilter, VarSnapshot};
use route_filter_core::prelude::SparseBitset;
use route_filter_model::assignment::Assignment;

/// External propagator: true iff cumul bounds stay consistent under the
/// candidate nexts.
pub type PropagatorCallback = Box<dyn FnMut(&dyn Fn(usize) -> Option<usize>) -> bool>;

pub struct CumulBoundsPropagatorFilter {
    propagator: PropagatorCallback,
    snapshot: VarSnapshot,
    delta_touched: SparseBitset,
    delta_nexts: Vec<usize>,
    name: String,
}

impl CumulBoundsPropagatorFilter {
    pub fn new(size: usize, dimension_name: &str, propagator: PropagatorCallback) -> Self {
        Self {
            propagator,
            snapshot: VarSnapshot::new(size),
            delta_touched: SparseBitset::new(size),
            delta_nexts: vec![0; size],
            name: format!("CumulBoundsPropagatorFilter({dimension_name})"),
        }
    }
}

impl LocalSearchFilter for CumulBoundsPropagatorFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, _objective_max: i64) -> bool {
        self.delta_touched.clear_all();
        for element in delta.elements() {
            let index = element.var;
            if index >= self.snapshot.size() {
                continue;
            }
            if !element.is_bound() {
                // LNS detected.
                return true;
            }
            self.delta_touched.set(index);
            self.delta_nexts[index] = element.value() as usize;
        }
        let snapshot = &self.snapshot;
        let delta_touched = &self.delta_touched;
        let delta_nexts = &self.delta_nexts;
        let next_accessor = move |index: usize| {
            if delta_touched.contains(index) {
                Some(delta_nexts[index])
            } else if snapshot.is_synced(index) {
                Some(snapshot.value(index) as usize)
            } else {
                None
            }
        };
        (self.propagator)(&next_accessor)
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.snapshot.synchronize(assignment, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::assignment::VarValue;

    #[test]
    fn test_accessor_prefers_delta_values() {
        let filter_verdict = std::rc::Rc::new(std::cell::Cell::new(true));
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let verdict = filter_verdict.clone();
        let mut filter = CumulBoundsPropagatorFilter::new(
            3,
            "time",
            Box::new(move |next| {
                seen_clone
                    .borrow_mut()
                    .push((next(0), next(1), next(2)));
                verdict.get()
            }),
        );
        filter.synchronize(&Assignment::from_next_values(&[1, 2, 0]), None);
        assert!(filter.accept(
            &Assignment::from_elements(vec![VarValue::bound(0, 2)]),
            i64::MIN,
            i64::MAX
        ));
        assert_eq!(seen.borrow().last(), Some(&(Some(2), Some(2), Some(0))));
        filter_verdict.set(false);
        assert!(!filter.accept(&Assignment::new(), i64::MIN, i64::MAX));
    }
}
