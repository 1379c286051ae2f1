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

//! Last-resort feasibility filter: replays the delta onto a scratch copy
//! of the committed assignment and asks an external constraint solver to
//! restore it. Expensive, so it belongs at the end of the filter chain.

use crate::filter::filter_trait::LocalSearchFilter;
use route_filter_model::assignment::{Assignment, VarValue};
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

/// External solve callback: true iff the assignment can be restored into a
/// feasible solution within the solver's limits.
pub type SolveCallback = Box<dyn FnMut(&Assignment) -> bool>;

pub struct CpFeasibilityFilter {
    model: Rc<RoutingModel>,
    solve: SolveCallback,
    values: Vec<i64>,
    active: Vec<bool>,
    temp_values: Vec<i64>,
    temp_active: Vec<bool>,
}

impl CpFeasibilityFilter {
    pub fn new(model: Rc<RoutingModel>, solve: SolveCallback) -> Self {
        let size = model.size();
        Self {
            model,
            solve,
            values: vec![0; size],
            active: vec![false; size],
            temp_values: vec![0; size],
            temp_active: vec![false; size],
        }
    }

    fn add_delta_to(
        model: &RoutingModel,
        delta: &Assignment,
        values: &mut [i64],
        active: &mut [bool],
    ) {
        for element in delta.elements() {
            let index = element.var;
            // Variables in the delta which are not next variables, such as
            // vehicle variables, are ignored.
            if index >= values.len() || !element.is_bound() {
                continue;
            }
            let value = element.value();
            values[index] = value;
            active[index] = true;
            if model.is_start(index) {
                let is_unused_route =
                    (value as usize) < model.num_nodes() && model.is_end(value as usize);
                // Do not restore unused routes; re-activate a start that
                // was deactivated before.
                active[index] = !is_unused_route;
            }
        }
    }

    fn as_assignment(values: &[i64], active: &[bool]) -> Assignment {
        Assignment::from_elements(
            values
                .iter()
                .zip(active)
                .enumerate()
                .filter(|(_, (_, &is_active))| is_active)
                .map(|(var, (&value, _))| VarValue::bound(var, value))
                .collect(),
        )
    }
}

impl LocalSearchFilter for CpFeasibilityFilter {
    fn name(&self) -> &str {
        "CpFeasibilityFilter"
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, _objective_max: i64) -> bool {
        if delta.elements().iter().any(|element| !element.is_bound()) {
            // LNS detected.
            return true;
        }
        self.temp_values.copy_from_slice(&self.values);
        self.temp_active.copy_from_slice(&self.active);
        Self::add_delta_to(
            &self.model,
            delta,
            &mut self.temp_values,
            &mut self.temp_active,
        );
        let assignment = Self::as_assignment(&self.temp_values, &self.temp_active);
        (self.solve)(&assignment)
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        let applied = match delta {
            Some(delta) if !delta.is_empty() => delta,
            _ => assignment,
        };
        Self::add_delta_to(&self.model, applied, &mut self.values, &mut self.active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn bound(pairs: &[(usize, i64)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value))
                .collect(),
        )
    }

    #[test]
    fn test_scratch_assignment_reaches_solver() {
        let model = Rc::new(RoutingModel::builder(2, 1).build().unwrap());
        let seen: Rc<RefCell<Vec<Assignment>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut filter = CpFeasibilityFilter::new(
            model,
            Box::new(move |assignment| {
                seen_clone.borrow_mut().push(assignment.clone());
                true
            }),
        );
        filter.synchronize(&bound(&[(2, 0), (0, 1), (1, 3)]), None);
        assert!(filter.accept(&bound(&[(0, 3), (1, 1)]), i64::MIN, i64::MAX));
        let last = seen.borrow().last().cloned().unwrap();
        // The scratch assignment reflects committed values plus the delta.
        assert!(last
            .elements()
            .contains(&VarValue::bound(0, 3)));
        assert!(last.elements().contains(&VarValue::bound(2, 0)));
    }

    #[test]
    fn test_unused_route_start_is_deactivated() {
        let model = Rc::new(RoutingModel::builder(2, 1).build().unwrap());
        let seen: Rc<RefCell<Vec<Assignment>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut filter = CpFeasibilityFilter::new(
            model,
            Box::new(move |assignment| {
                seen_clone.borrow_mut().push(assignment.clone());
                true
            }),
        );
        // Start 2 points to end 3: the route is unused and not restored.
        filter.synchronize(&bound(&[(2, 3), (0, 0), (1, 1)]), None);
        assert!(filter.accept(&bound(&[(0, 1)]), i64::MIN, i64::MAX));
        let last = seen.borrow().last().cloned().unwrap();
        assert!(!last.elements().iter().any(|element| element.var == 2));
    }

    #[test]
    fn test_solver_verdict_is_followed() {
        let model = Rc::new(RoutingModel::builder(2, 1).build().unwrap());
        let mut filter = CpFeasibilityFilter::new(model, Box::new(|_| false));
        filter.synchronize(&bound(&[(2, 3), (0, 0), (1, 1)]), None);
        assert!(!filter.accept(&bound(&[(0, 1)]), i64::MIN, i64::MAX));
    }
}
