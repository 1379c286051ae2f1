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

use crate::checker::energy_checker::PathEnergyCostChecker;
use crate::filter::filter_trait::LocalSearchFilter;
use route_filter_model::assignment::Assignment;

/// Adapts a `PathEnergyCostChecker` to the filter contract.
pub struct PathEnergyCostFilter {
    checker: PathEnergyCostChecker,
    name: String,
}

impl PathEnergyCostFilter {
    pub fn new(checker: PathEnergyCostChecker, energy_name: &str) -> Self {
        Self {
            checker,
            name: format!("PathEnergyCostFilter({energy_name})"),
        }
    }

    #[inline]
    pub fn checker(&self) -> &PathEnergyCostChecker {
        &self.checker
    }
}

impl LocalSearchFilter for PathEnergyCostFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, _delta: &Assignment, objective_min: i64, objective_max: i64) -> bool {
        if objective_max > i64::MAX / 2 {
            return true;
        }
        if !self.checker.check() {
            return false;
        }
        let cost = self.checker.accepted_cost();
        objective_min <= cost && cost <= objective_max
    }

    fn synchronize(&mut self, _assignment: &Assignment, _delta: Option<&Assignment>) {
        self.checker.commit();
    }

    fn accepted_objective_value(&self) -> i64 {
        self.checker.accepted_cost()
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.checker.committed_cost()
    }
}
