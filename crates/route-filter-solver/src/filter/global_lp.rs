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

//! Whole-fleet LP cumul filter (priority 4): schedules all routes at once
//! through a global optimizer, escalating from LP to MIP when the LP only
//! reaches relaxed optimality.

use crate::filter::filter_trait::{LocalSearchFilter, VarSnapshot};
use crate::optim::{DimensionSchedulingStatus, GlobalCumulOptimizer};
use route_filter_core::prelude::SparseBitset;
use route_filter_model::assignment::Assignment;
use route_filter_model::problem::model::RoutingModel;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedGlobalCumulOptimizer = Rc<RefCell<dyn GlobalCumulOptimizer>>;

pub struct GlobalLpCumulFilter {
    model: Rc<RoutingModel>,
    lp_optimizer: SharedGlobalCumulOptimizer,
    mp_optimizer: SharedGlobalCumulOptimizer,
    filter_objective_cost: bool,
    synchronized_cost_without_transit: i64,
    delta_cost_without_transit: i64,
    snapshot: VarSnapshot,
    delta_touched: SparseBitset,
    delta_nexts: Vec<usize>,
    name: String,
}

impl GlobalLpCumulFilter {
    pub fn new(
        model: Rc<RoutingModel>,
        lp_optimizer: SharedGlobalCumulOptimizer,
        mp_optimizer: SharedGlobalCumulOptimizer,
        filter_objective_cost: bool,
        dimension_name: &str,
    ) -> Self {
        let size = model.size();
        Self {
            model,
            lp_optimizer,
            mp_optimizer,
            filter_objective_cost,
            synchronized_cost_without_transit: -1,
            delta_cost_without_transit: -1,
            snapshot: VarSnapshot::new(size),
            delta_touched: SparseBitset::new(size),
            delta_nexts: vec![0; size],
            name: format!("GlobalLpCumulFilter({dimension_name})"),
        }
    }
}

impl LocalSearchFilter for GlobalLpCumulFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, objective_max: i64) -> bool {
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

        if !self.filter_objective_cost {
            // Feasibility only.
            self.delta_cost_without_transit = 0;
            let status = self.lp_optimizer.borrow_mut().compute_cumuls(&next_accessor);
            if status == DimensionSchedulingStatus::Optimal {
                return true;
            }
            return status == DimensionSchedulingStatus::RelaxedOptimalOnly
                && self.mp_optimizer.borrow_mut().compute_cumuls(&next_accessor)
                    == DimensionSchedulingStatus::Optimal;
        }

        let status = self
            .lp_optimizer
            .borrow_mut()
            .compute_cumul_cost_without_fixed_transits(
                &next_accessor,
                &mut self.delta_cost_without_transit,
            );
        if status == DimensionSchedulingStatus::Infeasible {
            self.delta_cost_without_transit = i64::MAX;
            return false;
        }
        if self.delta_cost_without_transit > objective_max {
            return false;
        }
        if status == DimensionSchedulingStatus::RelaxedOptimalOnly
            && self
                .mp_optimizer
                .borrow_mut()
                .compute_cumul_cost_without_fixed_transits(
                    &next_accessor,
                    &mut self.delta_cost_without_transit,
                )
                != DimensionSchedulingStatus::Optimal
        {
            self.delta_cost_without_transit = i64::MAX;
            return false;
        }
        self.delta_cost_without_transit <= objective_max
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.snapshot.synchronize(assignment, delta);
        let model = self.model.clone();
        let snapshot = &self.snapshot;
        let next_accessor = move |index: usize| {
            if snapshot.is_synced(index) {
                Some(snapshot.value(index) as usize)
            } else if model.is_start(index) {
                model.paths().vehicle_of(index).map(|vehicle| model.end(vehicle))
            } else {
                Some(index)
            }
        };
        if !self.filter_objective_cost {
            self.synchronized_cost_without_transit = 0;
        }
        let mut status = if self.filter_objective_cost {
            self.lp_optimizer
                .borrow_mut()
                .compute_cumul_cost_without_fixed_transits(
                    &next_accessor,
                    &mut self.synchronized_cost_without_transit,
                )
        } else {
            self.lp_optimizer.borrow_mut().compute_cumuls(&next_accessor)
        };
        if status == DimensionSchedulingStatus::Infeasible {
            // Can only come from a solver timeout; the committed cost is
            // left untracked rather than wrong.
            self.synchronized_cost_without_transit = 0;
        }
        if status == DimensionSchedulingStatus::RelaxedOptimalOnly {
            status = if self.filter_objective_cost {
                self.mp_optimizer
                    .borrow_mut()
                    .compute_cumul_cost_without_fixed_transits(
                        &next_accessor,
                        &mut self.synchronized_cost_without_transit,
                    )
            } else {
                self.mp_optimizer.borrow_mut().compute_cumuls(&next_accessor)
            };
            if status != DimensionSchedulingStatus::Optimal {
                self.synchronized_cost_without_transit = 0;
            }
        }
    }

    fn accepted_objective_value(&self) -> i64 {
        self.delta_cost_without_transit
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.synchronized_cost_without_transit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedGlobalOptimizer {
        status: DimensionSchedulingStatus,
        cost: i64,
    }

    impl GlobalCumulOptimizer for ScriptedGlobalOptimizer {
        fn compute_cumuls(
            &mut self,
            _next_accessor: &dyn Fn(usize) -> Option<usize>,
        ) -> DimensionSchedulingStatus {
            self.status
        }

        fn compute_cumul_cost_without_fixed_transits(
            &mut self,
            _next_accessor: &dyn Fn(usize) -> Option<usize>,
            cost: &mut i64,
        ) -> DimensionSchedulingStatus {
            *cost = self.cost;
            self.status
        }
    }

    fn filter_with(
        lp_status: DimensionSchedulingStatus,
        lp_cost: i64,
        mp_status: DimensionSchedulingStatus,
        mp_cost: i64,
    ) -> GlobalLpCumulFilter {
        let model = Rc::new(RoutingModel::builder(2, 1).build().unwrap());
        GlobalLpCumulFilter::new(
            model,
            Rc::new(RefCell::new(ScriptedGlobalOptimizer {
                status: lp_status,
                cost: lp_cost,
            })),
            Rc::new(RefCell::new(ScriptedGlobalOptimizer {
                status: mp_status,
                cost: mp_cost,
            })),
            true,
            "time",
        )
    }

    #[test]
    fn test_optimal_cost_bounds_acceptance() {
        let mut filter = filter_with(
            DimensionSchedulingStatus::Optimal,
            42,
            DimensionSchedulingStatus::Optimal,
            42,
        );
        assert!(filter.accept(&Assignment::new(), i64::MIN, 100));
        assert_eq!(filter.accepted_objective_value(), 42);
        assert!(!filter.accept(&Assignment::new(), i64::MIN, 41));
    }

    #[test]
    fn test_infeasible_rejects() {
        let mut filter = filter_with(
            DimensionSchedulingStatus::Infeasible,
            0,
            DimensionSchedulingStatus::Optimal,
            0,
        );
        assert!(!filter.accept(&Assignment::new(), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_relaxed_escalates_to_mp() {
        let mut filter = filter_with(
            DimensionSchedulingStatus::RelaxedOptimalOnly,
            10,
            DimensionSchedulingStatus::Optimal,
            12,
        );
        assert!(filter.accept(&Assignment::new(), i64::MIN, 100));
        assert_eq!(filter.accepted_objective_value(), 12);
    }
}
