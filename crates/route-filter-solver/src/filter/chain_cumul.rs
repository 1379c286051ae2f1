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

//! O(size of chain) cumul feasibility for dimensions without cumul costs:
//! only the overall capacity and the path ends' cumul windows constrain
//! the routes, so propagated cumul minima from the last synchronize bound
//! the rest of the path without walking it.

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use route_filter_core::prelude::{cap_add, cap_add_to, cap_sub};
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

pub struct ChainCumulFilterLogic {
    model: Rc<RoutingModel>,
    dimension_index: usize,
    name: String,
    current_path_cumul_mins: Vec<i64>,
    current_max_of_path_end_cumul_mins: Vec<i64>,
    old_nexts: Vec<Option<usize>>,
    old_vehicles: Vec<Option<usize>>,
    current_transits: Vec<i64>,
    path_nodes: Vec<usize>,
}

impl ChainCumulFilterLogic {
    pub fn new(model: Rc<RoutingModel>, dimension_index: usize) -> Self {
        let num_nodes = model.num_nodes();
        let size = model.size();
        let name = format!(
            "ChainCumulFilter({})",
            model.dimension(dimension_index).name()
        );
        Self {
            model,
            dimension_index,
            name,
            current_path_cumul_mins: vec![0; num_nodes],
            current_max_of_path_end_cumul_mins: vec![0; num_nodes],
            old_nexts: vec![None; size],
            old_vehicles: vec![None; size],
            current_transits: vec![0; size],
            path_nodes: Vec::new(),
        }
    }
}

impl PathFilterLogic for ChainCumulFilterLogic {
    fn name(&self) -> &str {
        &self.name
    }

    /// Propagates cumul mins along the committed path and records, per
    /// node, the max of cumul mins from the node to the path end.
    fn on_synchronize_path_from_start(&mut self, base: &PathFilterBase, start: usize) {
        let dimension = self.model.dimension(self.dimension_index);
        let vehicle = base.path_of_start(start);
        let size = base.size();
        self.path_nodes.clear();
        let mut node = start;
        let mut cumul = dimension.cumul_bounds(node).min;
        while node < size {
            self.path_nodes.push(node);
            self.current_path_cumul_mins[node] = cumul;
            let next = base.value(node);
            if self.old_nexts[node] != Some(next) || self.old_vehicles[node] != Some(vehicle) {
                self.old_nexts[node] = Some(next);
                self.old_vehicles[node] = Some(vehicle);
                self.current_transits[node] = dimension.transit(vehicle, node, next);
            }
            cap_add_to(self.current_transits[node], &mut cumul);
            cumul = std::cmp::max(dimension.cumul_bounds(next).min, cumul);
            node = next;
        }
        self.path_nodes.push(node);
        self.current_path_cumul_mins[node] = cumul;
        let mut max_cumuls = cumul;
        for &node in self.path_nodes.iter().rev() {
            max_cumuls = std::cmp::max(max_cumuls, self.current_path_cumul_mins[node]);
            self.current_max_of_path_end_cumul_mins[node] = max_cumuls;
        }
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool {
        let dimension = self.model.dimension(self.dimension_index);
        let vehicle = base.path_of_start(path_start);
        let capacity = dimension.vehicle_capacity(vehicle);
        let mut node = chain_start;
        let mut cumul = self.current_path_cumul_mins[node];
        while node != chain_end {
            let Some(next) = base.get_next(node) else {
                return true;
            };
            if base.is_var_synced(node)
                && base.value(node) == next
                && self.old_vehicles[node] == Some(vehicle)
            {
                cap_add_to(self.current_transits[node], &mut cumul);
            } else {
                cap_add_to(dimension.transit(vehicle, node, next), &mut cumul);
            }
            cumul = std::cmp::max(dimension.cumul_bounds(next).min, cumul);
            if cumul > capacity {
                return false;
            }
            node = next;
        }
        let end = self.model.end(vehicle);
        let end_cumul_delta = cap_sub(
            self.current_path_cumul_mins[end],
            self.current_path_cumul_mins[node],
        );
        let after_chain_cumul_delta = cap_sub(
            self.current_max_of_path_end_cumul_mins[node],
            self.current_path_cumul_mins[node],
        );
        cap_add(cumul, after_chain_cumul_delta) <= capacity
            && cap_add(cumul, end_cumul_delta) <= dimension.cumul_bounds(end).max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_trait::LocalSearchFilter;
    use crate::filter::path_filter::PathFilter;
    use route_filter_core::prelude::Interval;
    use route_filter_model::assignment::{Assignment, VarValue};
    use route_filter_model::problem::dimension::{ClassEvaluator, Dimension};

    fn bound(pairs: &[(usize, usize)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value as i64))
                .collect(),
        )
    }

    /// 4 regular nodes, 1 vehicle (start 4, end 5), unit transits,
    /// capacity 3.
    fn filter() -> PathFilter<ChainCumulFilterLogic> {
        let dimension = Dimension::new(
            "load",
            6,
            5,
            vec![3],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        );
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let logic = ChainCumulFilterLogic::new(model.clone(), 0);
        let mut filter = PathFilter::new(model, logic);
        let assignment = bound(&[(4, 0), (0, 1), (1, 5), (2, 2), (3, 3)]);
        filter.synchronize(&assignment, None);
        filter
    }

    #[test]
    fn test_capacity_bounds_route_length() {
        let mut filter = filter();
        // Route of 3 arcs fits capacity 3.
        assert!(filter.accept(&bound(&[(1, 2), (2, 5)]), i64::MIN, i64::MAX));
        // Route of 4 arcs exceeds it.
        assert!(!filter.accept(&bound(&[(1, 2), (2, 3), (3, 5)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_end_window_is_enforced() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![100],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.set_cumul_bounds(5, Interval::new(0, 25));
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let logic = ChainCumulFilterLogic::new(model.clone(), 0);
        let mut filter = PathFilter::new(model, logic);
        let assignment = bound(&[(4, 0), (0, 5), (1, 1), (2, 2), (3, 3)]);
        filter.synchronize(&assignment, None);
        // Two arcs: end cumul 20 <= 25.
        assert!(filter.accept(&bound(&[(0, 1), (1, 5)]), i64::MIN, i64::MAX));
        // Three arcs: end cumul 30 > 25.
        assert!(!filter.accept(&bound(&[(0, 1), (1, 2), (2, 5)]), i64::MIN, i64::MAX));
    }
}
