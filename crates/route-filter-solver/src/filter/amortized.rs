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

//! Amortized vehicle cost: a non-empty route of length `n` contributes
//! `linear_factor - quadratic_factor * n^2`; the linear part toggles only
//! on empty/non-empty transitions.

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use route_filter_core::prelude::{cap_add_to, cap_prod, cap_sub};
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

pub struct VehicleAmortizedCostFilterLogic {
    model: Rc<RoutingModel>,
    current_vehicle_cost: i64,
    delta_vehicle_cost: i64,
    // Committed number of regular nodes per path, indexed by start node.
    current_route_lengths: Vec<i64>,
}

impl VehicleAmortizedCostFilterLogic {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let size = model.size();
        Self {
            model,
            current_vehicle_cost: 0,
            delta_vehicle_cost: 0,
            current_route_lengths: vec![-1; size],
        }
    }
}

impl PathFilterLogic for VehicleAmortizedCostFilterLogic {
    fn name(&self) -> &str {
        "VehicleAmortizedCostFilter"
    }

    fn on_synchronize_path_from_start(&mut self, base: &PathFilterBase, start: usize) {
        let end = self.model.end(base.path_of_start(start));
        let Some(end_rank) = base.rank(end) else {
            return;
        };
        self.current_route_lengths[start] = end_rank as i64 - 1;
    }

    fn on_after_synchronize_paths(&mut self, base: &PathFilterBase) {
        self.current_vehicle_cost = 0;
        let linear_factors = self.model.amortized_linear_cost_factors();
        let quadratic_factors = self.model.amortized_quadratic_cost_factors();
        for vehicle in 0..self.model.num_vehicles() {
            let start = self.model.start(vehicle);
            if !base.is_var_synced(start) {
                return;
            }
            let route_length = self.current_route_lengths[start];
            debug_assert!(route_length >= 0);
            if route_length == 0 {
                // Empty path.
                continue;
            }
            let route_length_cost =
                cap_prod(quadratic_factors[vehicle], route_length * route_length);
            cap_add_to(
                cap_sub(linear_factors[vehicle], route_length_cost),
                &mut self.current_vehicle_cost,
            );
        }
    }

    fn initialize_accept_path(&mut self, _base: &PathFilterBase) -> bool {
        self.delta_vehicle_cost = self.current_vehicle_cost;
        true
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool {
        // Nodes previously between chain_start and chain_end.
        let (Some(start_rank), Some(end_rank)) = (base.rank(chain_start), base.rank(chain_end))
        else {
            return true;
        };
        let previous_chain_nodes = end_rank as i64 - 1 - start_rank as i64;
        debug_assert!(previous_chain_nodes >= 0);
        let mut new_chain_nodes = 0;
        let mut node = match base.get_next(chain_start) {
            Some(node) => node,
            None => return true,
        };
        while node != chain_end {
            new_chain_nodes += 1;
            node = match base.get_next(node) {
                Some(node) => node,
                None => return true,
            };
        }

        let previous_route_length = self.current_route_lengths[path_start];
        debug_assert!(previous_route_length >= 0);
        let new_route_length = previous_route_length - previous_chain_nodes + new_chain_nodes;
        let vehicle = base.path_of_start(path_start);

        // Linear cost toggles on empty <-> non-empty transitions.
        let linear_factor = self.model.amortized_linear_cost_factors()[vehicle];
        if previous_route_length == 0 {
            debug_assert!(new_route_length > 0);
            cap_add_to(linear_factor, &mut self.delta_vehicle_cost);
        } else if new_route_length == 0 {
            self.delta_vehicle_cost = cap_sub(self.delta_vehicle_cost, linear_factor);
        }

        // Quadratic cost follows the squared route length.
        let quadratic_factor = self.model.amortized_quadratic_cost_factors()[vehicle];
        cap_add_to(
            cap_prod(
                quadratic_factor,
                previous_route_length * previous_route_length,
            ),
            &mut self.delta_vehicle_cost,
        );
        self.delta_vehicle_cost = cap_sub(
            self.delta_vehicle_cost,
            cap_prod(quadratic_factor, new_route_length * new_route_length),
        );
        true
    }

    fn finalize_accept_path(
        &mut self,
        _base: &PathFilterBase,
        _objective_min: i64,
        objective_max: i64,
    ) -> bool {
        self.delta_vehicle_cost <= objective_max
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.current_vehicle_cost
    }

    fn accepted_objective_value(&self) -> i64 {
        self.delta_vehicle_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_trait::LocalSearchFilter;
    use crate::filter::path_filter::PathFilter;
    use route_filter_model::assignment::{Assignment, VarValue};

    fn bound(pairs: &[(usize, usize)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value as i64))
                .collect(),
        )
    }

    /// 3 regular nodes, 1 vehicle, linear factor 100, quadratic factor 2.
    fn filter() -> PathFilter<VehicleAmortizedCostFilterLogic> {
        let model = Rc::new(
            RoutingModel::builder(3, 1)
                .amortized_cost_factors(vec![100], vec![2])
                .build()
                .unwrap(),
        );
        let logic = VehicleAmortizedCostFilterLogic::new(model.clone());
        let mut filter = PathFilter::new(model, logic);
        // Committed: route of length 2.
        let assignment = bound(&[(3, 0), (0, 1), (1, 4), (2, 2)]);
        filter.synchronize(&assignment, None);
        filter
    }

    #[test]
    fn test_synchronized_cost() {
        let filter = filter();
        // 100 - 2 * 2^2 = 92.
        assert_eq!(filter.synchronized_objective_value(), 92);
    }

    #[test]
    fn test_growing_route_updates_quadratic_part() {
        let mut filter = filter();
        // Insert node 2: length 3 => 100 - 2 * 9 = 82.
        assert!(filter.accept(&bound(&[(1, 2), (2, 4)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 82);
    }

    #[test]
    fn test_emptying_route_drops_linear_part() {
        let mut filter = filter();
        let delta = bound(&[(3, 4), (0, 0), (1, 1)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 0);
    }
}
