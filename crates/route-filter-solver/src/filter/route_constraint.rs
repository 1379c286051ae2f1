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

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use route_filter_core::prelude::{cap_add_to, cap_sub};
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

/// Prices whole routes through the model's route-cost callback; a route
/// the callback cannot price rejects the neighbor.
pub struct RouteConstraintFilterLogic {
    model: Rc<RoutingModel>,
    current_vehicle_cost: i64,
    delta_vehicle_cost: i64,
    current_vehicle_costs: Vec<i64>,
    route: Vec<usize>,
}

impl RouteConstraintFilterLogic {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let num_vehicles = model.num_vehicles();
        Self {
            model,
            current_vehicle_cost: 0,
            delta_vehicle_cost: 0,
            current_vehicle_costs: vec![0; num_vehicles],
            route: Vec::new(),
        }
    }
}

impl PathFilterLogic for RouteConstraintFilterLogic {
    fn name(&self) -> &str {
        "RouteConstraintFilter"
    }

    fn on_synchronize_path_from_start(&mut self, base: &PathFilterBase, start: usize) {
        self.route.clear();
        let size = base.size();
        let mut node = start;
        while node < size {
            self.route.push(node);
            node = base.value(node);
        }
        self.route.push(node);
        let vehicle = base.path_of_start(start);
        let route_cost = self
            .model
            .route_cost_callback()
            .and_then(|callback| callback(&self.route));
        debug_assert!(route_cost.is_some());
        self.current_vehicle_costs[vehicle] = route_cost.unwrap_or(0);
    }

    fn on_after_synchronize_paths(&mut self, base: &PathFilterBase) {
        self.current_vehicle_cost = 0;
        for vehicle in 0..self.model.num_vehicles() {
            let start = self.model.start(vehicle);
            if !base.is_var_synced(start) {
                return;
            }
            cap_add_to(self.current_vehicle_costs[vehicle], &mut self.current_vehicle_cost);
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
        _chain_start: usize,
        _chain_end: usize,
    ) -> bool {
        let vehicle = base.path_of_start(path_start);
        self.delta_vehicle_cost = cap_sub(
            self.delta_vehicle_cost,
            self.current_vehicle_costs[vehicle],
        );
        self.route.clear();
        let size = base.size();
        let mut node = path_start;
        while node < size {
            self.route.push(node);
            let Some(next) = base.get_next(node) else {
                return true;
            };
            node = next;
        }
        self.route.push(node);
        let Some(route_cost) = self
            .model
            .route_cost_callback()
            .and_then(|callback| callback(&self.route))
        else {
            return false;
        };
        cap_add_to(route_cost, &mut self.delta_vehicle_cost);
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
