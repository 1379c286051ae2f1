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
use route_filter_core::prelude::SparseBitset;
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

/// Rejects paths placing a node on a vehicle outside its allowed set.
/// Only the chain window needs checking; the rest of the path kept its
/// vehicle. The node-revisit guard doubles as cycle detection.
pub struct VehicleVarFilterLogic {
    model: Rc<RoutingModel>,
    touched: SparseBitset,
}

impl VehicleVarFilterLogic {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let num_nodes = model.num_nodes();
        Self {
            model,
            touched: SparseBitset::new(num_nodes),
        }
    }
}

impl PathFilterLogic for VehicleVarFilterLogic {
    fn name(&self) -> &str {
        "VehicleVarFilter"
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool {
        self.touched.sparse_clear_all();
        let vehicle = base.path_of_start(path_start);
        let mut node = chain_start;
        while node != chain_end {
            if self.touched.contains(node) || !self.model.is_vehicle_allowed(node, vehicle) {
                return false;
            }
            self.touched.set(node);
            let Some(next) = base.get_next(node) else {
                return true;
            };
            node = next;
        }
        self.model.is_vehicle_allowed(chain_end, vehicle)
    }

    fn disable_filtering(&self) -> bool {
        (0..self.model.num_nodes())
            .all(|node| !self.model.has_constrained_vehicle_domain(node))
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

    #[test]
    fn test_rejects_disallowed_vehicle() {
        // 3 regular nodes, 2 vehicles; node 1 only rides vehicle 0.
        let model = Rc::new(
            RoutingModel::builder(3, 2)
                .allowed_vehicles(1, vec![0])
                .build()
                .unwrap(),
        );
        let logic = VehicleVarFilterLogic::new(model.clone());
        let mut filter = PathFilter::new(model, logic);
        // Starts 3, 4; ends 5, 6. Committed: node 1 on vehicle 0.
        let assignment = bound(&[(3, 1), (1, 5), (4, 6), (0, 0), (2, 2)]);
        filter.synchronize(&assignment, None);
        // Moving node 1 to vehicle 1 is rejected.
        assert!(!filter.accept(&bound(&[(3, 5), (4, 1), (1, 6)]), i64::MIN, i64::MAX));
        // Moving node 0 (unconstrained) to vehicle 1 is fine.
        assert!(filter.accept(&bound(&[(4, 0), (0, 6)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_filter_disables_without_constrained_domains() {
        let model = Rc::new(RoutingModel::builder(3, 2).build().unwrap());
        let logic = VehicleVarFilterLogic::new(model);
        assert!(logic.disable_filtering());
    }
}
