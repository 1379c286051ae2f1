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

//! Visit-type regulations: hard incompatibilities are checked against
//! per-vehicle type counts maintained here; temporal incompatibilities and
//! type requirements are delegated to the model's helper checkers.

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use route_filter_model::problem::model::{RoutingModel, VisitTypePolicy};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct TypeRegulationsFilterLogic {
    model: Rc<RoutingModel>,
    hard_incompatibility_type_counts_per_vehicle: Vec<Vec<i32>>,
}

impl TypeRegulationsFilterLogic {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let num_vehicles = model.num_vehicles();
        let num_visit_types = model.num_visit_types();
        let counts = if model.has_hard_type_incompatibilities() {
            vec![vec![0; num_visit_types]; num_vehicles]
        } else {
            Vec::new()
        };
        Self {
            model,
            hard_incompatibility_type_counts_per_vehicle: counts,
        }
    }

    fn counted_type(&self, node: usize) -> Option<usize> {
        let visit_type = self.model.visit_type(node)?;
        if self.model.visit_type_policy(node) == VisitTypePolicy::AddedTypeRemovedFromVehicle {
            return None;
        }
        Some(visit_type)
    }

    fn hard_incompatibilities_respected(
        &self,
        base: &PathFilterBase,
        vehicle: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool {
        if !self.model.has_hard_type_incompatibilities() {
            return true;
        }
        let previous_type_counts = &self.hard_incompatibility_type_counts_per_vehicle[vehicle];

        let mut new_type_counts: HashMap<usize, i32> = HashMap::new();
        let mut types_to_check: HashSet<usize> = HashSet::new();

        // Count the types of the nodes now on the chain.
        let mut node = match base.get_next(chain_start) {
            Some(node) => node,
            None => return true,
        };
        while node != chain_end {
            if let Some(visit_type) = self.counted_type(node) {
                let count = new_type_counts
                    .entry(visit_type)
                    .or_insert(previous_type_counts[visit_type]);
                if *count == 0 {
                    // First of its type on the route; check it below.
                    types_to_check.insert(visit_type);
                }
                *count += 1;
            }
            node = match base.get_next(node) {
                Some(node) => node,
                None => return true,
            };
        }

        // Remove the types of the nodes no longer on the chain.
        if base.is_var_synced(chain_start) {
            let mut node = base.value(chain_start);
            while node != chain_end {
                if let Some(visit_type) = self.counted_type(node) {
                    let count = new_type_counts
                        .entry(visit_type)
                        .or_insert(previous_type_counts[visit_type]);
                    debug_assert!(*count >= 1);
                    *count -= 1;
                }
                node = base.value(node);
            }
        }

        for &visit_type in &types_to_check {
            for &incompatible_type in self.model.hard_type_incompatibilities_of_type(visit_type) {
                let count = new_type_counts
                    .get(&incompatible_type)
                    .copied()
                    .unwrap_or(previous_type_counts[incompatible_type]);
                if count > 0 {
                    return false;
                }
            }
        }
        true
    }
}

impl PathFilterLogic for TypeRegulationsFilterLogic {
    fn name(&self) -> &str {
        "TypeRegulationsFilter"
    }

    fn on_synchronize_path_from_start(&mut self, base: &PathFilterBase, start: usize) {
        if !self.model.has_hard_type_incompatibilities() {
            return;
        }
        let vehicle = base.path_of_start(start);
        let mut type_counts = std::mem::take(
            &mut self.hard_incompatibility_type_counts_per_vehicle[vehicle],
        );
        type_counts.fill(0);
        let size = base.size();
        let mut node = start;
        while node < size {
            debug_assert!(base.is_var_synced(node));
            if let Some(visit_type) = self.counted_type(node) {
                type_counts[visit_type] += 1;
            }
            node = base.value(node);
        }
        self.hard_incompatibility_type_counts_per_vehicle[vehicle] = type_counts;
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool {
        let vehicle = base.path_of_start(path_start);
        let next_accessor = |node: usize| base.get_next(node);
        self.hard_incompatibilities_respected(base, vehicle, chain_start, chain_end)
            && self.model.check_temporal_incompatibilities(vehicle, &next_accessor)
            && self.model.check_type_requirements(vehicle, &next_accessor)
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

    /// Nodes 0 and 1 carry incompatible types 0 and 1; 2 vehicles.
    fn filter() -> PathFilter<TypeRegulationsFilterLogic> {
        let model = Rc::new(
            RoutingModel::builder(3, 2)
                .visit_type(0, 0, VisitTypePolicy::TypeAddedToVehicle)
                .visit_type(1, 1, VisitTypePolicy::TypeAddedToVehicle)
                .hard_type_incompatibility(0, 1)
                .build()
                .unwrap(),
        );
        let logic = TypeRegulationsFilterLogic::new(model.clone());
        let mut filter = PathFilter::new(model, logic);
        // Starts 3, 4; ends 5, 6. Node 0 on vehicle 0, node 1 on vehicle 1.
        let assignment = bound(&[(3, 0), (0, 5), (4, 1), (1, 6), (2, 2)]);
        filter.synchronize(&assignment, None);
        filter
    }

    #[test]
    fn test_incompatible_types_cannot_share_a_vehicle() {
        let mut filter = filter();
        // Move node 1 onto vehicle 0, joining incompatible node 0.
        assert!(!filter.accept(&bound(&[(0, 1), (1, 5), (4, 6)]), i64::MIN, i64::MAX));
        // Moving the neutral node 2 there is fine.
        assert!(filter.accept(&bound(&[(0, 2), (2, 5)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_swap_removes_old_type_before_checking() {
        let mut filter = filter();
        // Replace node 0 by node 1 on vehicle 0: type 0 leaves the route,
        // so type 1 no longer conflicts.
        assert!(filter.accept(
            &bound(&[(3, 1), (1, 5), (0, 0), (4, 6)]),
            i64::MIN,
            i64::MAX
        ));
    }
}
