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

//! Node disjunction filter: at most `max_cardinality` nodes of each
//! disjunction may be active; missing actives are penalized, or reject the
//! neighbor outright when the disjunction is mandatory.

use crate::filter::filter_trait::{LocalSearchFilter, VarSnapshot};
use route_filter_core::prelude::{cap_add_to, cap_prod, CommittableVector};
use route_filter_model::assignment::Assignment;
use route_filter_model::problem::disjunction::PenaltyCostBehavior;
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default)]
struct ActivityCount {
    active: i32,
    inactive: i32,
}

pub struct NodeDisjunctionFilter {
    model: Rc<RoutingModel>,
    snapshot: VarSnapshot,
    count_per_disjunction: CommittableVector<ActivityCount>,
    synchronized_objective_value: i64,
    accepted_objective_value: i64,
    filter_cost: bool,
    has_mandatory_disjunctions: bool,
}

impl NodeDisjunctionFilter {
    pub fn new(model: Rc<RoutingModel>, filter_cost: bool) -> Self {
        let size = model.size();
        let num_disjunctions = model.num_disjunctions();
        let has_mandatory_disjunctions = model.has_mandatory_disjunctions();
        Self {
            model,
            snapshot: VarSnapshot::new(size),
            count_per_disjunction: CommittableVector::new(
                num_disjunctions,
                ActivityCount::default(),
            ),
            synchronized_objective_value: i64::MIN,
            accepted_objective_value: i64::MIN,
            filter_cost,
            has_mandatory_disjunctions,
        }
    }
}

impl LocalSearchFilter for NodeDisjunctionFilter {
    fn name(&self) -> &str {
        "NodeDisjunctionFilter"
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, objective_max: i64) -> bool {
        self.count_per_disjunction.revert();
        let mut lns_detected = false;
        // Update the active/inactive counts of each modified disjunction.
        for element in delta.elements() {
            let node = element.var;
            if node >= self.snapshot.size() {
                continue;
            }
            lns_detected |= !element.is_bound();
            // Difference in how this node contributes to activity counts.
            let is_var_synced = self.snapshot.is_synced(node);
            let was_active = is_var_synced && self.snapshot.value(node) != node as i64;
            let is_active = (node as i64) < element.min || element.max < node as i64;
            let mut active_delta = 0;
            let mut inactive_delta = 0;
            if is_var_synced {
                active_delta -= i32::from(was_active);
                inactive_delta -= i32::from(!was_active);
            }
            active_delta += i32::from(is_active);
            inactive_delta += i32::from(!is_active);
            // Common shortcut: a neutral change leaves counts alone.
            if active_delta == 0 && inactive_delta == 0 {
                continue;
            }
            for &disjunction in self.model.disjunction_indices_of_node(node) {
                let mut count = self.count_per_disjunction.get(disjunction);
                count.active += active_delta;
                count.inactive += inactive_delta;
                self.count_per_disjunction.set(disjunction, count);
            }
        }
        // Cardinality check.
        for &index in self.count_per_disjunction.changed_indices() {
            if self.count_per_disjunction.get(index).active
                > self.model.disjunction(index).max_cardinality as i32
            {
                return false;
            }
        }
        if lns_detected || (!self.filter_cost && !self.has_mandatory_disjunctions) {
            self.accepted_objective_value = 0;
            return true;
        }
        // Update penalty costs of changed disjunctions.
        self.accepted_objective_value = self.synchronized_objective_value;
        for &index in self.count_per_disjunction.changed_indices() {
            // Common shortcut: unchanged inactive count, unchanged cost.
            let old_inactives = self.count_per_disjunction.get_committed(index).inactive;
            let new_inactives = self.count_per_disjunction.get(index).inactive;
            if old_inactives == new_inactives {
                continue;
            }
            let disjunction = self.model.disjunction(index);
            let penalty = disjunction.penalty;
            if penalty == 0 {
                continue;
            }

            let max_inactives =
                (disjunction.nodes.len() - disjunction.max_cardinality) as i32;
            let mut new_violation = std::cmp::max(0, new_inactives - max_inactives);
            let mut old_violation = std::cmp::max(0, old_inactives - max_inactives);
            // Mandatory nodes allow no violation at all.
            if penalty < 0 && new_violation > 0 {
                return false;
            }
            if disjunction.penalty_cost_behavior == PenaltyCostBehavior::PenalizeOnce {
                new_violation = std::cmp::min(1, new_violation);
                old_violation = std::cmp::min(1, old_violation);
            }
            cap_add_to(
                cap_prod(penalty, (new_violation - old_violation) as i64),
                &mut self.accepted_objective_value,
            );
        }
        // Only compare to the max: the computed cost is a lower bound.
        self.accepted_objective_value <= objective_max
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.snapshot.synchronize(assignment, delta);
        self.synchronized_objective_value = 0;
        self.count_per_disjunction.revert();
        for index in 0..self.model.num_disjunctions() {
            let disjunction = self.model.disjunction(index);
            let mut count = ActivityCount::default();
            for &node in &disjunction.nodes {
                if !self.snapshot.is_synced(node) {
                    continue;
                }
                let is_active = self.snapshot.value(node) != node as i64;
                count.active += i32::from(is_active);
                count.inactive += i32::from(!is_active);
            }
            self.count_per_disjunction.set(index, count);
            if !self.filter_cost {
                continue;
            }
            let penalty = disjunction.penalty;
            let max_actives = disjunction.max_cardinality;
            let mut violation =
                count.inactive - (disjunction.nodes.len() - max_actives) as i32;
            if violation > 0 && penalty > 0 {
                if disjunction.penalty_cost_behavior == PenaltyCostBehavior::PenalizeOnce {
                    violation = std::cmp::min(1, violation);
                }
                cap_add_to(
                    cap_prod(penalty, violation as i64),
                    &mut self.synchronized_objective_value,
                );
            }
        }
        self.count_per_disjunction.commit();
        self.accepted_objective_value = self.synchronized_objective_value;
    }

    fn accepted_objective_value(&self) -> i64 {
        self.accepted_objective_value
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.synchronized_objective_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::assignment::VarValue;
    use route_filter_model::problem::disjunction::Disjunction;

    fn bound(pairs: &[(usize, i64)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value))
                .collect(),
        )
    }

    fn model_with(disjunction: Disjunction) -> Rc<RoutingModel> {
        // 6 regular nodes, 1 vehicle: start 6, end 7.
        Rc::new(
            RoutingModel::builder(6, 1)
                .add_disjunction(disjunction)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_cardinality_violation_rejects() {
        // Nodes {3, 4, 5}, max cardinality 1, penalty 7. Committed: node 3
        // active, nodes 4 and 5 inactive.
        let model = model_with(Disjunction::new(vec![3, 4, 5], 1, 7));
        let mut filter = NodeDisjunctionFilter::new(model, true);
        let assignment = bound(&[(6, 3), (3, 7), (0, 0), (1, 1), (2, 2), (4, 4), (5, 5)]);
        filter.synchronize(&assignment, None);
        // Activating node 4 as well makes two active nodes.
        assert!(!filter.accept(&bound(&[(4, 0), (3, 4)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_penalty_cost_is_charged_per_missing_active() {
        // Nodes {0, 1}, max cardinality 2, penalty 10: both inactive costs
        // 20, one inactive costs 10.
        let model = model_with(Disjunction::new(vec![0, 1], 2, 10));
        let mut filter = NodeDisjunctionFilter::new(model, true);
        let assignment = bound(&[(6, 7), (0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
        filter.synchronize(&assignment, None);
        assert_eq!(filter.synchronized_objective_value(), 20);
        assert!(filter.accept(&bound(&[(6, 0), (0, 7)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 10);
    }

    #[test]
    fn test_penalize_once_clamps_both_sides() {
        let model = model_with(
            Disjunction::new(vec![0, 1], 2, 10)
                .with_behavior(PenaltyCostBehavior::PenalizeOnce),
        );
        let mut filter = NodeDisjunctionFilter::new(model, true);
        let assignment = bound(&[(6, 7), (0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
        filter.synchronize(&assignment, None);
        // Two missing actives still cost a single penalty.
        assert_eq!(filter.synchronized_objective_value(), 10);
        // Going from two inactives to one keeps the clamped violation at 1.
        assert!(filter.accept(&bound(&[(6, 0), (0, 7)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 10);
    }

    #[test]
    fn test_mandatory_disjunction_rejects_on_violation() {
        let model = model_with(Disjunction::new(vec![0], 1, -1));
        let mut filter = NodeDisjunctionFilter::new(model, true);
        let assignment = bound(&[(6, 0), (0, 7), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
        filter.synchronize(&assignment, None);
        // Dropping the mandatory node is not allowed.
        assert!(!filter.accept(&bound(&[(6, 7), (0, 0)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_monotone_penalty_in_inactive_count() {
        // Increasing the number of inactive nodes never decreases the cost.
        let model = model_with(Disjunction::new(vec![0, 1, 2], 3, 5));
        let mut filter = NodeDisjunctionFilter::new(model, true);
        let assignment = bound(&[(6, 0), (0, 1), (1, 2), (2, 7), (3, 3), (4, 4), (5, 5)]);
        filter.synchronize(&assignment, None);
        let mut last_cost = filter.synchronized_objective_value();
        assert_eq!(last_cost, 0);
        // Deactivate nodes one at a time.
        let deltas = [
            bound(&[(1, 1), (0, 2)]),
            bound(&[(1, 1), (2, 2), (0, 7)]),
            bound(&[(0, 0), (1, 1), (2, 2), (6, 7)]),
        ];
        for delta in &deltas {
            assert!(filter.accept(delta, i64::MIN, i64::MAX));
            let cost = filter.accepted_objective_value();
            assert!(cost >= last_cost);
            last_cost = cost;
        }
        assert_eq!(last_cost, 15);
    }
}
