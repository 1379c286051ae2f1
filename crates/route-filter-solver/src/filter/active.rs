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

//! Activity-level filters: vehicle usage caps and all-or-nothing node
//! groups. Both are O(delta) per neighbor.

use crate::filter::filter_trait::{LocalSearchFilter, VarSnapshot};
use route_filter_core::prelude::CommittableVector;
use route_filter_model::assignment::Assignment;
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

/// Rejects neighbors using more vehicles than the model's cap. A vehicle
/// is active iff its start's next is not its end.
pub struct MaxActiveVehiclesFilter {
    model: Rc<RoutingModel>,
    snapshot: VarSnapshot,
    is_active: Vec<bool>,
    active_vehicles: usize,
}

impl MaxActiveVehiclesFilter {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let size = model.size();
        let num_vehicles = model.num_vehicles();
        Self {
            model,
            snapshot: VarSnapshot::new(size),
            is_active: vec![false; num_vehicles],
            active_vehicles: 0,
        }
    }
}

impl LocalSearchFilter for MaxActiveVehiclesFilter {
    fn name(&self) -> &str {
        "MaxActiveVehiclesFilter"
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, _objective_max: i64) -> bool {
        let mut current_active_vehicles = self.active_vehicles as i64;
        for element in delta.elements() {
            let index = element.var;
            if index >= self.snapshot.size() || !self.model.is_start(index) {
                continue;
            }
            if !element.is_bound() {
                // LNS detected.
                return true;
            }
            let Some(vehicle) = self.model.paths().vehicle_of(index) else {
                continue;
            };
            let is_active = element.value() != self.model.end(vehicle) as i64;
            if is_active && !self.is_active[vehicle] {
                current_active_vehicles += 1;
            } else if !is_active && self.is_active[vehicle] {
                current_active_vehicles -= 1;
            }
        }
        current_active_vehicles <= self.model.max_active_vehicles() as i64
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.snapshot.synchronize(assignment, delta);
        self.active_vehicles = 0;
        for vehicle in 0..self.model.num_vehicles() {
            let start = self.model.start(vehicle);
            if self.snapshot.is_synced(start)
                && self.snapshot.value(start) != self.model.end(vehicle) as i64
            {
                self.is_active[vehicle] = true;
                self.active_vehicles += 1;
            } else {
                self.is_active[vehicle] = false;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ActivityCounts {
    active: i32,
    unknown: i32,
}

/// Groups of nodes that must be all active or all inactive together.
pub struct ActiveNodeGroupFilter {
    model: Rc<RoutingModel>,
    snapshot: VarSnapshot,
    active_count_per_group: CommittableVector<ActivityCounts>,
    // Committed activity per node, as of the last synchronize.
    node_is_active: Vec<bool>,
    node_is_unknown: Vec<bool>,
}

impl ActiveNodeGroupFilter {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let size = model.size();
        let num_groups = model.num_activity_groups();
        Self {
            model,
            snapshot: VarSnapshot::new(size),
            active_count_per_group: CommittableVector::new(num_groups, ActivityCounts::default()),
            node_is_active: vec![false; size],
            node_is_unknown: vec![false; size],
        }
    }
}

impl LocalSearchFilter for ActiveNodeGroupFilter {
    fn name(&self) -> &str {
        "ActiveNodeGroupFilter"
    }

    fn accept(&mut self, delta: &Assignment, _objective_min: i64, _objective_max: i64) -> bool {
        self.active_count_per_group.revert();
        for element in delta.elements() {
            let index = element.var;
            if index >= self.snapshot.size() {
                continue;
            }
            let Some(group) = self.model.activity_group_of_node(index) else {
                continue;
            };
            let mut counts = self.active_count_per_group.get(group);
            // Remove the node's committed contribution, add the new one.
            if self.node_is_unknown[index] {
                counts.unknown -= 1;
            }
            if self.node_is_active[index] {
                counts.active -= 1;
            }
            if !element.is_bound() {
                counts.unknown += 1;
            } else if element.value() != index as i64 {
                counts.active += 1;
            }
            self.active_count_per_group.set(group, counts);
        }
        for &group in self.active_count_per_group.changed_indices() {
            let counts = self.active_count_per_group.get(group);
            let group_size = self.model.activity_group(group).len() as i32;
            // Respected iff no active node, or the whole group can still
            // be active: active <= size <= active + unknown.
            if counts.active == 0 {
                continue;
            }
            if counts.active <= group_size && group_size <= counts.active + counts.unknown {
                continue;
            }
            return false;
        }
        true
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.snapshot.synchronize(assignment, delta);
        for group in 0..self.model.num_activity_groups() {
            let mut counts = ActivityCounts::default();
            for &node in self.model.activity_group(group) {
                if self.snapshot.is_synced(node) {
                    let is_active = self.snapshot.value(node) != node as i64;
                    self.node_is_active[node] = is_active;
                    self.node_is_unknown[node] = false;
                    counts.active += i32::from(is_active);
                } else {
                    counts.unknown += 1;
                    self.node_is_unknown[node] = true;
                    self.node_is_active[node] = false;
                }
            }
            self.active_count_per_group.set(group, counts);
        }
        self.active_count_per_group.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::assignment::VarValue;

    fn bound(pairs: &[(usize, i64)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value))
                .collect(),
        )
    }

    #[test]
    fn test_max_active_vehicles_cap() {
        // 3 vehicles, cap 2. Starts 3, 4, 5; ends 6, 7, 8.
        let model = Rc::new(
            RoutingModel::builder(3, 3)
                .max_active_vehicles(2)
                .build()
                .unwrap(),
        );
        let mut filter = MaxActiveVehiclesFilter::new(model);
        // Committed: vehicles 0 and 1 active, vehicle 2 empty.
        let assignment = bound(&[(3, 0), (0, 6), (4, 1), (1, 7), (5, 8), (2, 2)]);
        filter.synchronize(&assignment, None);
        // Activating vehicle 2 exceeds the cap.
        assert!(!filter.accept(&bound(&[(5, 2), (2, 8)]), i64::MIN, i64::MAX));
        // Swapping activity keeps the count at 2.
        assert!(filter.accept(&bound(&[(4, 7), (5, 1), (1, 8)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_active_node_group_all_or_nothing() {
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_activity_group(vec![0, 1])
                .build()
                .unwrap(),
        );
        let mut filter = ActiveNodeGroupFilter::new(model);
        // All of the group inactive.
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        filter.synchronize(&assignment, None);
        // Activating only node 0 splits the group.
        assert!(!filter.accept(&bound(&[(4, 0), (0, 5)]), i64::MIN, i64::MAX));
        // Activating both is fine.
        assert!(filter.accept(&bound(&[(4, 0), (0, 1), (1, 5)]), i64::MIN, i64::MAX));
        // An unbound member keeps the group satisfiable.
        assert!(filter.accept(
            &Assignment::from_elements(vec![
                VarValue::bound(4, 0),
                VarValue::bound(0, 5),
                VarValue::unbound(1, 1, 5),
            ]),
            i64::MIN,
            i64::MAX
        ));
    }
}
