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

//! Threshold energy cost of paths: a running force is accumulated along
//! each path, each arc carries a distance, and the cost is two-piece
//! linear in the force integrated over distance.
//!
//! Per committed path the checker caches forces and distances and
//! precomputes a force range-minimum table plus two weighted wavelet trees
//! (energy and distance keyed on running force), so a chain reused from
//! the committed state is re-costed in O(log) time with the threshold
//! shifted to compensate the chain's new force offset.

use crate::ranges::wavelet::WeightedWaveletTree;
use crate::state::path_state::PathState;
use route_filter_core::prelude::{
    cap_add, cap_add_to, cap_opp, cap_prod, cap_sub, RangeMinimumQuery,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Per-arc force evaluator of one force class.
pub type ForceEvaluator = Box<dyn Fn(usize) -> i64>;
/// Per-arc distance evaluator of one distance class.
pub type DistanceEvaluator = Box<dyn Fn(usize, usize) -> i64>;

/// Two-piece linear energy cost: force below the threshold is billed at
/// `cost_per_unit_below_threshold` per unit of distance, force above it at
/// `cost_per_unit_above_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyCost {
    pub threshold: i64,
    pub cost_per_unit_below_threshold: i64,
    pub cost_per_unit_above_threshold: i64,
}

pub struct PathEnergyCostChecker {
    path_state: Rc<RefCell<PathState>>,
    force_start_min: Vec<i64>,
    force_end_min: Vec<i64>,
    force_class: Vec<usize>,
    distance_class: Vec<usize>,
    force_per_class: Vec<ForceEvaluator>,
    distance_per_class: Vec<DistanceEvaluator>,
    path_energy_cost: Vec<EnergyCost>,
    path_has_cost_when_empty: Vec<bool>,
    maximum_range_query_size: usize,
    force_rmq: RangeMinimumQuery,
    force_rmq_index_of_node: Vec<usize>,
    energy_query: WeightedWaveletTree,
    distance_query: WeightedWaveletTree,
    threshold_query_index_of_node: Vec<usize>,
    cached_force: Vec<i64>,
    cached_distance: Vec<i64>,
    committed_total_cost: i64,
    committed_path_cost: Vec<i64>,
    accepted_total_cost: i64,
}

impl PathEnergyCostChecker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path_state: Rc<RefCell<PathState>>,
        force_start_min: Vec<i64>,
        force_end_min: Vec<i64>,
        force_class: Vec<usize>,
        force_per_class: Vec<ForceEvaluator>,
        distance_class: Vec<usize>,
        distance_per_class: Vec<DistanceEvaluator>,
        path_energy_cost: Vec<EnergyCost>,
        path_has_cost_when_empty: Vec<bool>,
    ) -> Self {
        let (num_nodes, num_paths) = {
            let state = path_state.borrow();
            (state.num_nodes(), state.num_paths())
        };
        let mut checker = Self {
            path_state,
            force_start_min,
            force_end_min,
            force_class,
            distance_class,
            force_per_class,
            distance_per_class,
            path_energy_cost,
            path_has_cost_when_empty,
            maximum_range_query_size: 4 * num_nodes,
            force_rmq: RangeMinimumQuery::new(),
            force_rmq_index_of_node: vec![0; num_nodes],
            energy_query: WeightedWaveletTree::new(),
            distance_query: WeightedWaveletTree::new(),
            threshold_query_index_of_node: vec![0; num_nodes],
            cached_force: vec![0; num_nodes],
            cached_distance: vec![0; num_nodes],
            committed_total_cost: 0,
            committed_path_cost: vec![0; num_paths],
            accepted_total_cost: 0,
        };
        checker.full_cache_and_precompute();
        checker.committed_total_cost = 0;
        for path in 0..num_paths {
            checker.committed_path_cost[path] = checker.compute_path_cost(path);
            cap_add_to(checker.committed_path_cost[path], &mut checker.committed_total_cost);
        }
        checker.accepted_total_cost = checker.committed_total_cost;
        checker
    }

    /// Re-costs the changed paths. False iff the accepted cost saturates.
    pub fn check(&mut self) -> bool {
        if self.path_state.borrow().is_invalid() {
            return true;
        }
        self.accepted_total_cost = self.committed_total_cost;
        let changed_paths: Vec<usize> = self.path_state.borrow().changed_paths().to_vec();
        for path in changed_paths {
            self.accepted_total_cost =
                cap_sub(self.accepted_total_cost, self.committed_path_cost[path]);
            cap_add_to(self.compute_path_cost(path), &mut self.accepted_total_cost);
            if self.accepted_total_cost == i64::MAX {
                return false;
            }
        }
        true
    }

    #[inline]
    pub fn committed_cost(&self) -> i64 {
        self.committed_total_cost
    }

    #[inline]
    pub fn accepted_cost(&self) -> i64 {
        self.accepted_total_cost
    }

    pub fn commit(&mut self) {
        let changed_paths: Vec<usize> = self.path_state.borrow().changed_paths().to_vec();
        let mut change_size = changed_paths.len();
        {
            let state = self.path_state.borrow();
            for &path in &changed_paths {
                for chain in state.chains(path) {
                    change_size += chain.num_nodes();
                }
            }
        }
        for &path in &changed_paths {
            self.committed_total_cost =
                cap_sub(self.committed_total_cost, self.committed_path_cost[path]);
            self.committed_path_cost[path] = self.compute_path_cost(path);
            cap_add_to(self.committed_path_cost[path], &mut self.committed_total_cost);
        }

        let current_layer_size = self.force_rmq.table_size();
        if current_layer_size + change_size <= self.maximum_range_query_size {
            self.incremental_cache_and_precompute();
        } else {
            tracing::trace!(
                layer_size = current_layer_size,
                change_size,
                "energy checker full rebuild"
            );
            self.full_cache_and_precompute();
        }
    }

    fn incremental_cache_and_precompute(&mut self) {
        let changed_paths: Vec<usize> = self.path_state.borrow().changed_paths().to_vec();
        for path in changed_paths {
            self.cache_and_precompute_range_queries_of_path(path);
        }
    }

    fn full_cache_and_precompute(&mut self) {
        self.force_rmq.clear();
        self.energy_query.clear();
        self.distance_query.clear();
        let num_paths = self.path_state.borrow().num_paths();
        for path in 0..num_paths {
            self.cache_and_precompute_range_queries_of_path(path);
        }
    }

    fn cache_and_precompute_range_queries_of_path(&mut self, path: usize) {
        let state = self.path_state.borrow();
        let force_evaluator = &self.force_per_class[self.force_class[path]];
        let distance_evaluator = &self.distance_per_class[self.distance_class[path]];
        let mut force_index = self.force_rmq.table_size();
        let mut threshold_index = self.energy_query.tree_size();
        let mut total_force: i64 = 0;

        let mut prev_node = state.start(path);
        for node in state.nodes(path) {
            if prev_node != node {
                let distance = distance_evaluator(prev_node, node);
                self.cached_distance[prev_node] = distance;
                self.energy_query
                    .push_back(total_force, cap_prod(total_force, distance));
                self.distance_query.push_back(total_force, distance);
                prev_node = node;
            }
            self.threshold_query_index_of_node[node] = threshold_index;
            threshold_index += 1;
            self.force_rmq.push_back(total_force);
            self.force_rmq_index_of_node[node] = force_index;
            force_index += 1;
            let force = force_evaluator(node);
            self.cached_force[node] = force;
            total_force = cap_add(total_force, force);
        }
        drop(state);
        self.force_rmq.make_table_from_new_elements();
        self.energy_query.make_tree_from_new_elements();
        self.distance_query.make_tree_from_new_elements();
    }

    fn compute_path_cost(&self, path: usize) -> i64 {
        let state = self.path_state.borrow();
        let path_force_class = self.force_class[path];
        let force_evaluator = &self.force_per_class[path_force_class];

        // Find the minimal force at which to start.
        let mut total_force = self.force_start_min[path];
        let mut min_force = total_force;
        let mut num_path_nodes = 0;
        let mut prev_node = state.start(path);
        for chain in state.chains(path) {
            num_path_nodes += chain.num_nodes();
            if chain.first() != prev_node {
                let force_to_node = force_evaluator(prev_node);
                cap_add_to(force_to_node, &mut total_force);
                min_force = std::cmp::min(min_force, total_force);
                prev_node = chain.first();
            }

            let chain_path = state.path(chain.first());
            let force_is_cached =
                chain_path.is_some_and(|chain_path| self.force_class[chain_path] == path_force_class);
            if force_is_cached && chain.num_nodes() >= 2 {
                let first_index = self.force_rmq_index_of_node[chain.first()];
                let last_index = self.force_rmq_index_of_node[chain.last()];
                // Total force at the first, last and lowest point of the
                // chain, relative to the committed zero origin.
                let first_total_force = self.force_rmq.array()[first_index];
                let last_total_force = self.force_rmq.array()[last_index];
                let min_total_force = self.force_rmq.range_minimum(first_index, last_index);
                min_force = std::cmp::min(
                    min_force,
                    cap_add(cap_sub(total_force, first_total_force), min_total_force),
                );
                cap_add_to(cap_sub(last_total_force, first_total_force), &mut total_force);
                prev_node = chain.last();
            } else {
                for node in chain.without_first_node() {
                    let force = if force_is_cached {
                        self.cached_force[prev_node]
                    } else {
                        force_evaluator(prev_node)
                    };
                    cap_add_to(force, &mut total_force);
                    min_force = std::cmp::min(min_force, total_force);
                    prev_node = node;
                }
            }
        }
        if num_path_nodes == 2 && !self.path_has_cost_when_empty[path] {
            return 0;
        }
        // Offset the force so that it is >= force_start_min at the start,
        // >= force_end_min at the end, and >= 0 everywhere in between.
        total_force = std::cmp::max(
            0,
            std::cmp::max(
                cap_opp(min_force),
                cap_sub(self.force_end_min[path], total_force),
            ),
        );
        cap_add_to(self.force_start_min[path], &mut total_force);

        // Energy below and above the threshold.
        let path_distance_class = self.distance_class[path];
        let distance_evaluator = &self.distance_per_class[path_distance_class];
        let cost = self.path_energy_cost[path];
        let mut energy_below: i64 = 0;
        let mut energy_above: i64 = 0;
        let mut prev_node = state.start(path);
        for chain in state.chains(path) {
            if chain.first() != prev_node {
                let distance = distance_evaluator(prev_node, chain.first());
                cap_add_to(force_evaluator(prev_node), &mut total_force);
                cap_add_to(
                    cap_prod(std::cmp::min(cost.threshold, total_force), distance),
                    &mut energy_below,
                );
                let force_above = std::cmp::max(0, cap_sub(total_force, cost.threshold));
                cap_add_to(cap_prod(force_above, distance), &mut energy_above);
                prev_node = chain.first();
            }

            let chain_path = state.path(chain.first());
            let chain_force_class = chain_path.map(|chain_path| self.force_class[chain_path]);
            let chain_distance_class =
                chain_path.map(|chain_path| self.distance_class[chain_path]);
            let force_is_cached = chain_force_class == Some(path_force_class);
            let distance_is_cached = chain_distance_class == Some(path_distance_class);

            if force_is_cached && distance_is_cached && chain.num_nodes() >= 2 {
                let first_index = self.threshold_query_index_of_node[chain.first()];
                let last_index = self.threshold_query_index_of_node[chain.last()];

                let zero_total_energy =
                    self.energy_query
                        .range_sum_with_threshold(i64::MIN, first_index, last_index);
                let total_distance = self.distance_query.range_sum_with_threshold(
                    i64::MIN,
                    first_index,
                    last_index,
                );

                // zero_ values assume the force at the committed path's
                // start was zero. The candidate's force at chain.first()
                // differs in general; shifting the query threshold by that
                // offset lets the committed tables answer for the
                // candidate.
                let zero_total_force_first =
                    self.force_rmq.array()[self.force_rmq_index_of_node[chain.first()]];
                let zero_threshold = cap_sub(
                    cost.threshold,
                    cap_sub(total_force, zero_total_force_first),
                );
                // "High" transitions run at or above the threshold.
                let zero_high_energy = self.energy_query.range_sum_with_threshold(
                    zero_threshold,
                    first_index,
                    last_index,
                );
                let zero_high_distance = self.distance_query.range_sum_with_threshold(
                    zero_threshold,
                    first_index,
                    last_index,
                );
                // Energy above the threshold is only incurred during high
                // transitions, so it derives from high energy, high
                // distance and the threshold.
                let zero_energy_above = cap_sub(
                    zero_high_energy,
                    cap_prod(zero_high_distance, zero_threshold),
                );
                cap_add_to(zero_energy_above, &mut energy_above);
                cap_add_to(
                    cap_add(
                        cap_sub(zero_total_energy, zero_energy_above),
                        cap_prod(total_distance, cap_sub(cost.threshold, zero_threshold)),
                    ),
                    &mut energy_below,
                );
                let zero_total_force_last =
                    self.force_rmq.array()[self.force_rmq_index_of_node[chain.last()]];
                cap_add_to(
                    cap_sub(zero_total_force_last, zero_total_force_first),
                    &mut total_force,
                );
                prev_node = chain.last();
            } else {
                for node in chain.without_first_node() {
                    let force = if force_is_cached {
                        self.cached_force[prev_node]
                    } else {
                        force_evaluator(prev_node)
                    };
                    let distance = if distance_is_cached {
                        self.cached_distance[prev_node]
                    } else {
                        distance_evaluator(prev_node, node)
                    };
                    cap_add_to(force, &mut total_force);
                    cap_add_to(
                        cap_prod(std::cmp::min(cost.threshold, total_force), distance),
                        &mut energy_below,
                    );
                    let force_above = std::cmp::max(0, cap_sub(total_force, cost.threshold));
                    cap_add_to(cap_prod(force_above, distance), &mut energy_above);
                    prev_node = node;
                }
            }
        }

        cap_add(
            cap_prod(energy_below, cost.cost_per_unit_below_threshold),
            cap_prod(energy_above, cost.cost_per_unit_above_threshold),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::path_state::ChainBounds;

    fn change_path_to_nodes(state: &mut PathState, path: usize, nodes: &[usize]) {
        let chains: Vec<ChainBounds> = nodes
            .iter()
            .map(|&node| {
                let index = state.committed_index(node);
                ChainBounds::new(index, index + 1)
            })
            .collect();
        state.change_path(path, &chains);
    }

    /// Single-path checker over 4 regular nodes (start 4, end 5).
    fn checker_with(
        force: impl Fn(usize) -> i64 + 'static,
        distance: impl Fn(usize, usize) -> i64 + 'static,
        cost: EnergyCost,
        force_start_min: i64,
        force_end_min: i64,
        cost_when_empty: bool,
    ) -> (PathEnergyCostChecker, Rc<RefCell<PathState>>) {
        let state = Rc::new(RefCell::new(PathState::new(6, vec![4], vec![5])));
        let checker = PathEnergyCostChecker::new(
            state.clone(),
            vec![force_start_min],
            vec![force_end_min],
            vec![0],
            vec![Box::new(force)],
            vec![0],
            vec![Box::new(distance)],
            vec![cost],
            vec![cost_when_empty],
        );
        (checker, state)
    }

    #[test]
    fn test_single_arc_two_piece_cost() {
        // Single-arc path (start directly to end, costed when empty) with
        // force 5 after the start, distance 10, threshold 3: energy below
        // = min(3, 5) * 10 = 30, energy above = (5 - 3) * 10 = 20, total
        // cost = 30 * 1 + 20 * 2 = 70.
        let (mut checker, state) = checker_with(
            |node| if node == 4 { 5 } else { 0 },
            |_, _| 10,
            EnergyCost {
                threshold: 3,
                cost_per_unit_below_threshold: 1,
                cost_per_unit_above_threshold: 2,
            },
            0,
            0,
            true,
        );
        change_path_to_nodes(&mut state.borrow_mut(), 0, &[4, 5]);
        assert!(checker.check());
        assert_eq!(checker.accepted_cost(), 70);
    }

    #[test]
    fn test_negative_force_requires_offset() {
        // Force -4 after the start then +4 after node 0: the running
        // force dips to -4, so the start offset must be 4. With distances
        // of 1 the three transitions then run at forces 0, 4 and 4.
        let (mut checker, state) = checker_with(
            |node| match node {
                4 => -4,
                0 => 4,
                _ => 0,
            },
            |_, _| 1,
            EnergyCost {
                threshold: 100,
                cost_per_unit_below_threshold: 1,
                cost_per_unit_above_threshold: 0,
            },
            0,
            0,
            false,
        );
        change_path_to_nodes(&mut state.borrow_mut(), 0, &[4, 0, 1, 5]);
        assert!(checker.check());
        assert_eq!(checker.accepted_cost(), 8);
    }

    #[test]
    fn test_force_end_min_raises_offset() {
        let (mut checker, state) = checker_with(
            |_| 0,
            |_, _| 2,
            EnergyCost {
                threshold: 100,
                cost_per_unit_below_threshold: 1,
                cost_per_unit_above_threshold: 0,
            },
            0,
            7,
            false,
        );
        change_path_to_nodes(&mut state.borrow_mut(), 0, &[4, 0, 5]);
        assert!(checker.check());
        // No force is gathered along the path, so the start force must
        // already be 7: two transitions at force 7, distance 2 each.
        assert_eq!(checker.accepted_cost(), 28);
    }

    #[test]
    fn test_committed_and_accepted_costs_track_changes() {
        let (mut checker, state) = checker_with(
            |node| if node == 4 { 5 } else { 1 },
            |_, _| 1,
            EnergyCost {
                threshold: 6,
                cost_per_unit_below_threshold: 1,
                cost_per_unit_above_threshold: 3,
            },
            0,
            0,
            false,
        );
        change_path_to_nodes(&mut state.borrow_mut(), 0, &[4, 0, 1, 5]);
        assert!(checker.check());
        let tentative = checker.accepted_cost();
        // Transition forces: 5, 6, 7; below = 5 + 6 + 6 = 17, above = 1.
        assert_eq!(tentative, 17 + 3);
        // The checker reads the tentative chains, so it commits first.
        checker.commit();
        state.borrow_mut().commit();
        assert_eq!(checker.committed_cost(), tentative);

        // Shrinking the path reduces the cost.
        change_path_to_nodes(&mut state.borrow_mut(), 0, &[4, 0, 5]);
        assert!(checker.check());
        assert_eq!(checker.accepted_cost(), 5 + 6);
        state.borrow_mut().revert();
        assert!(checker.check());
        assert_eq!(checker.accepted_cost(), checker.committed_cost());
    }

    #[test]
    fn test_cached_chain_reuse_matches_slow_path() {
        // Build a long committed path, then re-cost a tentative path that
        // reuses a long committed chain with a different force offset at
        // its entry; the wavelet fast path must agree with a from-scratch
        // walk.
        let num_regular = 20;
        let state = Rc::new(RefCell::new(PathState::new(
            num_regular + 2,
            vec![num_regular],
            vec![num_regular + 1],
        )));
        let force = |node: usize| (node as i64 % 5) - 1;
        let distance = |from: usize, to: usize| ((from + to) % 7) as i64 + 1;
        let cost = EnergyCost {
            threshold: 9,
            cost_per_unit_below_threshold: 2,
            cost_per_unit_above_threshold: 5,
        };
        let mut checker = PathEnergyCostChecker::new(
            state.clone(),
            vec![3],
            vec![0],
            vec![0],
            vec![Box::new(force)],
            vec![0],
            vec![Box::new(distance)],
            vec![cost],
            vec![false],
        );
        let mut path: Vec<usize> = vec![num_regular];
        path.extend(0..num_regular);
        path.push(num_regular + 1);
        change_path_to_nodes(&mut state.borrow_mut(), 0, &path);
        checker.commit();
        state.borrow_mut().commit();

        // Tentative: drop the first three regular nodes, keeping the long
        // tail chain intact (entered with a different accumulated force).
        let reference_state = Rc::new(RefCell::new(PathState::new(
            num_regular + 2,
            vec![num_regular],
            vec![num_regular + 1],
        )));
        let mut reference_checker = PathEnergyCostChecker::new(
            reference_state.clone(),
            vec![3],
            vec![0],
            vec![0],
            vec![Box::new(force)],
            vec![0],
            vec![Box::new(distance)],
            vec![cost],
            vec![false],
        );

        {
            let mut borrowed = state.borrow_mut();
            let start_index = borrowed.committed_index(num_regular);
            let tail_begin = borrowed.committed_index(3);
            let tail_end = borrowed.committed_index(num_regular + 1) + 1;
            borrowed.change_path(
                0,
                &[
                    ChainBounds::new(start_index, start_index + 1),
                    ChainBounds::new(tail_begin, tail_end),
                ],
            );
        }
        assert!(checker.check());

        let mut reference_path = vec![num_regular];
        reference_path.extend(3..num_regular);
        reference_path.push(num_regular + 1);
        change_path_to_nodes(&mut reference_state.borrow_mut(), 0, &reference_path);
        assert!(reference_checker.check());

        assert_eq!(checker.accepted_cost(), reference_checker.accepted_cost());
    }
}
