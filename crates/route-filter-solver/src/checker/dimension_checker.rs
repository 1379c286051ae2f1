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

//! Incremental feasibility of one additive dimension over a `PathState`.
//!
//! Per committed path, layer 0 of a range-intersection-query (RIQ) table
//! stores each node's capacity and running transit sum. Layer `l`
//! summarizes windows of size `2^l` so that a chain reused verbatim from
//! the committed state is traversed in O(1) from two window lookups
//! instead of node by node.

use crate::state::path_state::PathState;
use route_filter_core::prelude::{most_significant_bit_position, ExtendedInterval, Interval};
use std::cell::RefCell;
use std::rc::Rc;

/// Demand of one vehicle class over an arc, as an interval (the width
/// comes from slack variables).
pub type ClassDemand = Box<dyn Fn(usize, usize) -> Interval>;

/// Chains at least this long use the RIQ; shorter ones are cheaper node by
/// node.
pub const OPTIMAL_MIN_RANGE_SIZE_FOR_RIQ: usize = 4;

#[derive(Debug, Clone, Copy)]
struct RiqNode {
    // Tightest cumul sets under which the window's first (resp. last) node
    // can be reached while satisfying all intermediate constraints.
    cumuls_to_fst: ExtendedInterval,
    cumuls_to_lst: ExtendedInterval,
    // Intersection of all transit sums inside the window, and the sums at
    // its boundaries.
    tightest_tsum: ExtendedInterval,
    tsum_at_fst: ExtendedInterval,
    tsum_at_lst: ExtendedInterval,
}

pub struct DimensionChecker {
    path_state: Rc<RefCell<PathState>>,
    path_capacity: Vec<ExtendedInterval>,
    path_class: Vec<usize>,
    demand_per_path_class: Vec<ClassDemand>,
    cached_demand: Vec<ExtendedInterval>,
    node_capacity: Vec<ExtendedInterval>,
    // Layer-0 index of each node in the RIQ table.
    index: Vec<usize>,
    riq: Vec<Vec<RiqNode>>,
    maximum_riq_layer_size: usize,
    min_range_size_for_riq: usize,
}

impl DimensionChecker {
    pub fn new(
        path_state: Rc<RefCell<PathState>>,
        path_capacity: Vec<Interval>,
        path_class: Vec<usize>,
        demand_per_path_class: Vec<ClassDemand>,
        node_capacity: Vec<Interval>,
    ) -> Self {
        Self::with_min_range_size_for_riq(
            path_state,
            path_capacity,
            path_class,
            demand_per_path_class,
            node_capacity,
            OPTIMAL_MIN_RANGE_SIZE_FOR_RIQ,
        )
    }

    pub fn with_min_range_size_for_riq(
        path_state: Rc<RefCell<PathState>>,
        path_capacity: Vec<Interval>,
        path_class: Vec<usize>,
        demand_per_path_class: Vec<ClassDemand>,
        node_capacity: Vec<Interval>,
        min_range_size_for_riq: usize,
    ) -> Self {
        let (num_nodes, num_paths) = {
            let state = path_state.borrow();
            (state.num_nodes(), state.num_paths())
        };
        debug_assert_eq!(num_paths, path_capacity.len());
        debug_assert_eq!(num_paths, path_class.len());
        let maximum_riq_exponent = most_significant_bit_position(num_nodes);
        let mut checker = Self {
            path_state,
            path_capacity: path_capacity.into_iter().map(Into::into).collect(),
            path_class,
            demand_per_path_class,
            cached_demand: vec![ExtendedInterval::zero(); num_nodes],
            node_capacity: node_capacity.into_iter().map(Into::into).collect(),
            index: vec![0; num_nodes],
            riq: vec![Vec::new(); maximum_riq_exponent + 1],
            maximum_riq_layer_size: std::cmp::max(16, 4 * num_nodes),
            min_range_size_for_riq,
        };
        checker.full_commit();
        checker
    }

    /// True iff every changed path admits a feasible cumul sequence.
    /// O(total length of changed chains), O(log chain) on reused chains.
    pub fn check(&self) -> bool {
        let state = self.path_state.borrow();
        if state.is_invalid() {
            return true;
        }
        for &path in state.changed_paths() {
            let path_capacity = self.path_capacity[path];
            let path_class = self.path_class[path];
            // Invariant: except for the first chain, cumul is the nonempty
            // reachable set at the last node of the previous chain.
            let mut prev_node = state.start(path);
            let mut cumul = self.node_capacity[prev_node] & path_capacity;
            if cumul.is_empty() {
                return false;
            }
            for chain in state.chains(path) {
                let first_node = chain.first();
                let last_node = chain.last();

                if prev_node != first_node {
                    // Bring the cumul set to the first node of this chain.
                    let demand: ExtendedInterval =
                        (self.demand_per_path_class[path_class])(prev_node, first_node).into();
                    cumul = cumul + demand;
                    cumul = cumul & path_capacity;
                    cumul = cumul & self.node_capacity[first_node];
                    if cumul.is_empty() {
                        return false;
                    }
                    prev_node = first_node;
                }

                let first_index = self.index[first_node];
                let last_index = self.index[last_node];
                let chain_path = state.path(first_node);
                let chain_is_cached =
                    chain_path.is_some_and(|chain_path| self.path_class[chain_path] == path_class);
                if chain_is_cached
                    && last_index - first_index > self.min_range_size_for_riq
                {
                    self.update_cumul_using_chain_riq(
                        first_index,
                        last_index,
                        path_capacity,
                        &mut cumul,
                    );
                    if cumul.is_empty() {
                        return false;
                    }
                    prev_node = last_node;
                } else {
                    for node in chain.without_first_node() {
                        let demand = if chain_is_cached {
                            self.cached_demand[prev_node]
                        } else {
                            (self.demand_per_path_class[path_class])(prev_node, node).into()
                        };
                        cumul = cumul + demand;
                        cumul = cumul & self.node_capacity[node];
                        cumul = cumul & path_capacity;
                        if cumul.is_empty() {
                            return false;
                        }
                        prev_node = node;
                    }
                }
            }
        }
        true
    }

    /// Rebuilds the RIQ for the committed state: incremental while the
    /// appended layers fit under `max(16, 4 * num_nodes)`, else from
    /// scratch.
    pub fn commit(&mut self) {
        let (change_size, current_layer_size) = {
            let state = self.path_state.borrow();
            let mut change_size = state.changed_paths().len();
            for &path in state.changed_paths() {
                for chain in state.chains(path) {
                    change_size += chain.num_nodes();
                }
            }
            (change_size, self.riq[0].len())
        };
        if current_layer_size + change_size <= self.maximum_riq_layer_size {
            self.incremental_commit();
        } else {
            tracing::trace!(
                layer_size = current_layer_size,
                change_size,
                "dimension checker full rebuild"
            );
            self.full_commit();
        }
    }

    fn incremental_commit(&mut self) {
        let changed_paths: Vec<usize> = self.path_state.borrow().changed_paths().to_vec();
        for path in changed_paths {
            let begin_index = self.riq[0].len();
            self.append_path_demands_to_sums(path);
            self.update_riq_structure(begin_index, self.riq[0].len());
        }
    }

    fn full_commit(&mut self) {
        for layer in &mut self.riq {
            layer.clear();
        }
        let num_paths = self.path_state.borrow().num_paths();
        for path in 0..num_paths {
            let begin_index = self.riq[0].len();
            self.append_path_demands_to_sums(path);
            self.update_riq_structure(begin_index, self.riq[0].len());
        }
    }

    fn append_path_demands_to_sums(&mut self, path: usize) {
        // Layer-0 transit sums cover start of path to each node.
        let state = self.path_state.borrow();
        let path_class = self.path_class[path];
        let mut demand_sum = ExtendedInterval::zero();
        let mut prev = state.start(path);
        let mut index = self.riq[0].len();
        for node in state.nodes(path) {
            let demand: ExtendedInterval = if prev == node {
                ExtendedInterval::zero()
            } else {
                (self.demand_per_path_class[path_class])(prev, node).into()
            };
            demand_sum = demand_sum + demand;
            self.cached_demand[prev] = demand;
            prev = node;
            self.index[node] = index;
            index += 1;
            self.riq[0].push(RiqNode {
                cumuls_to_fst: self.node_capacity[node],
                tightest_tsum: demand_sum,
                cumuls_to_lst: self.node_capacity[node],
                tsum_at_fst: demand_sum,
                tsum_at_lst: demand_sum,
            });
        }
        self.cached_demand[state.end(path)] = ExtendedInterval::zero();
    }

    fn update_riq_structure(&mut self, begin_index: usize, end_index: usize) {
        if end_index <= begin_index + 1 {
            return;
        }
        // The max layer is the one used by queries on
        // (begin_index, end_index - 1).
        let max_layer = most_significant_bit_position(end_index - begin_index - 1);
        let mut half_window = 1;
        for layer in 1..=max_layer {
            let (lower_layers, upper_layers) = self.riq.split_at_mut(layer);
            let previous = &lower_layers[layer - 1];
            let current = &mut upper_layers[0];
            current.resize(
                end_index,
                RiqNode {
                    cumuls_to_fst: ExtendedInterval::zero(),
                    tightest_tsum: ExtendedInterval::zero(),
                    cumuls_to_lst: ExtendedInterval::zero(),
                    tsum_at_fst: ExtendedInterval::zero(),
                    tsum_at_lst: ExtendedInterval::zero(),
                },
            );
            // The window of entry i at this layer is (i - 2*half_window, i],
            // merged from the F half-window ending at i - half_window and
            // the L half-window ending at i.
            for i in (begin_index + 2 * half_window - 1)..end_index {
                let fw = previous[i - half_window];
                let lw = previous[i];
                let lst_to_lst = ExtendedInterval::delta(fw.tsum_at_lst, lw.tsum_at_lst);
                let fst_to_fst = ExtendedInterval::delta(fw.tsum_at_fst, lw.tsum_at_fst);
                current[i] = RiqNode {
                    cumuls_to_fst: fw.cumuls_to_fst & (lw.cumuls_to_fst - fst_to_fst),
                    tightest_tsum: fw.tightest_tsum & lw.tightest_tsum,
                    cumuls_to_lst: (fw.cumuls_to_lst + lst_to_lst) & lw.cumuls_to_lst,
                    tsum_at_fst: fw.tsum_at_fst,
                    tsum_at_lst: lw.tsum_at_lst,
                };
            }
            half_window *= 2;
        }
    }

    /// Advances `cumul` from the node at `first_index` to the node at
    /// `last_index` in one shot, decomposing the range into an F window
    /// starting at `first_index` and an L window ending at `last_index`.
    fn update_cumul_using_chain_riq(
        &self,
        first_index: usize,
        last_index: usize,
        path_capacity: ExtendedInterval,
        cumul: &mut ExtendedInterval,
    ) {
        debug_assert!(first_index < last_index);
        debug_assert!(last_index < self.riq[0].len());
        let layer = most_significant_bit_position(last_index - first_index);
        let window = 1usize << layer;
        let fw = self.riq[layer][first_index + window - 1];
        let lw = self.riq[layer][last_index];

        // Cumul values that can reach the last node.
        *cumul = *cumul & fw.cumuls_to_fst;
        *cumul = *cumul
            & (lw.cumuls_to_fst - ExtendedInterval::delta(fw.tsum_at_fst, lw.tsum_at_fst));
        *cumul = *cumul
            & (path_capacity
                - ExtendedInterval::delta(fw.tsum_at_fst, fw.tightest_tsum & lw.tightest_tsum));

        // Check emptiness before widening with the transit.
        if cumul.is_empty() {
            return;
        }

        // Transit to the last node.
        *cumul = *cumul + ExtendedInterval::delta(fw.tsum_at_fst, lw.tsum_at_lst);

        // Cumul values reached from the first node.
        *cumul = *cumul
            & (fw.cumuls_to_lst + ExtendedInterval::delta(fw.tsum_at_lst, lw.tsum_at_lst));
        *cumul = *cumul & lw.cumuls_to_lst;
    }
}
