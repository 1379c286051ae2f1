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

//! The path-filter skeleton: decomposes a delta into touched paths with
//! per-path chain windows and dispatches to per-path callbacks.
//!
//! Concrete filters implement `PathFilterLogic`; `PathFilter` composes the
//! logic with the shared `PathFilterBase` bookkeeping (committed variable
//! snapshot, ranks, touched-path scratch) and exposes `LocalSearchFilter`.

use crate::filter::filter_trait::{LocalSearchFilter, VarSnapshot};
use route_filter_core::prelude::SparseBitset;
use route_filter_model::assignment::Assignment;
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterStatus {
    Unknown,
    Enabled,
    Disabled,
}

/// Per-path callbacks of a concrete path filter. Every method has a
/// default empty implementation except `accept_path`.
pub trait PathFilterLogic {
    fn name(&self) -> &str;

    /// Called once per synchronized path, after its ranks are up to date.
    fn on_synchronize_path_from_start(&mut self, _base: &PathFilterBase, _start: usize) {}

    fn on_before_synchronize_paths(&mut self, _base: &PathFilterBase) {}

    fn on_after_synchronize_paths(&mut self, _base: &PathFilterBase) {}

    /// Resets per-delta scratch. Returning false rejects the neighbor.
    fn initialize_accept_path(&mut self, _base: &PathFilterBase) -> bool {
        true
    }

    /// Exactly one call per touched path. The chain window
    /// `[chain_start, chain_end]` contains every touched arc of the path.
    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        chain_start: usize,
        chain_end: usize,
    ) -> bool;

    /// Final verdict once every touched path was accepted.
    fn finalize_accept_path(
        &mut self,
        _base: &PathFilterBase,
        _objective_min: i64,
        _objective_max: i64,
    ) -> bool {
        true
    }

    /// Checked on the first synchronize; a disabled filter accepts
    /// everything from then on.
    fn disable_filtering(&self) -> bool {
        false
    }

    fn synchronized_objective_value(&self) -> i64 {
        0
    }

    fn accepted_objective_value(&self) -> i64 {
        0
    }
}

/// Shared incremental bookkeeping of all path filters.
pub struct PathFilterBase {
    model: Rc<RoutingModel>,
    snapshot: VarSnapshot,
    node_path_starts: Vec<Option<usize>>,
    new_synchronized_unperformed_nodes: SparseBitset,
    new_nexts: Vec<Option<usize>>,
    delta_touched: Vec<usize>,
    touched_paths: SparseBitset,
    touched_path_chain_start_ends: Vec<(Option<usize>, Option<usize>)>,
    touched_starts_scratch: Vec<usize>,
    ranks: Vec<Option<usize>>,
    lns_detected: bool,
}

impl PathFilterBase {
    fn new(model: Rc<RoutingModel>) -> Self {
        let size = model.size();
        let num_nodes = model.num_nodes();
        Self {
            model,
            snapshot: VarSnapshot::new(size),
            node_path_starts: vec![None; num_nodes],
            new_synchronized_unperformed_nodes: SparseBitset::new(size),
            new_nexts: vec![None; size],
            delta_touched: Vec::new(),
            touched_paths: SparseBitset::new(size),
            touched_path_chain_start_ends: vec![(None, None); size],
            touched_starts_scratch: Vec::new(),
            ranks: vec![None; num_nodes],
            lns_detected: false,
        }
    }

    #[inline]
    pub fn model(&self) -> &RoutingModel {
        &self.model
    }

    /// Number of next variables; `node < size()` tests "not an end".
    #[inline]
    pub fn size(&self) -> usize {
        self.snapshot.size()
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.model.num_vehicles()
    }

    #[inline]
    pub fn start(&self, path: usize) -> usize {
        self.model.start(path)
    }

    #[inline]
    pub fn end(&self, path: usize) -> usize {
        self.model.end(path)
    }

    /// Path (vehicle) owning `start`.
    #[inline]
    pub fn path_of_start(&self, start: usize) -> usize {
        debug_assert!(self.model.is_start(start));
        self.model.paths().vehicle_of(start).unwrap_or(usize::MAX)
    }

    #[inline]
    pub fn is_var_synced(&self, node: usize) -> bool {
        self.snapshot.is_synced(node)
    }

    #[inline]
    pub fn value(&self, node: usize) -> usize {
        self.snapshot.value(node) as usize
    }

    /// Position of `node` on its committed path.
    #[inline]
    pub fn rank(&self, node: usize) -> Option<usize> {
        self.ranks[node]
    }

    /// The neighbor's successor of `node`: the delta value when touched,
    /// the committed value otherwise, `None` when neither is known.
    #[inline]
    pub fn get_next(&self, node: usize) -> Option<usize> {
        match self.new_nexts[node] {
            Some(next) => Some(next),
            None if self.snapshot.is_synced(node) => Some(self.value(node)),
            None => None,
        }
    }

    #[inline]
    pub fn lns_detected(&self) -> bool {
        self.lns_detected
    }

    /// Starts of the paths touched by the current delta.
    #[inline]
    pub fn touched_path_starts(&self) -> &[usize] {
        self.touched_paths.positions_set_at_least_once()
    }

    /// Nodes whose committed state flipped to unperformed during the last
    /// synchronize.
    #[inline]
    pub fn new_synchronized_unperformed_nodes(&self) -> &[usize] {
        self.new_synchronized_unperformed_nodes
            .positions_set_at_least_once()
    }

    pub fn has_any_synced_path(&self) -> bool {
        (0..self.num_paths()).any(|path| self.snapshot.is_synced(self.start(path)))
    }

    fn update_touched_path_chain_start_end(&mut self, index: usize) {
        let Some(start) = self.node_path_starts[index] else {
            return;
        };
        self.touched_paths.set(start);

        let (chain_start, chain_end) = self.touched_path_chain_start_ends[start];
        let paths = self.model.paths();
        let new_chain_start = match chain_start {
            None => Some(index),
            Some(current)
                if paths.is_start(index) || self.ranks[index] < self.ranks[current] =>
            {
                Some(index)
            }
            other => other,
        };
        let new_chain_end = match chain_end {
            None => Some(index),
            Some(current) if paths.is_end(index) || self.ranks[index] > self.ranks[current] => {
                Some(index)
            }
            other => other,
        };
        self.touched_path_chain_start_ends[start] = (new_chain_start, new_chain_end);
    }

    fn update_path_ranks_from_start(&mut self, start: usize) {
        let size = self.size();
        let mut rank = 0;
        let mut node = start;
        while node < size {
            self.ranks[node] = Some(rank);
            rank += 1;
            debug_assert!(self.snapshot.is_synced(node));
            node = self.value(node);
        }
        self.ranks[node] = Some(rank);
    }
}

/// A concrete path filter: skeleton plus per-path logic.
pub struct PathFilter<L: PathFilterLogic> {
    base: PathFilterBase,
    logic: L,
    status: FilterStatus,
}

impl<L: PathFilterLogic> PathFilter<L> {
    pub fn new(model: Rc<RoutingModel>, logic: L) -> Self {
        Self {
            base: PathFilterBase::new(model),
            logic,
            status: FilterStatus::Unknown,
        }
    }

    #[inline]
    pub fn logic(&self) -> &L {
        &self.logic
    }

    #[inline]
    pub fn base(&self) -> &PathFilterBase {
        &self.base
    }

    #[inline]
    fn is_disabled(&self) -> bool {
        self.status == FilterStatus::Disabled
    }

    fn synchronize_full_assignment(&mut self) {
        let base = &mut self.base;
        let size = base.size();
        for index in 0..size {
            if base.snapshot.is_synced(index)
                && base.value(index) == index
                && base.node_path_starts[index].is_some()
            {
                // Performed before, unperformed now.
                base.new_synchronized_unperformed_nodes.set(index);
            }
        }
        base.node_path_starts.fill(None);
        for path in 0..base.num_paths() {
            let start = base.start(path);
            base.node_path_starts[start] = Some(start);
            if base.snapshot.is_synced(start) {
                let mut next = base.value(start);
                while next < size {
                    let node = next;
                    base.node_path_starts[node] = Some(start);
                    debug_assert!(base.snapshot.is_synced(node));
                    next = base.value(node);
                }
                base.node_path_starts[next] = Some(start);
            }
            let end = base.end(path);
            base.node_path_starts[end] = Some(start);
        }
        for position in 0..base.delta_touched.len() {
            let touched = base.delta_touched[position];
            base.new_nexts[touched] = None;
        }
        base.delta_touched.clear();
        self.logic.on_before_synchronize_paths(&self.base);
        self.base.ranks.fill(None);
        for path in 0..self.base.num_paths() {
            let start = self.base.start(path);
            if !self.base.snapshot.is_synced(start) {
                continue;
            }
            self.base.update_path_ranks_from_start(start);
            self.logic.on_synchronize_path_from_start(&self.base, start);
        }
        self.logic.on_after_synchronize_paths(&self.base);
    }

    fn on_synchronize(&mut self, delta: Option<&Assignment>) {
        if self.status == FilterStatus::Unknown {
            self.status = if self.logic.disable_filtering() {
                FilterStatus::Disabled
            } else {
                FilterStatus::Enabled
            };
        }
        if self.is_disabled() {
            return;
        }
        self.base.new_synchronized_unperformed_nodes.clear_all();
        let never_synchronized = self.base.ranks.iter().all(Option::is_none);
        match delta {
            None => {
                self.synchronize_full_assignment();
                return;
            }
            Some(delta) if delta.is_empty() || never_synchronized => {
                self.synchronize_full_assignment();
                return;
            }
            Some(delta) => {
                let base = &mut self.base;
                base.touched_paths.sparse_clear_all();
                for element in delta.elements() {
                    let index = element.var;
                    if index >= base.size() {
                        continue;
                    }
                    if let Some(start) = base.node_path_starts[index] {
                        base.touched_paths.set(start);
                        if base.snapshot.is_synced(index) && base.value(index) == index {
                            // New unperformed node.
                            base.new_synchronized_unperformed_nodes.set(index);
                            base.node_path_starts[index] = None;
                        }
                    }
                }
                for position in 0..base.delta_touched.len() {
                    let touched = base.delta_touched[position];
                    base.new_nexts[touched] = None;
                }
                base.delta_touched.clear();
                base.touched_starts_scratch.clear();
                base.touched_starts_scratch
                    .extend_from_slice(base.touched_paths.positions_set_at_least_once());
                self.logic.on_before_synchronize_paths(&self.base);
                for position in 0..self.base.touched_starts_scratch.len() {
                    let touched_start = self.base.touched_starts_scratch[position];
                    let size = self.base.size();
                    let mut node = touched_start;
                    while node < size {
                        self.base.node_path_starts[node] = Some(touched_start);
                        node = self.base.value(node);
                    }
                    self.base.node_path_starts[node] = Some(touched_start);
                    self.base.update_path_ranks_from_start(touched_start);
                    self.logic
                        .on_synchronize_path_from_start(&self.base, touched_start);
                }
                self.logic.on_after_synchronize_paths(&self.base);
            }
        }
    }
}

impl<L: PathFilterLogic> LocalSearchFilter for PathFilter<L> {
    fn name(&self) -> &str {
        self.logic.name()
    }

    fn accept(&mut self, delta: &Assignment, objective_min: i64, objective_max: i64) -> bool {
        if self.is_disabled() {
            return true;
        }
        let base = &mut self.base;
        base.lns_detected = false;
        for position in 0..base.delta_touched.len() {
            let touched = base.delta_touched[position];
            base.new_nexts[touched] = None;
        }
        base.delta_touched.clear();

        // A touched path's chain window spans from the touched node of
        // minimum committed rank to the one of maximum committed rank.
        for position in 0..base.touched_paths.positions_set_at_least_once().len() {
            let touched_path = base.touched_paths.positions_set_at_least_once()[position];
            base.touched_path_chain_start_ends[touched_path] = (None, None);
        }
        base.touched_paths.sparse_clear_all();

        for element in delta.elements() {
            let index = element.var;
            if index >= base.size() {
                continue;
            }
            if !element.is_bound() {
                base.lns_detected = true;
                return true;
            }
            let value = element.value() as usize;
            base.new_nexts[index] = Some(value);
            base.delta_touched.push(index);
            base.update_touched_path_chain_start_end(index);
            base.update_touched_path_chain_start_end(value);
        }

        if !self.logic.initialize_accept_path(&self.base) {
            return false;
        }
        for position in 0..self.base.touched_paths.positions_set_at_least_once().len() {
            let touched_start = self.base.touched_paths.positions_set_at_least_once()[position];
            let (chain_start, chain_end) =
                self.base.touched_path_chain_start_ends[touched_start];
            let (Some(chain_start), Some(chain_end)) = (chain_start, chain_end) else {
                continue;
            };
            if !self
                .logic
                .accept_path(&self.base, touched_start, chain_start, chain_end)
            {
                return false;
            }
        }
        // Only reached when every touched path was accepted.
        self.logic
            .finalize_accept_path(&self.base, objective_min, objective_max)
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.base.snapshot.synchronize(assignment, delta);
        self.on_synchronize(delta);
    }

    fn accepted_objective_value(&self) -> i64 {
        if self.base.lns_detected {
            0
        } else {
            self.logic.accepted_objective_value()
        }
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.logic.synchronized_objective_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::assignment::VarValue;

    /// Records the windows the skeleton hands to `accept_path`.
    #[derive(Default)]
    struct RecordingLogic {
        windows: Vec<(usize, usize, usize)>,
        synchronized_paths: Vec<usize>,
    }

    impl PathFilterLogic for RecordingLogic {
        fn name(&self) -> &str {
            "RecordingLogic"
        }

        fn initialize_accept_path(&mut self, _base: &PathFilterBase) -> bool {
            self.windows.clear();
            true
        }

        fn accept_path(
            &mut self,
            _base: &PathFilterBase,
            path_start: usize,
            chain_start: usize,
            chain_end: usize,
        ) -> bool {
            self.windows.push((path_start, chain_start, chain_end));
            true
        }

        fn on_synchronize_path_from_start(&mut self, _base: &PathFilterBase, start: usize) {
            self.synchronized_paths.push(start);
        }
    }

    fn model() -> Rc<RoutingModel> {
        // 4 regular nodes, 2 vehicles: starts 4, 5; ends 6, 7.
        Rc::new(RoutingModel::builder(4, 2).build().unwrap())
    }

    fn bound(pairs: &[(usize, usize)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value as i64))
                .collect(),
        )
    }

    fn synchronized_filter() -> PathFilter<RecordingLogic> {
        let mut filter = PathFilter::new(model(), RecordingLogic::default());
        // Committed: 4 -> 0 -> 1 -> 2 -> 6, 5 -> 3 -> 7.
        let assignment = bound(&[(4, 0), (0, 1), (1, 2), (2, 6), (5, 3), (3, 7)]);
        filter.synchronize(&assignment, None);
        filter
    }

    #[test]
    fn test_synchronize_assigns_ranks_along_paths() {
        let filter = synchronized_filter();
        assert_eq!(filter.base().rank(4), Some(0));
        assert_eq!(filter.base().rank(0), Some(1));
        assert_eq!(filter.base().rank(2), Some(3));
        assert_eq!(filter.base().rank(6), Some(4));
        assert_eq!(filter.base().rank(5), Some(0));
        assert_eq!(filter.base().rank(7), Some(2));
        assert_eq!(filter.logic().synchronized_paths, vec![4, 5]);
    }

    #[test]
    fn test_chain_window_covers_touched_ranks() {
        let mut filter = synchronized_filter();
        // Swap nodes 1 and 2: touched nodes 0, 1, 2 on path of start 4.
        let delta = bound(&[(0, 2), (2, 1), (1, 6)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        assert_eq!(filter.logic().windows.len(), 1);
        let (path_start, chain_start, chain_end) = filter.logic().windows[0];
        assert_eq!(path_start, 4);
        // Min-rank touched node is 0 (rank 1), max-rank is 6 (the end).
        assert_eq!(chain_start, 0);
        assert_eq!(chain_end, 6);
    }

    #[test]
    fn test_chain_window_clamps_to_start_when_start_touched() {
        let mut filter = synchronized_filter();
        let delta = bound(&[(4, 1), (1, 0), (0, 2)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        let (_, chain_start, chain_end) = filter.logic().windows[0];
        assert_eq!(chain_start, 4);
        // Max-rank touched node is 2 (rank 3).
        assert_eq!(chain_end, 2);
    }

    #[test]
    fn test_one_accept_path_call_per_touched_path() {
        let mut filter = synchronized_filter();
        // Touch both paths: move 2 from path 0 to path 1.
        let delta = bound(&[(1, 6), (5, 2), (2, 3)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        let mut path_starts: Vec<usize> =
            filter.logic().windows.iter().map(|w| w.0).collect();
        path_starts.sort_unstable();
        assert_eq!(path_starts, vec![4, 5]);
    }

    #[test]
    fn test_unbound_delta_is_lns() {
        let mut filter = synchronized_filter();
        let delta = Assignment::from_elements(vec![VarValue::unbound(0, 1, 2)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        assert!(filter.base().lns_detected());
        assert_eq!(filter.accepted_objective_value(), 0);
        assert!(filter.logic().windows.is_empty());
    }

    #[test]
    fn test_incremental_synchronize_rewalks_touched_path_only() {
        let mut filter = synchronized_filter();
        let before = filter.logic().synchronized_paths.clone();
        // Commit a change on path 1 only.
        let delta = bound(&[(5, 7), (3, 3)]);
        let assignment = bound(&[(4, 0), (0, 1), (1, 2), (2, 6), (5, 7), (3, 3)]);
        filter.synchronize(&assignment, Some(&delta));
        let after = &filter.logic().synchronized_paths[before.len()..];
        assert_eq!(after, &[5]);
        // Node 3 became unperformed.
        assert_eq!(filter.base().new_synchronized_unperformed_nodes(), &[3]);
        assert_eq!(filter.base().rank(5), Some(0));
        assert_eq!(filter.base().rank(7), Some(1));
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let mut filter = synchronized_filter();
        let assignment = bound(&[(4, 0), (0, 1), (1, 2), (2, 6), (5, 3), (3, 7)]);
        let ranks_before: Vec<Option<usize>> =
            (0..8).map(|node| filter.base().rank(node)).collect();
        filter.synchronize(&assignment, Some(&Assignment::new()));
        let ranks_after: Vec<Option<usize>> =
            (0..8).map(|node| filter.base().rank(node)).collect();
        assert_eq!(ranks_before, ranks_after);
        assert!(filter.base().new_synchronized_unperformed_nodes().is_empty());
    }

    #[test]
    fn test_rejected_delta_leaves_no_trace() {
        let mut filter = synchronized_filter();
        let first = bound(&[(0, 2), (2, 1), (1, 6)]);
        assert!(filter.accept(&first, i64::MIN, i64::MAX));
        // The next neighbor sees only committed values.
        let second = bound(&[(5, 7), (3, 3)]);
        assert!(filter.accept(&second, i64::MIN, i64::MAX));
        assert_eq!(filter.base().get_next(0), Some(1));
        assert_eq!(filter.base().get_next(2), Some(6));
    }

    #[test]
    fn test_get_next_prefers_delta() {
        let mut filter = synchronized_filter();
        let delta = bound(&[(0, 2)]);
        assert!(filter.accept(&delta, i64::MIN, i64::MAX));
        assert_eq!(filter.base().get_next(0), Some(2));
        assert_eq!(filter.base().get_next(4), Some(0));
    }
}
