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

//! Translates deltas over next variables into `PathState` chain lists.

use crate::filter::filter_trait::LocalSearchFilter;
use crate::state::path_state::{ChainBounds, ChainList, PathState};
use route_filter_model::assignment::Assignment;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
struct TailHeadIndices {
    tail_index: usize,
    head_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct IndexArc {
    index: usize,
    arc: usize,
}

/// Owns the `PathState` lifecycle: `relax` cuts the delta into chains,
/// `synchronize` replays and commits, `revert` drops the tentative state.
/// Other filters share the state read-only through the same `Rc`.
pub struct PathStateFilter {
    path_state: Rc<RefCell<PathState>>,
    // Scratch, kept across calls to avoid reallocation.
    changed_paths: Vec<usize>,
    path_has_changed: Vec<bool>,
    changed_arcs: Vec<(usize, usize)>,
    changed_loops: Vec<usize>,
    tail_head_indices: Vec<TailHeadIndices>,
    arcs_by_tail_index: Vec<IndexArc>,
    arcs_by_head_index: Vec<IndexArc>,
    next_arc: Vec<usize>,
    path_chains: ChainList,
    node_is_assigned: Vec<bool>,
    loops: Vec<usize>,
}

impl PathStateFilter {
    pub fn new(path_state: Rc<RefCell<PathState>>) -> Self {
        let num_paths = path_state.borrow().num_paths();
        Self {
            path_state,
            changed_paths: Vec::new(),
            path_has_changed: vec![false; num_paths],
            changed_arcs: Vec::new(),
            changed_loops: Vec::new(),
            tail_head_indices: Vec::new(),
            arcs_by_tail_index: Vec::new(),
            arcs_by_head_index: Vec::new(),
            next_arc: Vec::new(),
            path_chains: ChainList::new(),
            node_is_assigned: Vec::new(),
            loops: Vec::new(),
        }
    }

    #[inline]
    pub fn path_state(&self) -> &Rc<RefCell<PathState>> {
        &self.path_state
    }

    /// Reinitializes the state to all-empty paths and all-loop nodes.
    pub fn reset(&mut self) {
        let mut state = self.path_state.borrow_mut();
        state.revert();
        let num_nodes = state.num_nodes();
        self.node_is_assigned.clear();
        self.node_is_assigned.resize(num_nodes, false);
        self.loops.clear();
        let num_paths = state.num_paths();
        for path in 0..num_paths {
            let range = state.committed_path_range(path);
            state.change_path(
                path,
                &[
                    ChainBounds::new(range.begin_index, range.begin_index + 1),
                    ChainBounds::new(range.end_index - 1, range.end_index),
                ],
            );
            self.node_is_assigned[state.start(path)] = true;
            self.node_is_assigned[state.end(path)] = true;
        }
        for node in 0..num_nodes {
            if !self.node_is_assigned[node] {
                self.loops.push(node);
            }
        }
        state.change_loops(&self.loops);
        state.commit();
    }

    fn relax_with(&mut self, delta: &Assignment) {
        self.path_state.borrow_mut().revert();
        self.changed_arcs.clear();
        for element in delta.elements() {
            let node = element.var;
            if node >= self.path_state.borrow().num_nodes() {
                continue;
            }
            if element.is_bound() {
                self.changed_arcs.push((node, element.value() as usize));
            } else {
                let mut state = self.path_state.borrow_mut();
                state.revert();
                state.set_invalid();
                return;
            }
        }
        self.cut_chains();
    }

    /// Filters unchanged arcs out of `changed_arcs`, translates the rest to
    /// committed indices, and rebuilds each touched path's chain list.
    fn cut_chains(&mut self) {
        let state = self.path_state.borrow();
        for &path in &self.changed_paths {
            self.path_has_changed[path] = false;
        }
        self.changed_paths.clear();
        self.tail_head_indices.clear();
        self.changed_loops.clear();
        let mut num_changed_arcs = 0;
        for arc_position in 0..self.changed_arcs.len() {
            let (node, next) = self.changed_arcs[arc_position];
            let node_index = state.committed_index(node);
            let next_index = state.committed_index(next);
            let node_path = state.path(node);
            if next != node && (next_index != node_index + 1 || node_path.is_none()) {
                // New arc.
                self.tail_head_indices.push(TailHeadIndices {
                    tail_index: node_index,
                    head_index: next_index,
                });
                self.changed_arcs[num_changed_arcs] = (node, next);
                num_changed_arcs += 1;
                if let Some(path) = node_path {
                    if !self.path_has_changed[path] {
                        self.path_has_changed[path] = true;
                        self.changed_paths.push(path);
                    }
                }
            } else if node == next && node_path.is_some() {
                // New loop.
                self.changed_loops.push(node);
            }
        }
        self.changed_arcs.truncate(num_changed_arcs);
        drop(state);

        self.path_state
            .borrow_mut()
            .change_loops(&self.changed_loops);
        if self.tail_head_indices.len() + self.changed_paths.len() <= 8 {
            self.make_chains_with_selection_algorithm();
        } else {
            self.make_chains_with_generic_algorithm();
        }
    }

    /// O(n^2) selection on the arc set; best for small change sets.
    fn make_chains_with_selection_algorithm(&mut self) {
        let mut num_visited_changed_arcs = 0;
        let num_changed_arcs = self.tail_head_indices.len();
        for path_position in 0..self.changed_paths.len() {
            let path = self.changed_paths[path_position];
            self.path_chains.clear();
            let range = self.path_state.borrow().committed_path_range(path);
            let (start_index, end_index) = (range.begin_index, range.end_index);
            let mut current_index = start_index;
            loop {
                // Smallest unvisited tail index no smaller than current.
                let mut selected_arc = usize::MAX;
                let mut selected_tail_index = usize::MAX;
                for arc in num_visited_changed_arcs..num_changed_arcs {
                    let tail_index = self.tail_head_indices[arc].tail_index;
                    if current_index <= tail_index && tail_index < selected_tail_index {
                        selected_arc = arc;
                        selected_tail_index = tail_index;
                    }
                }
                if start_index <= current_index
                    && current_index < end_index
                    && end_index <= selected_tail_index
                {
                    // The next chain would be cut by the end of the path.
                    self.path_chains
                        .push(ChainBounds::new(current_index, end_index));
                    break;
                } else {
                    self.path_chains
                        .push(ChainBounds::new(current_index, selected_tail_index + 1));
                    current_index = self.tail_head_indices[selected_arc].head_index;
                    self.tail_head_indices
                        .swap(num_visited_changed_arcs, selected_arc);
                    num_visited_changed_arcs += 1;
                }
            }
            self.path_state
                .borrow_mut()
                .change_path(path, &self.path_chains);
        }
    }

    /// O(sort(n)) chain generation. A fake end->start arc per path closes
    /// each path into a cycle; sorting arc heads and tails by committed
    /// index pairs each chain's begin with its end and links arcs in path
    /// order.
    fn make_chains_with_generic_algorithm(&mut self) {
        let state = self.path_state.borrow();
        for &path in &self.changed_paths {
            let range = state.committed_path_range(path);
            self.tail_head_indices.push(TailHeadIndices {
                tail_index: range.end_index - 1,
                head_index: range.begin_index,
            });
        }
        drop(state);

        let num_arc_indices = self.tail_head_indices.len();
        self.arcs_by_tail_index.clear();
        self.arcs_by_head_index.clear();
        for (arc, indices) in self.tail_head_indices.iter().enumerate() {
            self.arcs_by_tail_index.push(IndexArc {
                index: indices.tail_index,
                arc,
            });
            self.arcs_by_head_index.push(IndexArc {
                index: indices.head_index,
                arc,
            });
        }
        self.arcs_by_tail_index.sort_unstable();
        self.arcs_by_head_index.sort_unstable();
        self.next_arc.clear();
        self.next_arc.resize(num_arc_indices, 0);
        for position in 0..num_arc_indices {
            self.next_arc[self.arcs_by_head_index[position].arc] =
                self.arcs_by_tail_index[position].arc;
        }

        let first_fake_arc = num_arc_indices - self.changed_paths.len();
        for fake_arc in first_fake_arc..num_arc_indices {
            self.path_chains.clear();
            let mut arc = fake_arc;
            loop {
                let chain_begin = self.tail_head_indices[arc].head_index;
                arc = self.next_arc[arc];
                let chain_end = self.tail_head_indices[arc].tail_index + 1;
                self.path_chains.push(ChainBounds::new(chain_begin, chain_end));
                if arc == fake_arc {
                    break;
                }
            }
            let path = self.changed_paths[fake_arc - first_fake_arc];
            self.path_state
                .borrow_mut()
                .change_path(path, &self.path_chains);
        }
    }
}

impl LocalSearchFilter for PathStateFilter {
    fn name(&self) -> &str {
        "PathStateFilter"
    }

    fn relax(&mut self, delta: &Assignment) {
        self.relax_with(delta);
    }

    fn accept(&mut self, _delta: &Assignment, _objective_min: i64, _objective_max: i64) -> bool {
        true
    }

    /// The engine does not guarantee this synchronize matches the last
    /// relax, so the change sequence is replayed from scratch.
    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.path_state.borrow_mut().revert();
        match delta {
            Some(delta) if !delta.is_empty() => self.relax_with(delta),
            _ => self.relax_with(assignment),
        }
        self.path_state.borrow_mut().commit();
    }

    fn revert(&mut self) {
        self.path_state.borrow_mut().revert();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::assignment::VarValue;

    /// 4 regular nodes, 2 paths: starts 4, 5; ends 6, 7.
    fn filter_with_state() -> (PathStateFilter, Rc<RefCell<PathState>>) {
        let state = Rc::new(RefCell::new(PathState::new(8, vec![4, 5], vec![6, 7])));
        (PathStateFilter::new(state.clone()), state)
    }

    fn nodes_of(state: &Rc<RefCell<PathState>>, path: usize) -> Vec<usize> {
        state.borrow().nodes(path).collect()
    }

    fn next_values(pairs: &[(usize, usize)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value as i64))
                .collect(),
        )
    }

    #[test]
    fn test_relax_builds_tentative_chains() {
        let (mut filter, state) = filter_with_state();
        // Path 0 becomes 4 -> 0 -> 1 -> 6.
        let delta = next_values(&[(4, 0), (0, 1), (1, 6)]);
        filter.relax(&delta);
        assert_eq!(state.borrow().changed_paths(), &[0]);
        assert_eq!(nodes_of(&state, 0), vec![4, 0, 1, 6]);
        // Not committed yet.
        filter.revert();
        assert_eq!(nodes_of(&state, 0), vec![4, 6]);
    }

    #[test]
    fn test_synchronize_commits_assignment() {
        let (mut filter, state) = filter_with_state();
        let delta = next_values(&[(4, 0), (0, 1), (1, 6)]);
        filter.synchronize(&Assignment::new(), Some(&delta));
        assert_eq!(nodes_of(&state, 0), vec![4, 0, 1, 6]);
        assert_eq!(state.borrow().path(0), Some(0));
        assert_eq!(state.borrow().path(1), Some(0));
        assert_eq!(state.borrow().path(2), None);
    }

    #[test]
    fn test_move_node_between_paths() {
        let (mut filter, state) = filter_with_state();
        filter.synchronize(&Assignment::new(), Some(&next_values(&[(4, 0), (0, 1), (1, 6)])));
        // Move node 0 to path 1: 4 -> 1 -> 6 and 5 -> 0 -> 7.
        let delta = next_values(&[(4, 1), (5, 0), (0, 7)]);
        filter.relax(&delta);
        {
            let borrowed = state.borrow();
            let mut changed = borrowed.changed_paths().to_vec();
            changed.sort_unstable();
            assert_eq!(changed, vec![0, 1]);
        }
        assert_eq!(nodes_of(&state, 0), vec![4, 1, 6]);
        assert_eq!(nodes_of(&state, 1), vec![5, 0, 7]);
        filter.synchronize(&Assignment::new(), Some(&delta));
        assert_eq!(nodes_of(&state, 1), vec![5, 0, 7]);
    }

    #[test]
    fn test_node_becomes_loop() {
        let (mut filter, state) = filter_with_state();
        filter.synchronize(&Assignment::new(), Some(&next_values(&[(4, 0), (0, 1), (1, 6)])));
        // Drop node 1: 0 -> 6, 1 -> 1.
        let delta = next_values(&[(0, 6), (1, 1)]);
        filter.relax(&delta);
        assert_eq!(state.borrow().changed_loops(), &[1]);
        assert_eq!(nodes_of(&state, 0), vec![4, 0, 6]);
        filter.synchronize(&Assignment::new(), Some(&delta));
        assert_eq!(state.borrow().path(1), None);
    }

    #[test]
    fn test_unbound_delta_invalidates_state() {
        let (mut filter, state) = filter_with_state();
        let delta = Assignment::from_elements(vec![VarValue::unbound(4, 0, 3)]);
        filter.relax(&delta);
        assert!(state.borrow().is_invalid());
        filter.revert();
        assert!(!state.borrow().is_invalid());
    }

    #[test]
    fn test_large_change_set_uses_generic_algorithm() {
        // 10 regular nodes on one path; rewire more than 8 arcs at once to
        // exercise the sort-based algorithm.
        let state = Rc::new(RefCell::new(PathState::new(12, vec![10], vec![11])));
        let mut filter = PathStateFilter::new(state.clone());
        let delta = next_values(&[
            (10, 0),
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 4),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 8),
            (8, 9),
            (9, 11),
        ]);
        filter.synchronize(&Assignment::new(), Some(&delta));
        assert_eq!(
            nodes_of(&state, 0),
            vec![10, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11]
        );
        // Reverse the middle: 10 -> 0 -> 5 -> 4 -> 3 -> 2 -> 1 -> 6 ...
        let delta = next_values(&[(0, 5), (5, 4), (4, 3), (3, 2), (2, 1), (1, 6)]);
        filter.synchronize(&Assignment::new(), Some(&delta));
        assert_eq!(
            nodes_of(&state, 0),
            vec![10, 0, 5, 4, 3, 2, 1, 6, 7, 8, 9, 11]
        );
    }

    #[test]
    fn test_reset_returns_to_all_loops() {
        let (mut filter, state) = filter_with_state();
        filter.synchronize(&Assignment::new(), Some(&next_values(&[(4, 0), (0, 6)])));
        assert_eq!(state.borrow().path(0), Some(0));
        filter.reset();
        assert_eq!(nodes_of(&state, 0), vec![4, 6]);
        assert_eq!(state.borrow().path(0), None);
    }
}
