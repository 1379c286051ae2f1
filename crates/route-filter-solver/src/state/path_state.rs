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

//! Committable representation of all paths as chains of committed indices.
//!
//! The committed state keeps every path's nodes contiguous in
//! `committed_nodes`. A tentative change replaces a path's chain list with
//! slices of the committed array, so an operator that splices a segment
//! into a new position costs a handful of `ChainBounds`, not a rewalk.
//! `commit` promotes the tentative chains, `revert` drops them.

use smallvec::SmallVec;

/// Half-open slice `[begin_index, end_index)` of the committed node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainBounds {
    pub begin_index: usize,
    pub end_index: usize,
}

impl ChainBounds {
    #[inline]
    pub fn new(begin_index: usize, end_index: usize) -> Self {
        Self {
            begin_index,
            end_index,
        }
    }

    #[inline]
    pub fn num_nodes(self) -> usize {
        self.end_index - self.begin_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathBounds {
    begin_index: usize,
    end_index: usize,
}

/// A chain as a view over committed nodes.
#[derive(Debug, Clone, Copy)]
pub struct Chain<'a> {
    nodes: &'a [usize],
}

impl<'a> Chain<'a> {
    #[inline]
    pub fn first(&self) -> usize {
        self.nodes[0]
    }

    #[inline]
    pub fn last(&self) -> usize {
        self.nodes[self.nodes.len() - 1]
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = usize> + 'a {
        self.nodes.iter().copied()
    }

    #[inline]
    pub fn without_first_node(&self) -> impl Iterator<Item = usize> + 'a {
        self.nodes[1..].iter().copied()
    }
}

pub struct PathState {
    num_nodes: usize,
    num_paths: usize,
    num_nodes_threshold: usize,
    path_start_end: Vec<(usize, usize)>,
    committed_index: Vec<usize>,
    committed_paths: Vec<Option<usize>>,
    committed_nodes: Vec<usize>,
    // First `num_paths` slots hold each path's committed chain, then a
    // sentinel, then tentative chain lists appended by `change_path`.
    chains: Vec<ChainBounds>,
    paths: Vec<PathBounds>,
    changed_paths: Vec<usize>,
    changed_loops: Vec<usize>,
    is_invalid: bool,
}

impl PathState {
    /// Initial state: every path goes start -> end directly, every other
    /// node is a self-loop.
    pub fn new(num_nodes: usize, path_starts: Vec<usize>, path_ends: Vec<usize>) -> Self {
        debug_assert_eq!(path_starts.len(), path_ends.len());
        let num_paths = path_starts.len();
        let num_nodes_threshold = std::cmp::max(16, 4 * num_nodes);
        let mut committed_index = vec![usize::MAX; num_nodes];
        let mut committed_paths = vec![None; num_nodes];
        let mut committed_nodes = vec![0; 2 * num_paths];
        let mut chains = vec![ChainBounds::new(0, 0); num_paths + 1];
        let mut paths = vec![
            PathBounds {
                begin_index: 0,
                end_index: 0
            };
            num_paths
        ];
        let mut path_start_end = Vec::with_capacity(num_paths);
        for path in 0..num_paths {
            let index = 2 * path;
            let (start, end) = (path_starts[path], path_ends[path]);
            path_start_end.push((start, end));
            committed_index[start] = index;
            committed_index[end] = index + 1;
            committed_nodes[index] = start;
            committed_nodes[index + 1] = end;
            committed_paths[start] = Some(path);
            committed_paths[end] = Some(path);
            chains[path] = ChainBounds::new(index, index + 2);
            paths[path] = PathBounds {
                begin_index: path,
                end_index: path + 1,
            };
        }
        chains[num_paths] = ChainBounds::new(0, 0); // Sentinel.
        for node in 0..num_nodes {
            if committed_index[node] != usize::MAX {
                continue; // Start or end.
            }
            committed_index[node] = committed_nodes.len();
            committed_nodes.push(node);
        }
        Self {
            num_nodes,
            num_paths,
            num_nodes_threshold,
            path_start_end,
            committed_index,
            committed_paths,
            committed_nodes,
            chains,
            paths,
            changed_paths: Vec::new(),
            changed_loops: Vec::new(),
            is_invalid: false,
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    #[inline]
    pub fn start(&self, path: usize) -> usize {
        self.path_start_end[path].0
    }

    #[inline]
    pub fn end(&self, path: usize) -> usize {
        self.path_start_end[path].1
    }

    /// Position of `node` in the committed node array.
    #[inline]
    pub fn committed_index(&self, node: usize) -> usize {
        self.committed_index[node]
    }

    /// The committed chain covering `path`, as bounds into the committed
    /// node array.
    #[inline]
    pub fn committed_path_range(&self, path: usize) -> ChainBounds {
        self.chains[path]
    }

    /// Path of `node` in the committed state, `None` for loops.
    #[inline]
    pub fn path(&self, node: usize) -> Option<usize> {
        self.committed_paths[node]
    }

    #[inline]
    pub fn changed_paths(&self) -> &[usize] {
        &self.changed_paths
    }

    #[inline]
    pub fn changed_loops(&self) -> &[usize] {
        &self.changed_loops
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.is_invalid
    }

    /// Marks the tentative state unusable (e.g. the delta was unbound).
    /// Sticky until `revert`.
    #[inline]
    pub fn set_invalid(&mut self) {
        self.is_invalid = true;
    }

    /// The current (tentative if changed, else committed) chains of `path`.
    pub fn chains(&self, path: usize) -> impl Iterator<Item = Chain<'_>> {
        let bounds = self.paths[path];
        self.chains[bounds.begin_index..bounds.end_index]
            .iter()
            .map(|chain| Chain {
                nodes: &self.committed_nodes[chain.begin_index..chain.end_index],
            })
    }

    /// The current nodes of `path`, in order.
    pub fn nodes(&self, path: usize) -> impl Iterator<Item = usize> + '_ {
        self.chains(path).flat_map(|chain| chain.nodes())
    }

    /// Replaces `path`'s chain list for the tentative state. The chains
    /// must reference committed indices only.
    pub fn change_path(&mut self, path: usize, chains: &[ChainBounds]) {
        self.changed_paths.push(path);
        let begin_index = self.chains.len();
        self.chains.extend_from_slice(chains);
        let end_index = self.chains.len();
        self.paths[path] = PathBounds {
            begin_index,
            end_index,
        };
        self.chains.push(ChainBounds::new(0, 0)); // Sentinel.
    }

    /// Declares nodes that become self-loops in the tentative state.
    /// Nodes already off any path are ignored.
    pub fn change_loops(&mut self, new_loops: &[usize]) {
        for &node in new_loops {
            if self.path(node).is_none() {
                continue;
            }
            self.changed_loops.push(node);
        }
    }

    /// Promotes the tentative state. Incremental while the committed array
    /// stays below `max(16, 4 * num_nodes)` entries, else a full rewrite.
    pub fn commit(&mut self) {
        debug_assert!(!self.is_invalid());
        if self.committed_nodes.len() < self.num_nodes_threshold {
            self.incremental_commit();
        } else {
            tracing::trace!(
                committed_nodes = self.committed_nodes.len(),
                threshold = self.num_nodes_threshold,
                "path state full commit"
            );
            self.full_commit();
        }
    }

    /// Drops the tentative state.
    pub fn revert(&mut self) {
        self.is_invalid = false;
        self.chains.truncate(self.num_paths + 1);
        for &path in &self.changed_paths {
            self.paths[path] = PathBounds {
                begin_index: path,
                end_index: path + 1,
            };
        }
        self.changed_paths.clear();
        self.changed_loops.clear();
    }

    fn copy_new_path_at_end_of_nodes(&mut self, path: usize) {
        let path_bounds = self.paths[path];
        for chain_index in path_bounds.begin_index..path_bounds.end_index {
            let chain_bounds = self.chains[chain_index];
            for index in chain_bounds.begin_index..chain_bounds.end_index {
                let node = self.committed_nodes[index];
                self.committed_nodes.push(node);
            }
            let last_node = *self.committed_nodes.last().unwrap();
            if self.committed_paths[last_node] == Some(path) {
                continue;
            }
            for index in chain_bounds.begin_index..chain_bounds.end_index {
                let node = self.committed_nodes[index];
                self.committed_paths[node] = Some(path);
            }
        }
    }

    fn incremental_commit(&mut self) {
        let new_nodes_begin = self.committed_nodes.len();
        let changed_paths = std::mem::take(&mut self.changed_paths);
        for &path in &changed_paths {
            let chain_begin = self.committed_nodes.len();
            self.copy_new_path_at_end_of_nodes(path);
            let chain_end = self.committed_nodes.len();
            self.chains[path] = ChainBounds::new(chain_begin, chain_end);
        }
        self.changed_paths = changed_paths;
        // Re-index all copied nodes.
        for index in new_nodes_begin..self.committed_nodes.len() {
            let node = self.committed_nodes[index];
            self.committed_index[node] = index;
        }
        // New loops stay in place; only their path changes.
        for index in 0..self.changed_loops.len() {
            let node = self.changed_loops[index];
            self.committed_paths[node] = None;
        }
        self.revert();
    }

    fn full_commit(&mut self) {
        // Copy all paths at the end, then erase the old prefix.
        let old_num_nodes = self.committed_nodes.len();
        for path in 0..self.num_paths {
            let new_path_begin = self.committed_nodes.len() - old_num_nodes;
            self.copy_new_path_at_end_of_nodes(path);
            let new_path_end = self.committed_nodes.len() - old_num_nodes;
            self.chains[path] = ChainBounds::new(new_path_begin, new_path_end);
        }
        self.committed_nodes.drain(..old_num_nodes);

        // Reindex path nodes, then append loop nodes.
        self.committed_index.fill(usize::MAX);
        let mut index = 0;
        for &node in &self.committed_nodes {
            self.committed_index[node] = index;
            index += 1;
        }
        for node in 0..self.num_nodes {
            if self.committed_index[node] != usize::MAX {
                continue;
            }
            self.committed_index[node] = index;
            index += 1;
            self.committed_nodes.push(node);
            self.committed_paths[node] = None;
        }
        self.revert();
    }
}

/// Small-buffer chain list: most operators touch a path in at most a few
/// chains.
pub type ChainList = SmallVec<[ChainBounds; 4]>;

impl std::fmt::Debug for PathState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathState")
            .field("num_nodes", &self.num_nodes)
            .field("num_paths", &self.num_paths)
            .field("changed_paths", &self.changed_paths)
            .field("is_invalid", &self.is_invalid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_nodes(state: &PathState, path: usize) -> Vec<usize> {
        state.nodes(path).collect()
    }

    /// 5 regular nodes, 2 paths: starts 5, 6; ends 7, 8.
    fn two_path_state() -> PathState {
        PathState::new(9, vec![5, 6], vec![7, 8])
    }

    #[test]
    fn test_initial_state_is_empty_paths_and_loops() {
        let state = two_path_state();
        assert_eq!(collect_nodes(&state, 0), vec![5, 7]);
        assert_eq!(collect_nodes(&state, 1), vec![6, 8]);
        assert_eq!(state.path(0), None);
        assert_eq!(state.path(5), Some(0));
        // committed_index is a bijection onto [0, num_nodes).
        let mut seen = vec![false; 9];
        for node in 0..9 {
            let index = state.committed_index(node);
            assert!(!seen[index]);
            seen[index] = true;
        }
    }

    fn change_path_to_nodes(state: &mut PathState, path: usize, nodes: &[usize]) {
        // Build single-node chains from committed indices.
        let chains: Vec<ChainBounds> = nodes
            .iter()
            .map(|&node| {
                let index = state.committed_index(node);
                ChainBounds::new(index, index + 1)
            })
            .collect();
        state.change_path(path, &chains);
    }

    #[test]
    fn test_change_path_then_commit() {
        let mut state = two_path_state();
        change_path_to_nodes(&mut state, 0, &[5, 2, 0, 7]);
        assert_eq!(state.changed_paths(), &[0]);
        assert_eq!(collect_nodes(&state, 0), vec![5, 2, 0, 7]);
        state.commit();
        assert_eq!(collect_nodes(&state, 0), vec![5, 2, 0, 7]);
        assert_eq!(state.path(2), Some(0));
        assert_eq!(state.path(0), Some(0));
        assert!(state.changed_paths().is_empty());
        // Bijection still holds after commit.
        let mut seen = vec![false; 9];
        for node in 0..9 {
            let index = state.committed_index(node);
            assert!(index < 9);
            assert!(!seen[index]);
            seen[index] = true;
        }
        // Committed nodes of path 0 are contiguous, in order.
        let range = state.committed_path_range(0);
        assert_eq!(range.num_nodes(), 4);
        let base = range.begin_index;
        for (offset, &node) in [5, 2, 0, 7].iter().enumerate() {
            assert_eq!(state.committed_index(node), base + offset);
        }
    }

    #[test]
    fn test_revert_restores_committed_state() {
        let mut state = two_path_state();
        change_path_to_nodes(&mut state, 0, &[5, 2, 7]);
        state.change_loops(&[1]);
        state.revert();
        assert_eq!(collect_nodes(&state, 0), vec![5, 7]);
        assert!(state.changed_paths().is_empty());
        assert!(state.changed_loops().is_empty());
    }

    #[test]
    fn test_chain_reuse_after_commit() {
        let mut state = two_path_state();
        change_path_to_nodes(&mut state, 0, &[5, 1, 2, 3, 7]);
        state.commit();
        // Splice: reuse the committed chains [5,1,2,3] and [7], dropping
        // nothing but reordering through a single chain of length 3.
        let range = state.committed_path_range(0);
        let base = range.begin_index;
        // New path: 5, 2, 3, 1, 7 built from three committed slices.
        state.change_path(
            0,
            &[
                ChainBounds::new(base, base + 1),     // [5]
                ChainBounds::new(base + 2, base + 4), // [2, 3]
                ChainBounds::new(base + 1, base + 2), // [1]
                ChainBounds::new(base + 4, base + 5), // [7]
            ],
        );
        assert_eq!(collect_nodes(&state, 0), vec![5, 2, 3, 1, 7]);
        state.commit();
        assert_eq!(collect_nodes(&state, 0), vec![5, 2, 3, 1, 7]);
    }

    #[test]
    fn test_loops_leave_their_path() {
        let mut state = two_path_state();
        change_path_to_nodes(&mut state, 0, &[5, 1, 2, 7]);
        state.commit();
        change_path_to_nodes(&mut state, 0, &[5, 1, 7]);
        state.change_loops(&[2]);
        assert_eq!(state.changed_loops(), &[2]);
        state.commit();
        assert_eq!(state.path(2), None);
        assert_eq!(collect_nodes(&state, 0), vec![5, 1, 7]);
        // A node that was already a loop is not recorded again.
        state.change_loops(&[2]);
        assert!(state.changed_loops().is_empty());
    }

    #[test]
    fn test_set_invalid_is_sticky_until_revert() {
        let mut state = two_path_state();
        state.set_invalid();
        assert!(state.is_invalid());
        state.revert();
        assert!(!state.is_invalid());
    }

    #[test]
    fn test_many_commits_trigger_full_commit_and_stay_consistent() {
        let mut state = PathState::new(6, vec![2], vec![3]);
        // num_nodes_threshold = 24; each commit of a 4-node path adds 4
        // entries, so a full commit happens after a few rounds.
        for _ in 0..20 {
            change_path_to_nodes(&mut state, 0, &[2, 0, 1, 3]);
            state.commit();
            assert_eq!(collect_nodes(&state, 0), vec![2, 0, 1, 3]);
            let mut seen = vec![false; 6];
            for node in 0..6 {
                let index = state.committed_index(node);
                assert!(index < 6, "index out of range after full commit");
                assert!(!seen[index]);
                seen[index] = true;
            }
        }
    }
}
