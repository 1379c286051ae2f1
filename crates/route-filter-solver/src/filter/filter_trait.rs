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

use route_filter_model::assignment::Assignment;

/// The contract every local-search filter exposes to the search engine.
///
/// Per neighbor the engine calls `relax` (a hint, may no-op), then `accept`;
/// a chosen neighbor is committed with `synchronize`, a rejected one is
/// undone with `revert` before the next `accept`. `accept` must never
/// mutate committed state, and must accept unconditionally (contributing 0)
/// when some delta variable is unbound (large-neighborhood search).
pub trait LocalSearchFilter {
    fn name(&self) -> &str;

    /// Precomputation hint for the incoming delta.
    fn relax(&mut self, _delta: &Assignment) {}

    /// True iff the neighbor is acceptable and this filter's objective
    /// bound fits under `objective_max`.
    fn accept(&mut self, delta: &Assignment, objective_min: i64, objective_max: i64) -> bool;

    /// Commits the chosen neighbor. `delta` is the neighbor's delta when
    /// the engine synchronizes incrementally, `None` for a full resync.
    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>);

    /// Drops any state left by a relaxed-then-rejected neighbor.
    fn revert(&mut self) {}

    /// This filter's contribution to the accepted neighbor's objective;
    /// a lower bound, 0 during LNS.
    fn accepted_objective_value(&self) -> i64 {
        0
    }

    /// This filter's contribution to the committed solution's objective.
    fn synchronized_objective_value(&self) -> i64 {
        0
    }
}

impl std::fmt::Debug for dyn LocalSearchFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSearchFilter")
            .field("name", &self.name())
            .finish()
    }
}

/// Committed snapshot of the next variables, as filters see them between
/// two synchronizations. A variable is synced iff it was bound the last
/// time it was synchronized.
#[derive(Debug, Clone)]
pub struct VarSnapshot {
    values: Vec<i64>,
    synced: Vec<bool>,
}

impl VarSnapshot {
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0; size],
            synced: vec![false; size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_synced(&self, var: usize) -> bool {
        self.synced.get(var).copied().unwrap_or(false)
    }

    /// Committed value of `var`. Only meaningful when `is_synced(var)`.
    #[inline]
    pub fn value(&self, var: usize) -> i64 {
        debug_assert!(self.synced[var]);
        self.values[var]
    }

    /// Applies a full assignment (clearing stale vars) or a delta.
    pub fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        match delta {
            Some(delta) if !delta.is_empty() => self.apply(delta),
            _ => {
                self.synced.fill(false);
                self.apply(assignment);
            }
        }
    }

    fn apply(&mut self, assignment: &Assignment) {
        for element in assignment.elements() {
            if element.var >= self.values.len() {
                continue;
            }
            if element.is_bound() {
                self.values[element.var] = element.value();
                self.synced[element.var] = true;
            } else {
                self.synced[element.var] = false;
            }
        }
    }
}
