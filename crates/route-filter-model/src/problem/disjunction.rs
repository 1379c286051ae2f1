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

/// How a soft disjunction's violation is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenaltyCostBehavior {
    /// Penalty scales with the number of missing active nodes.
    #[default]
    PenalizePerInactive,
    /// Penalty is charged once regardless of how many nodes are missing.
    PenalizeOnce,
}

/// A set of nodes among which at most `max_cardinality` may be active.
///
/// A positive `penalty` prices missing active nodes; a negative penalty
/// marks the disjunction mandatory (its magnitude carries no meaning), and
/// any violation rejects the neighbor outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disjunction {
    pub nodes: Vec<usize>,
    pub max_cardinality: usize,
    pub penalty: i64,
    pub penalty_cost_behavior: PenaltyCostBehavior,
}

impl Disjunction {
    pub fn new(nodes: Vec<usize>, max_cardinality: usize, penalty: i64) -> Self {
        Self {
            nodes,
            max_cardinality,
            penalty,
            penalty_cost_behavior: PenaltyCostBehavior::default(),
        }
    }

    pub fn with_behavior(mut self, behavior: PenaltyCostBehavior) -> Self {
        self.penalty_cost_behavior = behavior;
        self
    }

    #[inline]
    pub fn is_mandatory(&self) -> bool {
        self.penalty < 0
    }
}
