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

//! Black-box cumul optimizers the expensive filters escalate to.

pub mod route_lp;

/// Outcome of a cumul scheduling call. A timeout surfaces as `Infeasible`
/// and must be treated as a soft reject by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSchedulingStatus {
    Optimal,
    /// Only the relaxed problem was solved to optimality; a finer
    /// optimizer can still tighten or refute the result.
    RelaxedOptimalOnly,
    Infeasible,
}

/// Per-route cumul optimizer: schedules one vehicle's route as fixed by
/// `next_accessor` and reports the cumul-related cost (excluding fixed
/// transits) through `cost` when requested.
pub trait RouteCumulOptimizer {
    fn compute_route_cumul_cost_without_fixed_transits(
        &mut self,
        vehicle: usize,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
        cost: Option<&mut i64>,
    ) -> DimensionSchedulingStatus;
}

/// Whole-fleet cumul optimizer used by the global LP filter.
pub trait GlobalCumulOptimizer {
    /// Feasibility only.
    fn compute_cumuls(
        &mut self,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
    ) -> DimensionSchedulingStatus;

    fn compute_cumul_cost_without_fixed_transits(
        &mut self,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
        cost: &mut i64,
    ) -> DimensionSchedulingStatus;
}
