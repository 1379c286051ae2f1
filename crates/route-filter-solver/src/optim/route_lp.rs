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

//! LP refinement of one route's cumul schedule, built on `good_lp` with
//! the default HiGHS solver.
//!
//! The model fixes the route's node sequence and schedules cumuls: one
//! variable per visited node plus one slack variable per arc, linked by
//! transit equalities, under hard cumul windows, vehicle capacity and span
//! limits. The objective prices slack/span coefficients, soft cumul bound
//! violations and the linear soft span bound. Forbidden intervals and
//! break placement are not expressible in the LP, so routes touching them
//! report `RelaxedOptimalOnly` at the `Lp` level; the `Mip` level adds the
//! mandatory-slack lower bounds breaks induce and reports `Optimal`.

use crate::optim::{DimensionSchedulingStatus, RouteCumulOptimizer};
use good_lp::{default_solver, variable, variables, Expression, SolverModel};
use route_filter_core::prelude::{cap_add, cap_prod};
use route_filter_model::problem::model::RoutingModel;
use std::rc::Rc;

/// Bound used in place of infinite variable bounds; HiGHS works on f64.
const LP_INFINITY: f64 = 1e15;

/// How faithfully break constraints are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerLevel {
    Lp,
    Mip,
}

pub struct LpRouteCumulOptimizer {
    model: Rc<RoutingModel>,
    dimension_index: usize,
    level: OptimizerLevel,
}

impl LpRouteCumulOptimizer {
    pub fn new(model: Rc<RoutingModel>, dimension_index: usize, level: OptimizerLevel) -> Self {
        Self {
            model,
            dimension_index,
            level,
        }
    }

    fn bound_to_f64(bound: i64) -> f64 {
        if bound == i64::MAX {
            LP_INFINITY
        } else if bound == i64::MIN {
            -LP_INFINITY
        } else {
            bound as f64
        }
    }
}

impl RouteCumulOptimizer for LpRouteCumulOptimizer {
    fn compute_route_cumul_cost_without_fixed_transits(
        &mut self,
        vehicle: usize,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
        cost: Option<&mut i64>,
    ) -> DimensionSchedulingStatus {
        let dimension = self.model.dimension(self.dimension_index);
        let size = self.model.size();

        // Extract the route fixed by the accessor.
        let mut route = vec![self.model.start(vehicle)];
        while *route.last().unwrap() < size {
            let Some(next) = next_accessor(*route.last().unwrap()) else {
                return DimensionSchedulingStatus::Infeasible;
            };
            if route.len() > size + 1 {
                return DimensionSchedulingStatus::Infeasible;
            }
            route.push(next);
        }
        let num_route_nodes = route.len();

        let mut is_relaxation = route
            .iter()
            .any(|&node| dimension.has_forbidden_intervals(node));

        let mut problem_variables = variables!();
        let capacity = dimension.vehicle_capacity(vehicle);
        let cumuls: Vec<_> = route
            .iter()
            .map(|&node| {
                let bounds = dimension.cumul_bounds(node);
                problem_variables.add(
                    variable()
                        .min(Self::bound_to_f64(bounds.min))
                        .max(Self::bound_to_f64(std::cmp::min(capacity, bounds.max))),
                )
            })
            .collect();
        let slacks: Vec<_> = route[..num_route_nodes - 1]
            .iter()
            .map(|&node| {
                let bounds = dimension.slack_bounds(node);
                problem_variables.add(
                    variable()
                        .min(Self::bound_to_f64(bounds.min))
                        .max(Self::bound_to_f64(bounds.max)),
                )
            })
            .collect();

        // Objective: slack/span coefficient on total slack, soft cumul
        // bound violations, soft span bound violation.
        let mut objective = Expression::from(0.0);
        let total_slack_coefficient = cap_add(
            dimension.vehicle_span_cost_coefficients()[vehicle],
            dimension.vehicle_slack_cost_coefficients()[vehicle],
        );
        if total_slack_coefficient != 0 {
            for &slack in &slacks {
                objective += total_slack_coefficient as f64 * slack;
            }
        }
        // Violation variables are declared here; their defining
        // constraints are added below once the problem object exists, in
        // the same route order.
        let mut penalty_terms: Vec<(good_lp::Variable, f64)> = Vec::new();
        for &node in &route {
            if let Some(soft_upper) = dimension.cumul_soft_upper_bound(node) {
                if soft_upper.coefficient > 0 {
                    let violation = problem_variables.add(variable().min(0.0));
                    penalty_terms.push((violation, soft_upper.coefficient as f64));
                }
            }
            if let Some(soft_lower) = dimension.cumul_soft_lower_bound(node) {
                if soft_lower.coefficient > 0 {
                    let violation = problem_variables.add(variable().min(0.0));
                    penalty_terms.push((violation, soft_lower.coefficient as f64));
                }
            }
        }
        let soft_span = dimension
            .soft_span_upper_bound(vehicle)
            .filter(|bound_cost| bound_cost.cost > 0);
        let span_violation = soft_span.map(|_| problem_variables.add(variable().min(0.0)));
        if dimension.has_quadratic_soft_span_upper_bounds() {
            // The quadratic term is not linearizable here.
            is_relaxation = true;
        }

        for &(violation, coefficient) in &penalty_terms {
            objective += coefficient * violation;
        }
        if let (Some(span_violation), Some(bound_cost)) = (span_violation, soft_span) {
            objective += bound_cost.cost as f64 * span_violation;
        }

        let mut problem = problem_variables
            .minimise(objective.clone())
            .using(default_solver);

        // Transit equalities: cumul[i + 1] == cumul[i] + transit + slack.
        for position in 0..num_route_nodes - 1 {
            let transit = dimension.transit(vehicle, route[position], route[position + 1]);
            problem.add_constraint(
                (cumuls[position + 1] - cumuls[position] - slacks[position])
                    .eq(transit as f64),
            );
        }
        // Hard span bound.
        let span_upper_bound = dimension.vehicle_span_upper_bounds()[vehicle];
        if span_upper_bound < i64::MAX {
            problem.add_constraint(
                (cumuls[num_route_nodes - 1] - cumuls[0]).leq(span_upper_bound as f64),
            );
        }
        // Soft bound violation definitions, in route order.
        let mut penalty_position = 0;
        for (position, &node) in route.iter().enumerate() {
            if let Some(soft_upper) = dimension.cumul_soft_upper_bound(node) {
                if soft_upper.coefficient > 0 {
                    let (violation, _) = penalty_terms[penalty_position];
                    penalty_position += 1;
                    problem.add_constraint(
                        (violation - cumuls[position]).geq(-(soft_upper.bound as f64)),
                    );
                }
            }
            if let Some(soft_lower) = dimension.cumul_soft_lower_bound(node) {
                if soft_lower.coefficient > 0 {
                    let (violation, _) = penalty_terms[penalty_position];
                    penalty_position += 1;
                    problem.add_constraint(
                        (violation + cumuls[position]).geq(soft_lower.bound as f64),
                    );
                }
            }
        }
        if let (Some(span_violation), Some(bound_cost)) = (span_violation, soft_span) {
            problem.add_constraint(
                (span_violation - cumuls[num_route_nodes - 1] + cumuls[0])
                    .geq(-(bound_cost.bound as f64)),
            );
        }

        // Break handling: at the Lp level breaks make the result a
        // relaxation; at the Mip level the induced slack lower bounds are
        // added, which is what the fixed-route schedule can express.
        let has_breaks = !dimension.break_windows(vehicle).is_empty()
            || !dimension.interbreak_limits(vehicle).is_empty();
        if has_breaks {
            match self.level {
                OptimizerLevel::Lp => is_relaxation = true,
                OptimizerLevel::Mip => {
                    let total_transit: i64 = route
                        .windows(2)
                        .map(|pair| dimension.transit(vehicle, pair[0], pair[1]))
                        .sum();
                    let mut min_total_slack: i64 = 0;
                    for limit in dimension.interbreak_limits(vehicle) {
                        if limit.max_interbreak == 0 || total_transit == 0 {
                            continue;
                        }
                        let num_breaks = (total_transit - 1) / limit.max_interbreak;
                        min_total_slack = std::cmp::max(
                            min_total_slack,
                            cap_prod(num_breaks, limit.min_break_duration),
                        );
                    }
                    if min_total_slack > 0 {
                        let total_slack = slacks
                            .iter()
                            .fold(Expression::from(0.0), |sum, &slack| sum + slack);
                        problem.add_constraint(total_slack.geq(min_total_slack as f64));
                    }
                }
            }
        }

        let Ok(solution) = problem.solve() else {
            return DimensionSchedulingStatus::Infeasible;
        };
        if let Some(cost) = cost {
            *cost = objective.eval_with(&solution).round() as i64;
        }
        if is_relaxation {
            DimensionSchedulingStatus::RelaxedOptimalOnly
        } else {
            DimensionSchedulingStatus::Optimal
        }
    }
}
