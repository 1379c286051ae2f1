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

//! Dimension analysis and filter-list assembly.
//!
//! Filter priorities, lowest evaluated first:
//! 0 — chain/path cumul without optimizers, 1 — path cumul with embedded
//! optimizers, 2 — cumul-bounds propagator, 3 — resource assignment
//! (external), 4 — global LP cumul.

use crate::checker::dimension_checker::DimensionChecker;
use crate::filter::chain_cumul::ChainCumulFilterLogic;
use crate::filter::dimension_filter::DimensionFilter;
use crate::filter::manager::{FilterEvent, FilterEventType};
use crate::filter::path_cumul::PathCumulFilterLogic;
use crate::filter::path_filter::PathFilter;
use crate::optim::route_lp::{LpRouteCumulOptimizer, OptimizerLevel};
use crate::state::path_state::PathState;
use route_filter_core::prelude::{cap_add, Interval};
use route_filter_model::problem::dimension::Dimension;
use route_filter_model::problem::model::RoutingModel;
use std::cell::RefCell;
use std::rc::Rc;

/// Options recognized by the dimension filter selector.
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Disables LP/MIP optimizers; only priority-0/1 path filters remain.
    pub disable_scheduling: bool,
    /// Whether filters bound the objective or only check feasibility.
    pub filter_objective_cost: bool,
    /// Use the O(chain) cumul filter on dimensions without cumul costs.
    pub use_chain_cumul_filter: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            disable_scheduling: false,
            filter_objective_cost: true,
            use_chain_cumul_filter: false,
        }
    }
}

/// True iff some cost is attached to the dimension's cumuls.
pub fn dimension_has_cumul_cost(dimension: &Dimension) -> bool {
    if dimension.global_span_cost_coefficient() != 0 {
        return true;
    }
    if dimension.has_soft_span_upper_bounds() {
        return true;
    }
    if dimension.has_quadratic_soft_span_upper_bounds() {
        return true;
    }
    if dimension
        .vehicle_span_cost_coefficients()
        .iter()
        .any(|&coefficient| coefficient != 0)
    {
        return true;
    }
    if dimension
        .vehicle_slack_cost_coefficients()
        .iter()
        .any(|&coefficient| coefficient != 0)
    {
        return true;
    }
    dimension.has_cumul_soft_upper_bounds()
        || dimension.has_cumul_soft_lower_bounds()
        || dimension.has_cumul_piecewise_linear_costs()
}

/// True iff some hard constraint binds the dimension's cumuls beyond the
/// per-vehicle capacity.
pub fn dimension_has_path_cumul_constraint(
    model: &RoutingModel,
    dimension: &Dimension,
) -> bool {
    if dimension.has_break_constraints() {
        return true;
    }
    if dimension.has_pickup_to_delivery_limits() {
        return true;
    }
    if dimension
        .vehicle_span_upper_bounds()
        .iter()
        .any(|&upper_bound| upper_bound != i64::MAX)
    {
        return true;
    }
    if (0..dimension.size()).any(|node| dimension.slack_bounds(node).min > 0) {
        return true;
    }
    for node in 0..dimension.num_nodes() {
        let cumul = dimension.cumul_bounds(node);
        if cumul.min > 0 && cumul.max < i64::MAX && !model.is_end(node) {
            return true;
        }
        if dimension.has_forbidden_intervals(node) {
            return true;
        }
    }
    false
}

/// Adds a `DimensionChecker`-backed filter per dimension, sharing
/// `path_state`. Lightweight: priority 0, pure feasibility.
pub fn append_lightweight_dimension_filters(
    model: &Rc<RoutingModel>,
    path_state: &Rc<RefCell<PathState>>,
    filters: &mut Vec<FilterEvent>,
) {
    for dimension_index in 0..model.dimensions().len() {
        let dimension = model.dimension(dimension_index);
        let num_vehicles = model.num_vehicles();
        let mut path_capacity = Vec::with_capacity(num_vehicles);
        let mut path_class = Vec::with_capacity(num_vehicles);
        for vehicle in 0..num_vehicles {
            path_capacity.push(Interval::new(0, dimension.vehicle_capacity(vehicle)));
            path_class.push(dimension.class_of_vehicle(vehicle));
        }
        // Demands mirror the per-class evaluators, widened by the slack
        // range; end nodes carry no demand.
        let num_classes = dimension.num_classes();
        let size = model.size();
        let mut demands: Vec<Box<dyn Fn(usize, usize) -> Interval>> = Vec::new();
        for class in 0..num_classes {
            let class_model = model.clone();
            demands.push(Box::new(move |node, next| {
                if node >= size {
                    return Interval::new(0, 0);
                }
                let dimension = class_model.dimension(dimension_index);
                let min_transit = match &dimension.class_evaluator(class).unary {
                    Some(unary) => unary(node),
                    None => (dimension.class_evaluator(class).binary)(node, next),
                };
                let max_transit = cap_add(min_transit, dimension.slack_bounds(node).max);
                Interval::new(min_transit, max_transit)
            }));
        }
        let node_capacity = dimension.cumul_bounds_slice().to_vec();
        let checker = DimensionChecker::new(
            path_state.clone(),
            path_capacity,
            path_class,
            demands,
            node_capacity,
        );
        filters.push(FilterEvent::with_priority(
            Box::new(DimensionFilter::new(checker, dimension.name())),
            FilterEventType::Accept,
            0,
        ));
    }
}

/// Adds the cumul filters of every dimension with the priorities listed in
/// the module docs. The cumul-bounds propagator and the global LP filter
/// depend on external collaborators and are appended by their own
/// constructors (`CumulBoundsPropagatorFilter`, `GlobalLpCumulFilter`).
pub fn append_dimension_cumul_filters(
    model: &Rc<RoutingModel>,
    options: FilterOptions,
    filters: &mut Vec<FilterEvent>,
) {
    let has_dimension_optimizers = !options.disable_scheduling;
    for dimension_index in 0..model.dimensions().len() {
        let dimension = model.dimension(dimension_index);
        let has_cumul_cost = dimension_has_cumul_cost(dimension);
        let use_path_cumul_filter =
            has_cumul_cost || dimension_has_path_cumul_constraint(model, dimension);

        if use_path_cumul_filter {
            let (lp_optimizer, mp_optimizer) = if has_dimension_optimizers {
                (
                    Some(Rc::new(RefCell::new(LpRouteCumulOptimizer::new(
                        model.clone(),
                        dimension_index,
                        OptimizerLevel::Lp,
                    )))
                        as Rc<RefCell<dyn crate::optim::RouteCumulOptimizer>>),
                    Some(Rc::new(RefCell::new(LpRouteCumulOptimizer::new(
                        model.clone(),
                        dimension_index,
                        OptimizerLevel::Mip,
                    )))
                        as Rc<RefCell<dyn crate::optim::RouteCumulOptimizer>>),
                )
            } else {
                (None, None)
            };
            let logic = PathCumulFilterLogic::new(
                model.clone(),
                dimension_index,
                /*propagate_own_objective_value=*/ true,
                options.filter_objective_cost,
                has_dimension_optimizers,
                lp_optimizer,
                mp_optimizer,
            );
            let priority = i32::from(logic.uses_dimension_optimizers());
            filters.push(FilterEvent::with_priority(
                Box::new(PathFilter::new(model.clone(), logic)),
                FilterEventType::Accept,
                priority,
            ));
        } else if options.use_chain_cumul_filter {
            filters.push(FilterEvent::with_priority(
                Box::new(PathFilter::new(
                    model.clone(),
                    ChainCumulFilterLogic::new(model.clone(), dimension_index),
                )),
                FilterEventType::Accept,
                0,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_filter_model::problem::dimension::{ClassEvaluator, SoftBound};

    fn plain_dimension() -> Dimension {
        Dimension::new(
            "load",
            4,
            3,
            vec![10],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        )
    }

    #[test]
    fn test_dimension_cost_analysis() {
        let plain = plain_dimension();
        assert!(!dimension_has_cumul_cost(&plain));
        let mut with_span_cost = plain_dimension();
        with_span_cost.set_span_cost_coefficient(0, 3);
        assert!(dimension_has_cumul_cost(&with_span_cost));
        let mut with_soft_bound = plain_dimension();
        with_soft_bound.set_cumul_soft_upper_bound(
            1,
            SoftBound {
                bound: 5,
                coefficient: 1,
            },
        );
        assert!(dimension_has_cumul_cost(&with_soft_bound));
    }

    #[test]
    fn test_dimension_constraint_analysis() {
        let model = RoutingModel::builder(2, 1).build().unwrap();
        let plain = plain_dimension();
        assert!(!dimension_has_path_cumul_constraint(&model, &plain));
        let mut with_span_bound = plain_dimension();
        with_span_bound.set_span_upper_bound(0, 5);
        assert!(dimension_has_path_cumul_constraint(&model, &with_span_bound));
        let mut with_forbidden = plain_dimension();
        with_forbidden.add_forbidden_interval(1, 3, 5);
        assert!(dimension_has_path_cumul_constraint(&model, &with_forbidden));
    }

    #[test]
    fn test_selector_assigns_priorities() {
        // One dimension rich enough for the optimizer (priority 1), one
        // constrained-only dimension (priority 0).
        let mut rich = Dimension::new(
            "time",
            4,
            3,
            vec![100],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        );
        rich.set_span_cost_coefficient(0, 2);
        rich.set_cumul_soft_upper_bound(
            1,
            SoftBound {
                bound: 5,
                coefficient: 1,
            },
        );
        rich.set_cumul_bounds(1, Interval::new(1, 9));
        let mut constrained = Dimension::new(
            "load",
            4,
            3,
            vec![100],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        );
        constrained.set_span_upper_bound(0, 5);
        let model = Rc::new(
            RoutingModel::builder(2, 1)
                .add_dimension(rich)
                .add_dimension(constrained)
                .build()
                .unwrap(),
        );
        let mut filters = Vec::new();
        append_dimension_cumul_filters(&model, FilterOptions::default(), &mut filters);
        let priorities: Vec<i32> = filters.iter().map(|event| event.priority).collect();
        assert_eq!(priorities, vec![1, 0]);

        let mut without_scheduling = Vec::new();
        append_dimension_cumul_filters(
            &model,
            FilterOptions {
                disable_scheduling: true,
                ..FilterOptions::default()
            },
            &mut without_scheduling,
        );
        let priorities: Vec<i32> = without_scheduling
            .iter()
            .map(|event| event.priority)
            .collect();
        assert_eq!(priorities, vec![0, 0]);
    }

    #[test]
    fn test_manager_drives_path_state_and_checker() {
        use crate::filter::manager::LocalSearchFilterManager;
        use crate::state::path_state_filter::PathStateFilter;
        use route_filter_model::assignment::Assignment;

        // One vehicle (start 3, end 4), unit demands, capacity 2.
        let mut dimension = Dimension::new(
            "load",
            5,
            4,
            vec![2],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        );
        dimension.set_slack_bounds(0, Interval::new(0, 0));
        let model = Rc::new(
            RoutingModel::builder(3, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let path_state = Rc::new(RefCell::new(PathState::new(
            model.num_nodes(),
            vec![model.start(0)],
            vec![model.end(0)],
        )));
        let mut filters = vec![FilterEvent::new(
            Box::new(PathStateFilter::new(path_state.clone())),
            FilterEventType::Relax,
        )];
        append_lightweight_dimension_filters(&model, &path_state, &mut filters);
        let mut manager = LocalSearchFilterManager::new(filters);

        // Route with 2 arcs fits capacity 2; commit it.
        let short_route = Assignment::from_next_values(&[4, 1, 2, 0]);
        let delta = Assignment::from_elements(vec![
            route_filter_model::assignment::VarValue::bound(3, 0),
            route_filter_model::assignment::VarValue::bound(0, 4),
        ]);
        assert!(manager.accept(&delta, i64::MIN, i64::MAX));
        manager.synchronize(&short_route, Some(&delta));
        assert_eq!(path_state.borrow().path(0), Some(0));

        // Extending to 4 arcs exceeds the capacity of 2.
        let long_delta = Assignment::from_elements(vec![
            route_filter_model::assignment::VarValue::bound(0, 1),
            route_filter_model::assignment::VarValue::bound(1, 2),
            route_filter_model::assignment::VarValue::bound(2, 4),
        ]);
        assert!(!manager.accept(&long_delta, i64::MIN, i64::MAX));
        // The rejection reverted the tentative state.
        assert!(path_state.borrow().changed_paths().is_empty());
    }

    #[test]
    fn test_lightweight_filters_share_path_state() {
        let dimension = plain_dimension();
        let model = Rc::new(
            RoutingModel::builder(2, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let path_state = Rc::new(RefCell::new(PathState::new(
            model.num_nodes(),
            vec![model.start(0)],
            vec![model.end(0)],
        )));
        let mut filters = Vec::new();
        append_lightweight_dimension_filters(&model, &path_state, &mut filters);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].priority, 0);
    }
}
