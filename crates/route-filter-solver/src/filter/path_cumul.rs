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

//! The full cumul dimension filter: hard windows, capacities, span
//! limits, slack and span costs, soft and piecewise-linear cumul costs,
//! global span cost, pickup-to-delivery limits, precedences, break-induced
//! slack bounds, with optional LP/MIP refinement.
//!
//! Per accepted path the filter rewalks the proposed route once, caching
//! node sequences and transits so span bounds and backward walks reuse
//! them; committed bookkeeping lives in `current_*` members, per-delta
//! scratch in `delta_*` members reset by `initialize_accept_path`.

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use crate::optim::{DimensionSchedulingStatus, RouteCumulOptimizer};
use route_filter_core::prelude::{cap_add, cap_add_to, cap_prod, cap_sub, Interval, SparseBitset};
use route_filter_model::problem::dimension::{Dimension, NodePrecedence, SoftBound};
use route_filter_model::problem::model::RoutingModel;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// The best path cumul value of a solution, the path supporting it, and
/// the per-path values needed to recompute it when the support changes.
#[derive(Debug, Clone)]
struct SupportedPathCumul {
    cumul_value: i64,
    cumul_value_support: Option<usize>,
    path_values: Vec<i64>,
}

impl SupportedPathCumul {
    fn new() -> Self {
        Self {
            cumul_value: 0,
            cumul_value_support: None,
            path_values: Vec::new(),
        }
    }
}

/// Caches node sequences and transit values of paths; nodes are pushed in
/// path order.
#[derive(Debug, Clone, Default)]
struct PathTransits {
    // paths[r][i] is the i-th node on path r; transits[r][i] the transit
    // between nodes i and i+1.
    paths: Vec<Vec<usize>>,
    transits: Vec<Vec<i64>>,
}

impl PathTransits {
    fn clear(&mut self) {
        self.paths.clear();
        self.transits.clear();
    }

    fn clear_path(&mut self, path: usize) {
        self.paths[path].clear();
        self.transits[path].clear();
    }

    fn add_paths(&mut self, num_paths: usize) -> usize {
        let first_path = self.paths.len();
        self.paths.resize(first_path + num_paths, Vec::new());
        self.transits.resize(first_path + num_paths, Vec::new());
        first_path
    }

    fn reserve_transits(&mut self, path: usize, number_of_route_arcs: usize) {
        self.transits[path].reserve(number_of_route_arcs);
        self.paths[path].reserve(number_of_route_arcs + 1);
    }

    /// Stores the transit between `node` and `next`; `node` must extend
    /// the path pushed so far.
    fn push_transit(&mut self, path: usize, node: usize, next: usize, transit: i64) {
        self.transits[path].push(transit);
        if self.paths[path].is_empty() {
            self.paths[path].push(node);
        }
        debug_assert_eq!(*self.paths[path].last().unwrap(), node);
        self.paths[path].push(next);
    }

    fn num_paths(&self) -> usize {
        self.paths.len()
    }

    fn path_size(&self, path: usize) -> usize {
        self.paths[path].len()
    }

    fn node(&self, path: usize, position: usize) -> usize {
        self.paths[path][position]
    }

    fn transit(&self, path: usize, position: usize) -> i64 {
        self.transits[path][position]
    }
}

pub type SharedRouteCumulOptimizer = Rc<RefCell<dyn RouteCumulOptimizer>>;

pub struct PathCumulFilterLogic {
    model: Rc<RoutingModel>,
    dimension_index: usize,
    name: String,
    initial_cumul: Vec<Interval>,
    initial_slack: Vec<Interval>,
    vehicle_span_upper_bounds: Vec<i64>,
    has_vehicle_span_upper_bounds: bool,
    total_current_cumul_cost_value: i64,
    synchronized_objective_value: i64,
    accepted_objective_value: i64,
    // Committed per-path cumul costs, keyed by the path's start node.
    current_cumul_cost_values: HashMap<usize, i64>,
    cumul_cost_delta: i64,
    // Cumul cost values of paths in the delta, indexed by vehicle.
    delta_path_cumul_cost_values: Vec<i64>,
    global_span_cost_coefficient: i64,
    // Empty when the dimension carries no such bounds.
    cumul_soft_upper_bounds: Vec<SoftBound>,
    cumul_soft_lower_bounds: Vec<SoftBound>,
    has_cumul_piecewise_linear_costs: bool,
    vehicle_total_slack_cost_coefficients: Vec<i64>,
    has_nonzero_vehicle_total_slack_cost_coefficients: bool,
    vehicle_capacities: Vec<i64>,
    // All precedences a node participates in; empty when none exist.
    node_index_to_precedences: Vec<Vec<NodePrecedence>>,
    current_min_start: SupportedPathCumul,
    current_max_end: SupportedPathCumul,
    current_path_transits: PathTransits,
    current_min_max_node_cumuls: Vec<(i64, i64)>,
    delta_path_transits: PathTransits,
    delta_max_end_cumul: i64,
    delta_nodes_with_precedences_and_changed_cumul: SparseBitset,
    node_with_precedence_to_delta_min_max_cumuls: HashMap<usize, (i64, i64)>,
    delta_paths: BTreeSet<usize>,
    lp_optimizer: Option<SharedRouteCumulOptimizer>,
    mp_optimizer: Option<SharedRouteCumulOptimizer>,
    filter_objective_cost: bool,
    may_use_optimizers: bool,
    propagate_own_objective_value: bool,
    min_path_cumuls: Vec<i64>,
}

impl PathCumulFilterLogic {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Rc<RoutingModel>,
        dimension_index: usize,
        propagate_own_objective_value: bool,
        filter_objective_cost: bool,
        may_use_optimizers: bool,
        lp_optimizer: Option<SharedRouteCumulOptimizer>,
        mp_optimizer: Option<SharedRouteCumulOptimizer>,
    ) -> Self {
        let dimension = model.dimension(dimension_index);
        let num_nodes = model.num_nodes();
        let size = model.size();
        let num_vehicles = model.num_vehicles();
        let name = format!("PathCumulFilter({})", dimension.name());

        let initial_cumul = dimension.cumul_bounds_slice().to_vec();
        let initial_slack: Vec<Interval> =
            (0..size).map(|node| dimension.slack_bounds(node)).collect();

        let vehicle_span_upper_bounds = dimension.vehicle_span_upper_bounds().to_vec();
        let has_vehicle_span_upper_bounds = vehicle_span_upper_bounds
            .iter()
            .any(|&upper_bound| upper_bound != i64::MAX);

        let cumul_soft_upper_bounds = if dimension.has_cumul_soft_upper_bounds() {
            (0..num_nodes)
                .map(|node| {
                    dimension.cumul_soft_upper_bound(node).unwrap_or(SoftBound {
                        bound: i64::MAX,
                        coefficient: 0,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        let cumul_soft_lower_bounds = if dimension.has_cumul_soft_lower_bounds() {
            (0..num_nodes)
                .map(|node| {
                    dimension.cumul_soft_lower_bound(node).unwrap_or(SoftBound {
                        bound: 0,
                        coefficient: 0,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut vehicle_total_slack_cost_coefficients =
            dimension.vehicle_total_slack_cost_coefficients();
        // Without any hard cumul bound, slacks are unconstrained at their
        // minimum and the span/slack coefficients reduce to the transit
        // part, which the arc cost filters already cover. The global span
        // filter is unaffected.
        let has_cumul_hard_bounds = initial_slack.iter().any(|slack| slack.min > 0)
            || initial_cumul
                .iter()
                .any(|cumul| cumul.min > 0 || cumul.max < i64::MAX);
        if !has_cumul_hard_bounds {
            vehicle_total_slack_cost_coefficients = vec![0; num_vehicles];
        }
        let has_nonzero_vehicle_total_slack_cost_coefficients =
            vehicle_total_slack_cost_coefficients
                .iter()
                .any(|&coefficient| coefficient != 0);

        let node_precedences = dimension.node_precedences();
        let mut node_index_to_precedences = Vec::new();
        let mut current_min_max_node_cumuls = Vec::new();
        if !node_precedences.is_empty() {
            node_index_to_precedences = vec![Vec::new(); num_nodes];
            for precedence in node_precedences {
                node_index_to_precedences[precedence.first_node].push(*precedence);
                node_index_to_precedences[precedence.second_node].push(*precedence);
            }
            current_min_max_node_cumuls = vec![(-1, -1); num_nodes];
        }

        Self {
            name,
            initial_cumul,
            initial_slack,
            vehicle_span_upper_bounds,
            has_vehicle_span_upper_bounds,
            total_current_cumul_cost_value: 0,
            synchronized_objective_value: 0,
            accepted_objective_value: 0,
            current_cumul_cost_values: HashMap::new(),
            cumul_cost_delta: 0,
            delta_path_cumul_cost_values: vec![i64::MIN; num_vehicles],
            global_span_cost_coefficient: dimension.global_span_cost_coefficient(),
            cumul_soft_upper_bounds,
            cumul_soft_lower_bounds,
            has_cumul_piecewise_linear_costs: dimension.has_cumul_piecewise_linear_costs(),
            vehicle_total_slack_cost_coefficients,
            has_nonzero_vehicle_total_slack_cost_coefficients,
            vehicle_capacities: dimension.vehicle_capacities().to_vec(),
            node_index_to_precedences,
            current_min_start: SupportedPathCumul::new(),
            current_max_end: SupportedPathCumul::new(),
            current_path_transits: PathTransits::default(),
            current_min_max_node_cumuls,
            delta_path_transits: PathTransits::default(),
            delta_max_end_cumul: i64::MIN,
            delta_nodes_with_precedences_and_changed_cumul: SparseBitset::new(size),
            node_with_precedence_to_delta_min_max_cumuls: HashMap::new(),
            delta_paths: BTreeSet::new(),
            lp_optimizer,
            mp_optimizer,
            filter_objective_cost,
            may_use_optimizers,
            propagate_own_objective_value,
            min_path_cumuls: Vec::new(),
            model,
            dimension_index,
        }
    }

    #[inline]
    fn dimension(&self) -> &Dimension {
        self.model.dimension(self.dimension_index)
    }

    pub fn uses_dimension_optimizers(&self) -> bool {
        if !self.may_use_optimizers {
            return false;
        }
        (0..self.model.num_vehicles())
            .any(|vehicle| self.filter_with_optimizer_for_vehicle(vehicle))
    }

    // Feature predicates.

    fn filter_span_cost(&self) -> bool {
        self.global_span_cost_coefficient != 0
    }

    fn filter_slack_cost(&self) -> bool {
        self.has_nonzero_vehicle_total_slack_cost_coefficients
            || self.has_vehicle_span_upper_bounds
    }

    fn filter_break_cost(&self, vehicle: usize) -> bool {
        let dimension = self.dimension();
        dimension.has_break_constraints()
            && (!dimension.break_windows(vehicle).is_empty()
                || !dimension.interbreak_limits(vehicle).is_empty())
    }

    fn filter_cumul_soft_bounds(&self) -> bool {
        !self.cumul_soft_upper_bounds.is_empty()
    }

    fn filter_cumul_soft_lower_bounds(&self) -> bool {
        !self.cumul_soft_lower_bounds.is_empty()
    }

    fn filter_cumul_piecewise_linear_costs(&self) -> bool {
        self.has_cumul_piecewise_linear_costs
    }

    fn filter_precedences(&self) -> bool {
        !self.node_index_to_precedences.is_empty()
    }

    fn filter_soft_span_cost(&self) -> bool {
        self.dimension().has_soft_span_upper_bounds()
    }

    fn filter_soft_span_cost_for_vehicle(&self, vehicle: usize) -> bool {
        self.dimension()
            .soft_span_upper_bound(vehicle)
            .is_some_and(|bound_cost| bound_cost.cost > 0)
    }

    fn filter_soft_span_quadratic_cost(&self) -> bool {
        self.dimension().has_quadratic_soft_span_upper_bounds()
    }

    fn filter_soft_span_quadratic_cost_for_vehicle(&self, vehicle: usize) -> bool {
        self.dimension()
            .quadratic_soft_span_upper_bound(vehicle)
            .is_some_and(|bound_cost| bound_cost.cost > 0)
    }

    /// The optimizer sharpens the cumul cost when at least two cost or
    /// constraint families interact on the vehicle; with breaks it is also
    /// needed for feasibility.
    fn filter_with_optimizer_for_vehicle(&self, vehicle: usize) -> bool {
        if !self.may_use_optimizers || self.filter_cumul_piecewise_linear_costs() {
            return false;
        }
        let dimension = self.dimension();
        let mut num_linear_constraints = 0;
        if dimension.vehicle_span_cost_coefficients()[vehicle] > 0
            || dimension.vehicle_slack_cost_coefficients()[vehicle] > 0
        {
            num_linear_constraints += 1;
        }
        if self.filter_soft_span_cost_for_vehicle(vehicle) {
            num_linear_constraints += 1;
        }
        if self.filter_cumul_soft_lower_bounds() {
            num_linear_constraints += 1;
        }
        if self.filter_cumul_soft_bounds() {
            num_linear_constraints += 1;
        }
        if self.vehicle_span_upper_bounds[vehicle] < i64::MAX {
            num_linear_constraints += 1;
        }
        let has_breaks = self.filter_break_cost(vehicle);
        if has_breaks {
            num_linear_constraints += 1;
        }
        num_linear_constraints >= 2 && (has_breaks || self.filter_objective_cost)
    }

    fn has_any_cumul_feature(&self) -> bool {
        self.filter_span_cost()
            || self.filter_cumul_soft_bounds()
            || self.filter_slack_cost()
            || self.filter_cumul_soft_lower_bounds()
            || self.filter_cumul_piecewise_linear_costs()
            || self.filter_precedences()
            || self.filter_soft_span_cost()
            || self.filter_soft_span_quadratic_cost()
    }

    // Per-node cost helpers.

    fn get_cumul_soft_cost(&self, node: usize, cumul_value: i64) -> i64 {
        if node < self.cumul_soft_upper_bounds.len() {
            let SoftBound { bound, coefficient } = self.cumul_soft_upper_bounds[node];
            if coefficient > 0 && bound < cumul_value {
                return cap_prod(cap_sub(cumul_value, bound), coefficient);
            }
        }
        0
    }

    fn get_cumul_piecewise_linear_cost(&self, node: usize, cumul_value: i64) -> i64 {
        if !self.has_cumul_piecewise_linear_costs {
            return 0;
        }
        self.dimension()
            .cumul_piecewise_linear_cost(node)
            .map_or(0, |cost| cost.value(cumul_value))
    }

    fn get_cumul_soft_lower_bound_cost(&self, node: usize, cumul_value: i64) -> i64 {
        if node < self.cumul_soft_lower_bounds.len() {
            let SoftBound { bound, coefficient } = self.cumul_soft_lower_bounds[node];
            if coefficient > 0 && bound > cumul_value {
                return cap_prod(cap_sub(bound, cumul_value), coefficient);
            }
        }
        0
    }

    /// Soft lower bound cost of a whole path, walking backwards from the
    /// latest possible end.
    fn get_path_cumul_soft_lower_bound_cost(
        &self,
        path_transits: &PathTransits,
        path: usize,
    ) -> i64 {
        let path_size = path_transits.path_size(path);
        if path_size == 0 {
            return 0;
        }
        let mut node = path_transits.node(path, path_size - 1);
        let mut cumul = self.initial_cumul[node].max;
        let mut current_cumul_cost_value = self.get_cumul_soft_lower_bound_cost(node, cumul);
        for i in (0..path_size - 1).rev() {
            node = path_transits.node(path, i);
            cumul = cap_sub(cumul, path_transits.transit(path, i));
            cumul = std::cmp::min(self.initial_cumul[node].max, cumul);
            cap_add_to(
                self.get_cumul_soft_lower_bound_cost(node, cumul),
                &mut current_cumul_cost_value,
            );
        }
        current_cumul_cost_value
    }

    fn initialize_supported_path_cumul(
        supported_cumul: &mut SupportedPathCumul,
        default_value: i64,
        num_paths: usize,
    ) {
        supported_cumul.cumul_value = default_value;
        supported_cumul.cumul_value_support = None;
        supported_cumul.path_values.clear();
        supported_cumul.path_values.resize(num_paths, default_value);
    }

    /// Max start cumul of a path given a minimal end cumul. The min-end
    /// walk never jumps over forbidden intervals (it bounds the span from
    /// below); the concurrent max-end walk does, and the tighter of the
    /// two wins.
    fn compute_path_max_start_from_end_cumul(
        &self,
        path_transits: &PathTransits,
        path: usize,
        path_start: usize,
        min_end_cumul: i64,
    ) -> i64 {
        let dimension = self.dimension();
        let vehicle = self.model.paths().vehicle_of(path_start).unwrap_or(0);
        let mut cumul_from_min_end = min_end_cumul;
        let mut cumul_from_max_end = self.initial_cumul[self.model.end(vehicle)].max;
        let path_size = path_transits.path_size(path);
        if path_size >= 2 {
            for i in (0..path_size - 1).rev() {
                let transit = path_transits.transit(path, i);
                let node = path_transits.node(path, i);
                cumul_from_min_end = std::cmp::min(
                    self.initial_cumul[node].max,
                    cap_sub(cumul_from_min_end, transit),
                );
                cumul_from_max_end = dimension
                    .last_possible_value_le(node, cap_sub(cumul_from_max_end, transit));
            }
        }
        std::cmp::min(cumul_from_min_end, cumul_from_max_end)
    }

    /// For every pickup/delivery pair visited on the delta path,
    /// `min_cumul(delivery) - max_cumul(pickup)` must respect the pair's
    /// limit. Walks backwards with the max cumul, remembering each
    /// delivery's min cumul until its pickup is reached.
    fn pickup_to_delivery_limits_respected(&self, path: usize) -> bool {
        let dimension = self.dimension();
        if !dimension.has_pickup_to_delivery_limits() {
            return true;
        }
        let num_pairs = self.model.pickup_delivery_pairs().len();
        debug_assert!(num_pairs > 0);
        let mut visited_delivery_and_min_cumul_per_pair: Vec<(Option<usize>, i64)> =
            vec![(None, -1); num_pairs];
        let path_transits = &self.delta_path_transits;
        let path_size = path_transits.path_size(path);
        debug_assert_eq!(self.min_path_cumuls.len(), path_size);

        let mut max_cumul = *self.min_path_cumuls.last().unwrap();
        for i in (0..path_size - 1).rev() {
            let node_index = path_transits.node(path, i);
            max_cumul = cap_sub(max_cumul, path_transits.transit(path, i));
            max_cumul = std::cmp::min(self.initial_cumul[node_index].max, max_cumul);

            if let Some(pickup_position) = self.model.pickup_position(node_index) {
                let (delivery_alternative, delivery_min_cumul) =
                    visited_delivery_and_min_cumul_per_pair[pickup_position.pair_index];
                let Some(delivery_alternative) = delivery_alternative else {
                    // No delivery of this pair after the pickup.
                    continue;
                };
                let limit = dimension.pickup_to_delivery_limit(
                    pickup_position.pair_index,
                    pickup_position.alternative_index,
                    delivery_alternative,
                );
                if cap_sub(delivery_min_cumul, max_cumul) > limit {
                    return false;
                }
            } else if let Some(delivery_position) = self.model.delivery_position(node_index) {
                let entry =
                    &mut visited_delivery_and_min_cumul_per_pair[delivery_position.pair_index];
                debug_assert!(entry.0.is_none());
                entry.0 = Some(delivery_position.alternative_index);
                entry.1 = self.min_path_cumuls[i];
            }
        }
        true
    }

    /// Stores per-node min/max cumuls of the walked path; in delta mode,
    /// nodes with precedences whose cumuls changed are marked for the
    /// finalize pass.
    fn store_min_max_cumul_of_nodes_on_path(&mut self, path: usize, is_delta: bool) {
        let path_size = if is_delta {
            self.delta_path_transits.path_size(path)
        } else {
            self.current_path_transits.path_size(path)
        };
        debug_assert_eq!(self.min_path_cumuls.len(), path_size);
        if path_size == 0 {
            return;
        }
        let last_node = if is_delta {
            self.delta_path_transits.node(path, path_size - 1)
        } else {
            self.current_path_transits.node(path, path_size - 1)
        };
        let mut max_cumul = self.initial_cumul[last_node].max;
        for i in (0..path_size).rev() {
            let (node_index, transit) = if is_delta {
                (
                    self.delta_path_transits.node(path, i),
                    if i < path_size - 1 {
                        self.delta_path_transits.transit(path, i)
                    } else {
                        0
                    },
                )
            } else {
                (
                    self.current_path_transits.node(path, i),
                    if i < path_size - 1 {
                        self.current_path_transits.transit(path, i)
                    } else {
                        0
                    },
                )
            };
            if i < path_size - 1 {
                max_cumul = cap_sub(max_cumul, transit);
                max_cumul = std::cmp::min(self.initial_cumul[node_index].max, max_cumul);
            }

            if is_delta && self.node_index_to_precedences[node_index].is_empty() {
                // Only nodes with precedences matter in the delta map.
                continue;
            }
            let min_max = (self.min_path_cumuls[i], max_cumul);
            if is_delta {
                self.node_with_precedence_to_delta_min_max_cumuls
                    .insert(node_index, min_max);
                if !self.model.is_end(node_index)
                    && min_max != self.current_min_max_node_cumuls[node_index]
                {
                    self.delta_nodes_with_precedences_and_changed_cumul
                        .set(node_index);
                }
            } else {
                self.current_min_max_node_cumuls[node_index] = min_max;
            }
        }
    }
}

impl PathFilterLogic for PathCumulFilterLogic {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_before_synchronize_paths(&mut self, base: &PathFilterBase) {
        self.total_current_cumul_cost_value = 0;
        self.cumul_cost_delta = 0;
        self.current_cumul_cost_values.clear();
        if base.has_any_synced_path() && self.has_any_cumul_feature() {
            let num_paths = base.num_paths();
            let mut current_min_start = std::mem::replace(
                &mut self.current_min_start,
                SupportedPathCumul::new(),
            );
            let mut current_max_end =
                std::mem::replace(&mut self.current_max_end, SupportedPathCumul::new());
            Self::initialize_supported_path_cumul(&mut current_min_start, i64::MAX, num_paths);
            Self::initialize_supported_path_cumul(&mut current_max_end, i64::MIN, num_paths);
            self.current_path_transits.clear();
            self.current_path_transits.add_paths(num_paths);
            // Compute every path's minimum end cumul; keep the max.
            for path in 0..num_paths {
                let start = base.start(path);
                if !base.is_var_synced(start) {
                    continue;
                }
                let vehicle = path;
                let size = base.size();
                // First pass: route length, to reserve the cache.
                let mut number_of_route_arcs = 0;
                let mut node = start;
                while node < size {
                    number_of_route_arcs += 1;
                    node = base.value(node);
                }
                self.current_path_transits
                    .reserve_transits(path, number_of_route_arcs);
                // Second pass: cumuls, transits and costs.
                let mut node = start;
                let mut cumul = self.initial_cumul[node].min;
                self.min_path_cumuls.clear();
                self.min_path_cumuls.push(cumul);
                let mut current_cumul_cost_value = cap_add(
                    self.get_cumul_soft_cost(node, cumul),
                    self.get_cumul_piecewise_linear_cost(node, cumul),
                );
                let mut total_transit = 0;
                while node < size {
                    let next = base.value(node);
                    let transit = self.dimension().transit(vehicle, node, next);
                    cap_add_to(transit, &mut total_transit);
                    let transit_slack = cap_add(transit, self.initial_slack[node].min);
                    self.current_path_transits
                        .push_transit(path, node, next, transit_slack);
                    cap_add_to(transit_slack, &mut cumul);
                    cumul = self.dimension().first_possible_value_ge(next, cumul);
                    cumul = std::cmp::max(self.initial_cumul[next].min, cumul);
                    self.min_path_cumuls.push(cumul);
                    node = next;
                    cap_add_to(
                        self.get_cumul_soft_cost(node, cumul),
                        &mut current_cumul_cost_value,
                    );
                    cap_add_to(
                        self.get_cumul_piecewise_linear_cost(node, cumul),
                        &mut current_cumul_cost_value,
                    );
                }
                if self.filter_precedences() {
                    self.store_min_max_cumul_of_nodes_on_path(path, false);
                }
                if number_of_route_arcs == 1
                    && !self.model.is_vehicle_used_when_empty(vehicle)
                {
                    // Empty route (single start -> end arc), not costed.
                    self.current_cumul_cost_values.insert(start, 0);
                    self.current_path_transits.clear_path(path);
                    continue;
                }
                if self.filter_slack_cost()
                    || self.filter_soft_span_cost()
                    || self.filter_soft_span_quadratic_cost()
                {
                    let path_start = self.compute_path_max_start_from_end_cumul(
                        &self.current_path_transits,
                        path,
                        start,
                        cumul,
                    );
                    let span_lower_bound = cap_sub(cumul, path_start);
                    if self.filter_slack_cost() {
                        cap_add_to(
                            cap_prod(
                                self.vehicle_total_slack_cost_coefficients[vehicle],
                                cap_sub(span_lower_bound, total_transit),
                            ),
                            &mut current_cumul_cost_value,
                        );
                    }
                    if self.filter_soft_span_cost() {
                        if let Some(bound_cost) = self.dimension().soft_span_upper_bound(vehicle)
                        {
                            if bound_cost.bound < span_lower_bound {
                                let violation = cap_sub(span_lower_bound, bound_cost.bound);
                                cap_add_to(
                                    cap_prod(bound_cost.cost, violation),
                                    &mut current_cumul_cost_value,
                                );
                            }
                        }
                    }
                    if self.filter_soft_span_quadratic_cost() {
                        if let Some(bound_cost) =
                            self.dimension().quadratic_soft_span_upper_bound(vehicle)
                        {
                            if bound_cost.bound < span_lower_bound {
                                let violation = cap_sub(span_lower_bound, bound_cost.bound);
                                cap_add_to(
                                    cap_prod(bound_cost.cost, cap_prod(violation, violation)),
                                    &mut current_cumul_cost_value,
                                );
                            }
                        }
                    }
                }
                if self.filter_cumul_soft_lower_bounds() {
                    cap_add_to(
                        self.get_path_cumul_soft_lower_bound_cost(
                            &self.current_path_transits,
                            path,
                        ),
                        &mut current_cumul_cost_value,
                    );
                }
                if self.filter_with_optimizer_for_vehicle(vehicle) {
                    // The only admissible failure here is an LP timeout.
                    let mut lp_cumul_cost_value = 0;
                    let use_mp = self.filter_soft_span_quadratic_cost_for_vehicle(vehicle)
                        || self.filter_break_cost(vehicle);
                    let optimizer = if use_mp {
                        self.mp_optimizer.clone()
                    } else {
                        self.lp_optimizer.clone()
                    };
                    if let Some(optimizer) = optimizer {
                        let next_accessor = |node: usize| {
                            if base.is_var_synced(node) {
                                Some(base.value(node))
                            } else {
                                None
                            }
                        };
                        let status = optimizer
                            .borrow_mut()
                            .compute_route_cumul_cost_without_fixed_transits(
                                vehicle,
                                &next_accessor,
                                self.filter_objective_cost
                                    .then_some(&mut lp_cumul_cost_value),
                            );
                        match status {
                            DimensionSchedulingStatus::Infeasible => {
                                lp_cumul_cost_value = 0;
                            }
                            DimensionSchedulingStatus::RelaxedOptimalOnly => {
                                if let Some(mp_optimizer) = self.mp_optimizer.clone() {
                                    if mp_optimizer
                                        .borrow_mut()
                                        .compute_route_cumul_cost_without_fixed_transits(
                                            vehicle,
                                            &next_accessor,
                                            self.filter_objective_cost
                                                .then_some(&mut lp_cumul_cost_value),
                                        )
                                        == DimensionSchedulingStatus::Infeasible
                                    {
                                        lp_cumul_cost_value = 0;
                                    }
                                }
                            }
                            DimensionSchedulingStatus::Optimal => {}
                        }
                    }
                    current_cumul_cost_value =
                        std::cmp::max(current_cumul_cost_value, lp_cumul_cost_value);
                }
                self.current_cumul_cost_values
                    .insert(start, current_cumul_cost_value);
                current_max_end.path_values[path] = cumul;
                if current_max_end.cumul_value < cumul {
                    current_max_end.cumul_value = cumul;
                    current_max_end.cumul_value_support = Some(path);
                }
                cap_add_to(
                    current_cumul_cost_value,
                    &mut self.total_current_cumul_cost_value,
                );
            }
            if self.filter_precedences() {
                // Unperformed nodes no longer constrain precedences.
                for &node in base.new_synchronized_unperformed_nodes() {
                    self.current_min_max_node_cumuls[node] = (-1, -1);
                }
            }
            // From the max end cumul, derive each path's max start and
            // keep the minimum.
            for path in 0..num_paths {
                let start = base.start(path);
                if !base.is_var_synced(start) {
                    continue;
                }
                let path_start = self.compute_path_max_start_from_end_cumul(
                    &self.current_path_transits,
                    path,
                    start,
                    current_max_end.cumul_value,
                );
                current_min_start.path_values[path] = path_start;
                if current_min_start.cumul_value > path_start {
                    current_min_start.cumul_value = path_start;
                    current_min_start.cumul_value_support = Some(path);
                }
            }
            self.current_min_start = current_min_start;
            self.current_max_end = current_max_end;
        }
        // Initialize this before considering any delta.
        self.delta_max_end_cumul = i64::MIN;

        debug_assert!(
            self.global_span_cost_coefficient == 0
                || self.current_min_start.cumul_value <= self.current_max_end.cumul_value
        );
        self.synchronized_objective_value = cap_add(
            self.total_current_cumul_cost_value,
            cap_prod(
                self.global_span_cost_coefficient,
                cap_sub(
                    self.current_max_end.cumul_value,
                    self.current_min_start.cumul_value,
                ),
            ),
        );
    }

    fn initialize_accept_path(&mut self, _base: &PathFilterBase) -> bool {
        self.cumul_cost_delta = self.total_current_cumul_cost_value;
        self.node_with_precedence_to_delta_min_max_cumuls.clear();
        // Clean up for the new delta.
        self.delta_max_end_cumul = i64::MIN;
        self.delta_paths.clear();
        self.delta_path_transits.clear();
        self.delta_nodes_with_precedences_and_changed_cumul
            .clear_all();
        true
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        _chain_start: usize,
        _chain_end: usize,
    ) -> bool {
        let size = base.size();
        let mut node = path_start;
        let mut cumul = self.initial_cumul[node].min;
        let mut cumul_cost_delta = 0;
        let mut total_transit = 0;
        let path = self.delta_path_transits.add_paths(1);
        let vehicle = base.path_of_start(path_start);
        let capacity = self.vehicle_capacities[vehicle];
        let Some(first_next) = base.get_next(path_start) else {
            return true;
        };
        let filter_vehicle_costs = !self.model.is_end(first_next)
            || self.model.is_vehicle_used_when_empty(vehicle);
        if filter_vehicle_costs {
            cumul_cost_delta = cap_add(
                self.get_cumul_soft_cost(node, cumul),
                self.get_cumul_piecewise_linear_cost(node, cumul),
            );
        }
        // First pass: route length, to reserve the transit cache.
        let mut number_of_route_arcs = 0;
        while node < size {
            number_of_route_arcs += 1;
            let Some(next) = base.get_next(node) else {
                return true;
            };
            node = next;
        }
        self.delta_path_transits
            .reserve_transits(path, number_of_route_arcs);
        self.min_path_cumuls.clear();
        self.min_path_cumuls.push(cumul);
        // Feasibility walk against cumul bounds, caching node sequences
        // and transits for the span filtering below.
        node = path_start;
        while node < size {
            let Some(next) = base.get_next(node) else {
                return true;
            };
            let transit = self.dimension().transit(vehicle, node, next);
            cap_add_to(transit, &mut total_transit);
            let transit_slack = cap_add(transit, self.initial_slack[node].min);
            self.delta_path_transits
                .push_transit(path, node, next, transit_slack);
            cap_add_to(transit_slack, &mut cumul);
            cumul = self.dimension().first_possible_value_ge(next, cumul);
            if cumul > std::cmp::min(capacity, self.initial_cumul[next].max) {
                return false;
            }
            cumul = std::cmp::max(self.initial_cumul[next].min, cumul);
            self.min_path_cumuls.push(cumul);
            node = next;
            if filter_vehicle_costs {
                cap_add_to(self.get_cumul_soft_cost(node, cumul), &mut cumul_cost_delta);
                cap_add_to(
                    self.get_cumul_piecewise_linear_cost(node, cumul),
                    &mut cumul_cost_delta,
                );
            }
        }
        let min_end = cumul;

        if !self.pickup_to_delivery_limits_respected(path) {
            return false;
        }
        if self.filter_slack_cost()
            || self.filter_break_cost(vehicle)
            || self.filter_soft_span_cost_for_vehicle(vehicle)
            || self.filter_soft_span_quadratic_cost_for_vehicle(vehicle)
        {
            let mut slack_max = i64::MAX;
            if self.vehicle_span_upper_bounds[vehicle] < i64::MAX {
                let span_max = self.vehicle_span_upper_bounds[vehicle];
                slack_max = std::cmp::min(slack_max, cap_sub(span_max, total_transit));
            }
            let max_start_from_min_end = self.compute_path_max_start_from_end_cumul(
                &self.delta_path_transits,
                path,
                path_start,
                min_end,
            );
            let span_lb = cap_sub(min_end, max_start_from_min_end);
            let mut min_total_slack = cap_sub(span_lb, total_transit);
            if min_total_slack > slack_max {
                return false;
            }

            if self.dimension().has_break_constraints() {
                for limit in self.dimension().interbreak_limits(vehicle) {
                    // Minimal number of breaks depends on total transit:
                    // i breaks for i * limit + 1 <= total transit
                    //                               <= (i + 1) * limit.
                    if limit.max_interbreak == 0 || total_transit == 0 {
                        continue;
                    }
                    let num_breaks_lb = (total_transit - 1) / limit.max_interbreak;
                    let slack_lb = cap_prod(num_breaks_lb, limit.min_break_duration);
                    if slack_lb > slack_max {
                        return false;
                    }
                    min_total_slack = std::cmp::max(min_total_slack, slack_lb);
                }
                // Breaks whose windows straddle the mandatory interval
                // [max_start, min_end) must happen inside the route.
                let mut min_total_break = 0;
                let max_path_end = self.initial_cumul[self.model.end(vehicle)].max;
                let max_start = self.compute_path_max_start_from_end_cumul(
                    &self.delta_path_transits,
                    path,
                    path_start,
                    max_path_end,
                );
                for window in self.dimension().break_windows(vehicle) {
                    if !window.is_performed_min {
                        continue;
                    }
                    if max_start < window.end_min && window.start_max < min_end {
                        cap_add_to(window.duration_min, &mut min_total_break);
                    }
                }
                if min_total_break > slack_max {
                    return false;
                }
                min_total_slack = std::cmp::max(min_total_slack, min_total_break);
            }
            if filter_vehicle_costs {
                cap_add_to(
                    cap_prod(
                        self.vehicle_total_slack_cost_coefficients[vehicle],
                        min_total_slack,
                    ),
                    &mut cumul_cost_delta,
                );
                let span_lower_bound = cap_add(total_transit, min_total_slack);
                if self.filter_soft_span_cost() {
                    if let Some(bound_cost) = self.dimension().soft_span_upper_bound(vehicle) {
                        if bound_cost.bound < span_lower_bound {
                            let violation = cap_sub(span_lower_bound, bound_cost.bound);
                            cap_add_to(
                                cap_prod(bound_cost.cost, violation),
                                &mut cumul_cost_delta,
                            );
                        }
                    }
                }
                if self.filter_soft_span_quadratic_cost() {
                    if let Some(bound_cost) =
                        self.dimension().quadratic_soft_span_upper_bound(vehicle)
                    {
                        if bound_cost.bound < span_lower_bound {
                            let violation = cap_sub(span_lower_bound, bound_cost.bound);
                            cap_add_to(
                                cap_prod(bound_cost.cost, cap_prod(violation, violation)),
                                &mut cumul_cost_delta,
                            );
                        }
                    }
                }
            }
            if cap_add(total_transit, min_total_slack) > self.vehicle_span_upper_bounds[vehicle]
            {
                return false;
            }
        }
        if self.filter_cumul_soft_lower_bounds() && filter_vehicle_costs {
            cap_add_to(
                self.get_path_cumul_soft_lower_bound_cost(&self.delta_path_transits, path),
                &mut cumul_cost_delta,
            );
        }
        if self.filter_precedences() {
            self.store_min_max_cumul_of_nodes_on_path(path, true);
        }
        if !filter_vehicle_costs {
            // This route's costs don't count; drop its contribution.
            cumul_cost_delta = 0;
            self.delta_path_transits.clear_path(path);
        }
        if self.filter_span_cost()
            || self.filter_cumul_soft_bounds()
            || self.filter_slack_cost()
            || self.filter_cumul_soft_lower_bounds()
            || self.filter_cumul_piecewise_linear_costs()
            || self.filter_soft_span_cost_for_vehicle(vehicle)
            || self.filter_soft_span_quadratic_cost_for_vehicle(vehicle)
        {
            self.delta_paths.insert(base.path_of_start(path_start));
            self.delta_path_cumul_cost_values[vehicle] = cumul_cost_delta;
            cumul_cost_delta = cap_sub(
                cumul_cost_delta,
                self.current_cumul_cost_values
                    .get(&path_start)
                    .copied()
                    .unwrap_or(0),
            );
            if filter_vehicle_costs {
                self.delta_max_end_cumul = std::cmp::max(self.delta_max_end_cumul, min_end);
            }
        }
        cap_add_to(cumul_cost_delta, &mut self.cumul_cost_delta);
        true
    }

    fn finalize_accept_path(
        &mut self,
        base: &PathFilterBase,
        _objective_min: i64,
        objective_max: i64,
    ) -> bool {
        if !self.has_any_cumul_feature() {
            return true;
        }
        if self.filter_precedences() {
            for position in 0..self
                .delta_nodes_with_precedences_and_changed_cumul
                .positions_set_at_least_once()
                .len()
            {
                let node = self
                    .delta_nodes_with_precedences_and_changed_cumul
                    .positions_set_at_least_once()[position];
                // This node was seen in the delta, so its cumuls are in
                // the delta map.
                let node_min_max_cumul_in_delta = self
                    .node_with_precedence_to_delta_min_max_cumuls
                    .get(&node)
                    .copied()
                    .unwrap_or((-1, -1));
                debug_assert!(
                    node_min_max_cumul_in_delta.0 >= 0 && node_min_max_cumul_in_delta.1 >= 0
                );
                for precedence in &self.node_index_to_precedences[node] {
                    let node_is_first = precedence.first_node == node;
                    let other_node = if node_is_first {
                        precedence.second_node
                    } else {
                        precedence.first_node
                    };
                    match base.get_next(other_node) {
                        None => continue,
                        Some(next) if next == other_node => continue,
                        Some(_) => {}
                    }
                    // max_cumul(second) >= min_cumul(first) + offset.
                    let other_min_max_cumul_in_delta = self
                        .node_with_precedence_to_delta_min_max_cumuls
                        .get(&other_node)
                        .copied()
                        .unwrap_or(self.current_min_max_node_cumuls[other_node]);
                    let first_min_cumul = if node_is_first {
                        node_min_max_cumul_in_delta.0
                    } else {
                        other_min_max_cumul_in_delta.0
                    };
                    let second_max_cumul = if node_is_first {
                        other_min_max_cumul_in_delta.1
                    } else {
                        node_min_max_cumul_in_delta.1
                    };
                    if second_max_cumul < first_min_cumul + precedence.offset {
                        return false;
                    }
                }
            }
        }
        let mut new_max_end = self.delta_max_end_cumul;
        let mut new_min_start = i64::MAX;
        if self.filter_span_cost() {
            if new_max_end < self.current_max_end.cumul_value {
                // The delta's max end is lower than the current one; if
                // the supporting path changed, rescan the unchanged paths.
                let support_in_delta = self
                    .current_max_end
                    .cumul_value_support
                    .is_some_and(|support| self.delta_paths.contains(&support));
                if !support_in_delta {
                    new_max_end = self.current_max_end.cumul_value;
                } else {
                    for (path, &path_value) in
                        self.current_max_end.path_values.iter().enumerate()
                    {
                        if path_value > new_max_end && !self.delta_paths.contains(&path) {
                            new_max_end = path_value;
                        }
                    }
                }
            }
            // With the max end known, find the min start: first over the
            // delta paths, then over unchanged ones if the max end moved.
            for path in 0..self.delta_path_transits.num_paths() {
                // Delta paths are registered in delta order; their path
                // starts are the touched path starts in the same order.
                let path_start = base.touched_path_starts()[path];
                new_min_start = std::cmp::min(
                    self.compute_path_max_start_from_end_cumul(
                        &self.delta_path_transits,
                        path,
                        path_start,
                        new_max_end,
                    ),
                    new_min_start,
                );
            }
            if new_max_end != self.current_max_end.cumul_value {
                for path in 0..base.num_paths() {
                    if self.delta_paths.contains(&path) {
                        continue;
                    }
                    if !base.is_var_synced(base.start(path)) {
                        continue;
                    }
                    new_min_start = std::cmp::min(
                        new_min_start,
                        self.compute_path_max_start_from_end_cumul(
                            &self.current_path_transits,
                            path,
                            base.start(path),
                            new_max_end,
                        ),
                    );
                }
            } else if new_min_start > self.current_min_start.cumul_value {
                // The delta's min start is above the current one; if the
                // supporting path changed, rescan the unchanged paths.
                let support_in_delta = self
                    .current_min_start
                    .cumul_value_support
                    .is_some_and(|support| self.delta_paths.contains(&support));
                if !support_in_delta {
                    new_min_start = self.current_min_start.cumul_value;
                } else {
                    for (path, &path_value) in
                        self.current_min_start.path_values.iter().enumerate()
                    {
                        if path_value < new_min_start && !self.delta_paths.contains(&path) {
                            new_min_start = path_value;
                        }
                    }
                }
            }
        }

        // Filter on the objective value, escalating to LP and MIP.
        self.accepted_objective_value = cap_add(
            self.cumul_cost_delta,
            cap_prod(
                self.global_span_cost_coefficient,
                cap_sub(new_max_end, new_min_start),
            ),
        );

        if self.may_use_optimizers
            && self.lp_optimizer.is_some()
            && self.accepted_objective_value <= objective_max
        {
            let touched_starts: Vec<usize> = base.touched_path_starts().to_vec();
            let mut path_delta_cost_values = vec![0; touched_starts.len()];
            let mut requires_mp = vec![false; touched_starts.len()];
            for (i, &start) in touched_starts.iter().enumerate() {
                let vehicle = base.path_of_start(start);
                if !self.filter_with_optimizer_for_vehicle(vehicle) {
                    continue;
                }
                let mut path_delta_cost_with_lp = 0;
                let next_accessor = |node: usize| base.get_next(node);
                let status = self
                    .lp_optimizer
                    .as_ref()
                    .unwrap()
                    .borrow_mut()
                    .compute_route_cumul_cost_without_fixed_transits(
                        vehicle,
                        &next_accessor,
                        self.filter_objective_cost
                            .then_some(&mut path_delta_cost_with_lp),
                    );
                if status == DimensionSchedulingStatus::Infeasible {
                    return false;
                }
                debug_assert!(self.delta_paths.contains(&vehicle));
                let path_cost_diff_with_lp = cap_sub(
                    path_delta_cost_with_lp,
                    self.delta_path_cumul_cost_values[vehicle],
                );
                if path_cost_diff_with_lp > 0 {
                    path_delta_cost_values[i] = path_delta_cost_with_lp;
                    cap_add_to(path_cost_diff_with_lp, &mut self.accepted_objective_value);
                    if self.accepted_objective_value > objective_max {
                        return false;
                    }
                } else {
                    path_delta_cost_values[i] = self.delta_path_cumul_cost_values[vehicle];
                }
                requires_mp[i] = self.filter_break_cost(vehicle)
                    || self.filter_soft_span_quadratic_cost_for_vehicle(vehicle)
                    || status == DimensionSchedulingStatus::RelaxedOptimalOnly;
            }

            debug_assert!(self.accepted_objective_value <= objective_max);

            if let Some(mp_optimizer) = self.mp_optimizer.clone() {
                for (i, &start) in touched_starts.iter().enumerate() {
                    if !requires_mp[i] {
                        continue;
                    }
                    let vehicle = base.path_of_start(start);
                    let mut path_delta_cost_with_mp = 0;
                    let next_accessor = |node: usize| base.get_next(node);
                    if mp_optimizer
                        .borrow_mut()
                        .compute_route_cumul_cost_without_fixed_transits(
                            vehicle,
                            &next_accessor,
                            self.filter_objective_cost
                                .then_some(&mut path_delta_cost_with_mp),
                        )
                        == DimensionSchedulingStatus::Infeasible
                    {
                        return false;
                    }
                    debug_assert!(self.delta_paths.contains(&vehicle));
                    let path_cost_diff_with_mp =
                        cap_sub(path_delta_cost_with_mp, path_delta_cost_values[i]);
                    if path_cost_diff_with_mp > 0 {
                        cap_add_to(path_cost_diff_with_mp, &mut self.accepted_objective_value);
                        if self.accepted_objective_value > objective_max {
                            return false;
                        }
                    }
                }
            }
        }

        self.accepted_objective_value <= objective_max
    }

    fn synchronized_objective_value(&self) -> i64 {
        if self.propagate_own_objective_value {
            self.synchronized_objective_value
        } else {
            0
        }
    }

    fn accepted_objective_value(&self) -> i64 {
        if self.propagate_own_objective_value {
            self.accepted_objective_value
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_trait::LocalSearchFilter;
    use crate::filter::path_filter::PathFilter;
    use route_filter_model::assignment::{Assignment, VarValue};
    use route_filter_model::problem::dimension::{
        BoundCost, ClassEvaluator, InterbreakLimit,
    };

    fn bound(pairs: &[(usize, usize)]) -> Assignment {
        Assignment::from_elements(
            pairs
                .iter()
                .map(|&(var, value)| VarValue::bound(var, value as i64))
                .collect(),
        )
    }

    fn filter_for(
        model: Rc<RoutingModel>,
        assignment: &Assignment,
    ) -> PathFilter<PathCumulFilterLogic> {
        let logic = PathCumulFilterLogic::new(model.clone(), 0, true, true, false, None, None);
        let mut filter = PathFilter::new(model, logic);
        filter.synchronize(assignment, None);
        filter
    }

    /// S -> a -> b -> E with capacity 100, transit 10 then slack up to 5
    /// (so arc windows [10, 15] / [20, 25]), cap(a) = [0, 30],
    /// cap(b) = [0, 50]. Node c has transit 200 toward b.
    #[test]
    fn test_inserting_wide_transit_violates_windows() {
        let mut dimension = Dimension::new(
            "time",
            // 3 regular nodes (a=0, b=1, c=2), start 3, end 4.
            5,
            4,
            vec![100],
            vec![0],
            vec![ClassEvaluator::binary(|from, _| match from {
                3 => 10,
                0 => 20,
                2 => 200,
                _ => 0,
            })],
        );
        dimension.set_cumul_bounds(0, Interval::new(0, 30));
        dimension.set_cumul_bounds(1, Interval::new(0, 50));
        for node in 0..4 {
            dimension.set_slack_bounds(node, Interval::new(0, 5));
        }
        let model = Rc::new(
            RoutingModel::builder(3, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(3, 0), (0, 1), (1, 4), (2, 2)]);
        let mut filter = filter_for(model, &assignment);
        // Reinserting the same path is feasible.
        assert!(filter.accept(&bound(&[(0, 1)]), i64::MIN, i64::MAX));
        // Adding c between a and b overshoots b's window.
        assert!(!filter.accept(&bound(&[(0, 2), (2, 1)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_span_upper_bound_rejects_long_routes() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.set_span_upper_bound(0, 25);
        // A span bound only binds when some cumul window is constrained.
        dimension.set_cumul_bounds(5, Interval::new(0, 500));
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 0), (0, 1), (1, 5), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Two arcs: span 20 <= 25.
        assert!(filter.accept(&bound(&[(0, 1)]), i64::MIN, i64::MAX));
        // Three arcs: span 30 > 25.
        assert!(!filter.accept(&bound(&[(1, 2), (2, 5)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_soft_upper_bound_cost_is_a_lower_bound_checked_against_max() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.set_cumul_soft_upper_bound(
            1,
            SoftBound {
                bound: 5,
                coefficient: 2,
            },
        );
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Visiting node 1 at cumul 10 violates its soft bound by 5, at
        // coefficient 2: cost 10.
        assert!(filter.accept(&bound(&[(4, 1), (1, 5)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 10);
        assert!(!filter.accept(&bound(&[(4, 1), (1, 5)]), i64::MIN, 9));
    }

    #[test]
    fn test_global_span_cost_spans_paths() {
        let mut dimension = Dimension::new(
            "time",
            // 2 regular nodes, 2 vehicles: starts 2, 3; ends 4, 5.
            6,
            4,
            vec![1000, 1000],
            vec![0, 0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.set_global_span_cost_coefficient(7);
        let model = Rc::new(
            RoutingModel::builder(2, 2)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        // Vehicle 0 serves node 0, vehicle 1 serves node 1.
        let assignment = bound(&[(2, 0), (0, 4), (3, 1), (1, 5)]);
        let mut filter = filter_for(model, &assignment);
        // Committed: both routes end at 20, starts can be 0: span 20.
        assert_eq!(filter.synchronized_objective_value(), 140);
        // Moving node 1 onto vehicle 0 lengthens that route to 30 while
        // emptying vehicle 1: global span becomes 30.
        assert!(filter.accept(&bound(&[(0, 1), (1, 4), (3, 5)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 210);
    }

    #[test]
    fn test_precedence_violation_is_rejected_in_finalize() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        // Node 1 must come at least 15 after node 0.
        dimension.add_node_precedence(NodePrecedence {
            first_node: 0,
            second_node: 1,
            offset: 15,
        });
        dimension.set_cumul_bounds(1, Interval::new(0, 20));
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Path start -> 1 -> 0 -> end: cumul(1) <= 20 max, cumul(0) >= 20
        // min, so max_cumul(1) < min_cumul(0) + 15 is violated.
        assert!(!filter.accept(&bound(&[(4, 1), (1, 0), (0, 5)]), i64::MIN, i64::MAX));
        // Path start -> 0 -> 1 -> end keeps 1 within its window at 20,
        // and min_cumul(0) + 15 = 25 > 20 = max_cumul(1): still rejected.
        assert!(!filter.accept(&bound(&[(4, 0), (0, 1), (1, 5)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_precedence_satisfied_is_accepted() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.add_node_precedence(NodePrecedence {
            first_node: 0,
            second_node: 1,
            offset: 5,
        });
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        assert!(filter.accept(&bound(&[(4, 0), (0, 1), (1, 5)]), i64::MIN, i64::MAX));
    }

    #[test]
    fn test_pickup_to_delivery_limit() {
        use route_filter_model::problem::pickup_delivery::PickupDeliveryPair;
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        // Pair (0 -> 1), at most 15 time units apart.
        dimension.set_pickup_to_delivery_limit(0, 0, 0, 15);
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_pickup_delivery_pair(PickupDeliveryPair::new(vec![0], vec![1]))
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Direct: delivery 10 after pickup.
        assert!(filter.accept(&bound(&[(4, 0), (0, 1), (1, 5)]), i64::MIN, i64::MAX));
        // With node 2 in between, the delivery is 20 after the pickup.
        assert!(!filter.accept(
            &bound(&[(4, 0), (0, 2), (2, 1), (1, 5)]),
            i64::MIN,
            i64::MAX
        ));
    }

    #[test]
    fn test_interbreak_limit_requires_slack() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        // At most 25 units of transit between breaks of 100; a span bound
        // of 35 leaves no room for any required break.
        dimension.add_interbreak_limit(
            0,
            InterbreakLimit {
                max_interbreak: 25,
                min_break_duration: 100,
            },
        );
        dimension.set_span_upper_bound(0, 35);
        dimension.set_cumul_bounds(5, Interval::new(0, 500));
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Two arcs: total transit 20 <= 25, no break needed.
        assert!(filter.accept(&bound(&[(4, 0), (0, 5)]), i64::MIN, i64::MAX));
        // Three arcs: total transit 30 needs one break of 100, which
        // cannot fit under the span bound of 35.
        assert!(!filter.accept(
            &bound(&[(4, 0), (0, 1), (1, 5)]),
            i64::MIN,
            i64::MAX
        ));
    }

    #[test]
    fn test_soft_span_cost() {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        dimension.set_soft_span_upper_bound(
            0,
            BoundCost {
                bound: 15,
                cost: 4,
            },
        );
        dimension.set_cumul_bounds(5, Interval::new(0, 500));
        let model = Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        );
        let assignment = bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]);
        let mut filter = filter_for(model, &assignment);
        // Span 20 violates the soft bound of 15 by 5 at cost 4: 20.
        assert!(filter.accept(&bound(&[(4, 0), (0, 1), (1, 5)]), i64::MIN, i64::MAX));
        assert_eq!(filter.accepted_objective_value(), 20);
    }

    struct FixedStatusOptimizer {
        status: DimensionSchedulingStatus,
        cost: i64,
        calls: std::cell::Cell<usize>,
    }

    impl RouteCumulOptimizer for FixedStatusOptimizer {
        fn compute_route_cumul_cost_without_fixed_transits(
            &mut self,
            _vehicle: usize,
            _next_accessor: &dyn Fn(usize) -> Option<usize>,
            cost: Option<&mut i64>,
        ) -> DimensionSchedulingStatus {
            self.calls.set(self.calls.get() + 1);
            if let Some(cost_out) = cost {
                *cost_out = self.cost;
            }
            self.status
        }
    }

    fn model_with_two_cost_families() -> Rc<RoutingModel> {
        let mut dimension = Dimension::new(
            "time",
            6,
            5,
            vec![1000],
            vec![0],
            vec![ClassEvaluator::binary(|_, _| 10)],
        );
        // Two interacting linear constraint families switch the LP on.
        dimension.set_span_cost_coefficient(0, 1);
        dimension.set_cumul_soft_upper_bound(
            1,
            SoftBound {
                bound: 5,
                coefficient: 2,
            },
        );
        dimension.set_cumul_bounds(5, Interval::new(0, 500));
        Rc::new(
            RoutingModel::builder(4, 1)
                .add_dimension(dimension)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_lp_infeasible_rejects_neighbor() {
        let model = model_with_two_cost_families();
        let lp = Rc::new(RefCell::new(FixedStatusOptimizer {
            status: DimensionSchedulingStatus::Infeasible,
            cost: 0,
            calls: std::cell::Cell::new(0),
        }));
        let logic = PathCumulFilterLogic::new(
            model.clone(),
            0,
            true,
            true,
            true,
            Some(lp.clone()),
            Some(lp.clone()),
        );
        let mut filter = PathFilter::new(model, logic);
        filter.synchronize(&bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]), None);
        assert!(!filter.accept(&bound(&[(4, 0), (0, 5)]), i64::MIN, i64::MAX));
        assert!(lp.borrow().calls.get() > 0);
    }

    #[test]
    fn test_relaxed_optimal_escalates_to_mp() {
        let model = model_with_two_cost_families();
        let lp = Rc::new(RefCell::new(FixedStatusOptimizer {
            status: DimensionSchedulingStatus::RelaxedOptimalOnly,
            cost: 0,
            calls: std::cell::Cell::new(0),
        }));
        let mp = Rc::new(RefCell::new(FixedStatusOptimizer {
            status: DimensionSchedulingStatus::Optimal,
            cost: 0,
            calls: std::cell::Cell::new(0),
        }));
        let logic = PathCumulFilterLogic::new(
            model.clone(),
            0,
            true,
            true,
            true,
            Some(lp.clone()),
            Some(mp.clone()),
        );
        let mut filter = PathFilter::new(model, logic);
        filter.synchronize(&bound(&[(4, 5), (0, 0), (1, 1), (2, 2), (3, 3)]), None);
        assert!(filter.accept(&bound(&[(4, 0), (0, 5)]), i64::MIN, i64::MAX));
        assert!(mp.borrow().calls.get() > 0);
    }
}
