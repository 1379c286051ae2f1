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

//! An additive routing dimension: per-arc transits, per-node cumul windows,
//! per-vehicle capacities, and every cost attached to cumuls.
//!
//! Transit evaluators are stored once per vehicle class; vehicles map to
//! classes so that two vehicles with identical transit behavior share the
//! same cached demands in the incremental checkers.

use rangemap::RangeSet;
use route_filter_core::prelude::{cap_add, Interval, PiecewiseLinearFunction};
use std::collections::HashMap;

/// A bound with the cost coefficient charged per unit of violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundCost {
    pub bound: i64,
    pub cost: i64,
}

/// A soft bound on a single cumul variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftBound {
    pub bound: i64,
    pub coefficient: i64,
}

/// `cumul(second) >= cumul(first) + offset` whenever both are performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePrecedence {
    pub first_node: usize,
    pub second_node: usize,
    pub offset: i64,
}

/// A break the vehicle may or must take, as bounds on its interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakWindow {
    pub start_min: i64,
    pub start_max: i64,
    pub end_min: i64,
    pub end_max: i64,
    pub duration_min: i64,
    pub is_performed_min: bool,
}

/// At most `max_interbreak` units of transit between two breaks, each break
/// lasting at least `min_break_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterbreakLimit {
    pub max_interbreak: i64,
    pub min_break_duration: i64,
}

/// Transit evaluators of one vehicle class. The unary form, when present,
/// lets checkers evaluate a node's demand without knowing its successor.
pub struct ClassEvaluator {
    pub binary: Box<dyn Fn(usize, usize) -> i64>,
    pub unary: Option<Box<dyn Fn(usize) -> i64>>,
}

impl ClassEvaluator {
    pub fn binary(evaluator: impl Fn(usize, usize) -> i64 + 'static) -> Self {
        Self {
            binary: Box::new(evaluator),
            unary: None,
        }
    }

    pub fn unary(evaluator: impl Fn(usize) -> i64 + Clone + 'static) -> Self {
        let binary = evaluator.clone();
        Self {
            binary: Box::new(move |node, _| binary(node)),
            unary: Some(Box::new(evaluator)),
        }
    }
}

pub struct Dimension {
    name: String,
    cumul_bounds: Vec<Interval>,
    slack_bounds: Vec<Interval>,
    vehicle_capacities: Vec<i64>,
    vehicle_to_class: Vec<usize>,
    class_evaluators: Vec<ClassEvaluator>,
    global_span_cost_coefficient: i64,
    vehicle_span_upper_bounds: Vec<i64>,
    vehicle_span_cost_coefficients: Vec<i64>,
    vehicle_slack_cost_coefficients: Vec<i64>,
    cumul_soft_upper_bounds: Vec<Option<SoftBound>>,
    cumul_soft_lower_bounds: Vec<Option<SoftBound>>,
    cumul_piecewise_linear_costs: Vec<Option<PiecewiseLinearFunction>>,
    forbidden_intervals: Vec<RangeSet<i64>>,
    node_precedences: Vec<NodePrecedence>,
    pickup_to_delivery_limits: HashMap<(usize, usize, usize), i64>,
    break_windows: Vec<Vec<BreakWindow>>,
    interbreak_limits: Vec<Vec<InterbreakLimit>>,
    soft_span_upper_bounds: Option<Vec<BoundCost>>,
    quadratic_soft_span_upper_bounds: Option<Vec<BoundCost>>,
}

impl Dimension {
    pub fn new(
        name: impl Into<String>,
        num_nodes: usize,
        size: usize,
        vehicle_capacities: Vec<i64>,
        vehicle_to_class: Vec<usize>,
        class_evaluators: Vec<ClassEvaluator>,
    ) -> Self {
        let num_vehicles = vehicle_capacities.len();
        debug_assert_eq!(vehicle_to_class.len(), num_vehicles);
        debug_assert!(vehicle_to_class
            .iter()
            .all(|&class| class < class_evaluators.len()));
        Self {
            name: name.into(),
            cumul_bounds: vec![Interval::new(0, i64::MAX); num_nodes],
            slack_bounds: vec![Interval::new(0, i64::MAX); size],
            vehicle_capacities,
            vehicle_to_class,
            class_evaluators,
            global_span_cost_coefficient: 0,
            vehicle_span_upper_bounds: vec![i64::MAX; num_vehicles],
            vehicle_span_cost_coefficients: vec![0; num_vehicles],
            vehicle_slack_cost_coefficients: vec![0; num_vehicles],
            cumul_soft_upper_bounds: vec![None; num_nodes],
            cumul_soft_lower_bounds: vec![None; num_nodes],
            cumul_piecewise_linear_costs: vec![None; num_nodes],
            forbidden_intervals: vec![RangeSet::new(); num_nodes],
            node_precedences: Vec::new(),
            pickup_to_delivery_limits: HashMap::new(),
            break_windows: vec![Vec::new(); num_vehicles],
            interbreak_limits: vec![Vec::new(); num_vehicles],
            soft_span_upper_bounds: None,
            quadratic_soft_span_upper_bounds: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.cumul_bounds.len()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.slack_bounds.len()
    }

    #[inline]
    pub fn num_vehicles(&self) -> usize {
        self.vehicle_capacities.len()
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.class_evaluators.len()
    }

    // Transit evaluation.

    #[inline]
    pub fn class_of_vehicle(&self, vehicle: usize) -> usize {
        self.vehicle_to_class[vehicle]
    }

    #[inline]
    pub fn class_evaluator(&self, class: usize) -> &ClassEvaluator {
        &self.class_evaluators[class]
    }

    #[inline]
    pub fn transit(&self, vehicle: usize, from: usize, to: usize) -> i64 {
        (self.class_evaluators[self.vehicle_to_class[vehicle]].binary)(from, to)
    }

    // Cumul and slack windows.

    #[inline]
    pub fn cumul_bounds(&self, node: usize) -> Interval {
        self.cumul_bounds[node]
    }

    #[inline]
    pub fn cumul_bounds_slice(&self) -> &[Interval] {
        &self.cumul_bounds
    }

    pub fn set_cumul_bounds(&mut self, node: usize, bounds: Interval) {
        self.cumul_bounds[node] = bounds;
    }

    #[inline]
    pub fn slack_bounds(&self, node: usize) -> Interval {
        self.slack_bounds[node]
    }

    pub fn set_slack_bounds(&mut self, node: usize, bounds: Interval) {
        self.slack_bounds[node] = bounds;
    }

    // Capacities and spans.

    #[inline]
    pub fn vehicle_capacity(&self, vehicle: usize) -> i64 {
        self.vehicle_capacities[vehicle]
    }

    #[inline]
    pub fn vehicle_capacities(&self) -> &[i64] {
        &self.vehicle_capacities
    }

    #[inline]
    pub fn global_span_cost_coefficient(&self) -> i64 {
        self.global_span_cost_coefficient
    }

    pub fn set_global_span_cost_coefficient(&mut self, coefficient: i64) {
        self.global_span_cost_coefficient = coefficient;
    }

    #[inline]
    pub fn vehicle_span_upper_bounds(&self) -> &[i64] {
        &self.vehicle_span_upper_bounds
    }

    pub fn set_span_upper_bound(&mut self, vehicle: usize, upper_bound: i64) {
        self.vehicle_span_upper_bounds[vehicle] = upper_bound;
    }

    #[inline]
    pub fn vehicle_span_cost_coefficients(&self) -> &[i64] {
        &self.vehicle_span_cost_coefficients
    }

    pub fn set_span_cost_coefficient(&mut self, vehicle: usize, coefficient: i64) {
        self.vehicle_span_cost_coefficients[vehicle] = coefficient;
    }

    #[inline]
    pub fn vehicle_slack_cost_coefficients(&self) -> &[i64] {
        &self.vehicle_slack_cost_coefficients
    }

    pub fn set_slack_cost_coefficient(&mut self, vehicle: usize, coefficient: i64) {
        self.vehicle_slack_cost_coefficients[vehicle] = coefficient;
    }

    /// Per-vehicle sum of span and slack cost coefficients, saturating.
    pub fn vehicle_total_slack_cost_coefficients(&self) -> Vec<i64> {
        self.vehicle_span_cost_coefficients
            .iter()
            .zip(&self.vehicle_slack_cost_coefficients)
            .map(|(&span, &slack)| cap_add(span, slack))
            .collect()
    }

    // Soft bounds and piecewise-linear costs.

    #[inline]
    pub fn cumul_soft_upper_bound(&self, node: usize) -> Option<SoftBound> {
        self.cumul_soft_upper_bounds[node]
    }

    pub fn set_cumul_soft_upper_bound(&mut self, node: usize, soft_bound: SoftBound) {
        self.cumul_soft_upper_bounds[node] = Some(soft_bound);
    }

    pub fn has_cumul_soft_upper_bounds(&self) -> bool {
        self.cumul_soft_upper_bounds.iter().any(|bound| {
            bound.is_some_and(|bound| bound.bound < i64::MAX && bound.coefficient != 0)
        })
    }

    #[inline]
    pub fn cumul_soft_lower_bound(&self, node: usize) -> Option<SoftBound> {
        self.cumul_soft_lower_bounds[node]
    }

    pub fn set_cumul_soft_lower_bound(&mut self, node: usize, soft_bound: SoftBound) {
        self.cumul_soft_lower_bounds[node] = Some(soft_bound);
    }

    pub fn has_cumul_soft_lower_bounds(&self) -> bool {
        self.cumul_soft_lower_bounds
            .iter()
            .any(|bound| bound.is_some_and(|bound| bound.bound > 0 && bound.coefficient != 0))
    }

    #[inline]
    pub fn cumul_piecewise_linear_cost(&self, node: usize) -> Option<&PiecewiseLinearFunction> {
        self.cumul_piecewise_linear_costs[node].as_ref()
    }

    pub fn set_cumul_piecewise_linear_cost(&mut self, node: usize, cost: PiecewiseLinearFunction) {
        self.cumul_piecewise_linear_costs[node] = Some(cost);
    }

    pub fn has_cumul_piecewise_linear_costs(&self) -> bool {
        self.cumul_piecewise_linear_costs
            .iter()
            .any(Option::is_some)
    }

    // Forbidden intervals.

    /// Forbids cumul values in `[start, end)` at `node`.
    pub fn add_forbidden_interval(&mut self, node: usize, start: i64, end: i64) {
        if start < end {
            self.forbidden_intervals[node].insert(start..end);
        }
    }

    pub fn has_forbidden_intervals(&self, node: usize) -> bool {
        self.forbidden_intervals[node].iter().next().is_some()
    }

    pub fn has_any_forbidden_intervals(&self) -> bool {
        self.forbidden_intervals
            .iter()
            .any(|set| set.iter().next().is_some())
    }

    /// Smallest allowed cumul value `>= value` at `node`.
    pub fn first_possible_value_ge(&self, node: usize, value: i64) -> i64 {
        if value == i64::MAX {
            return value;
        }
        match self.forbidden_intervals[node]
            .overlapping(&(value..value.saturating_add(1)))
            .next()
        {
            Some(range) => range.end,
            None => value,
        }
    }

    /// Largest allowed cumul value `<= value` at `node`.
    pub fn last_possible_value_le(&self, node: usize, value: i64) -> i64 {
        if value == i64::MAX {
            return value;
        }
        match self.forbidden_intervals[node]
            .overlapping(&(value..value.saturating_add(1)))
            .next()
        {
            Some(range) => range.start.saturating_sub(1),
            None => value,
        }
    }

    // Precedences.

    #[inline]
    pub fn node_precedences(&self) -> &[NodePrecedence] {
        &self.node_precedences
    }

    pub fn add_node_precedence(&mut self, precedence: NodePrecedence) {
        self.node_precedences.push(precedence);
    }

    // Pickup-to-delivery limits.

    pub fn set_pickup_to_delivery_limit(
        &mut self,
        pair_index: usize,
        pickup_alternative: usize,
        delivery_alternative: usize,
        limit: i64,
    ) {
        self.pickup_to_delivery_limits
            .insert((pair_index, pickup_alternative, delivery_alternative), limit);
    }

    pub fn pickup_to_delivery_limit(
        &self,
        pair_index: usize,
        pickup_alternative: usize,
        delivery_alternative: usize,
    ) -> i64 {
        self.pickup_to_delivery_limits
            .get(&(pair_index, pickup_alternative, delivery_alternative))
            .copied()
            .unwrap_or(i64::MAX)
    }

    pub fn has_pickup_to_delivery_limits(&self) -> bool {
        !self.pickup_to_delivery_limits.is_empty()
    }

    // Breaks.

    pub fn add_break_window(&mut self, vehicle: usize, window: BreakWindow) {
        self.break_windows[vehicle].push(window);
    }

    #[inline]
    pub fn break_windows(&self, vehicle: usize) -> &[BreakWindow] {
        &self.break_windows[vehicle]
    }

    pub fn add_interbreak_limit(&mut self, vehicle: usize, limit: InterbreakLimit) {
        self.interbreak_limits[vehicle].push(limit);
    }

    #[inline]
    pub fn interbreak_limits(&self, vehicle: usize) -> &[InterbreakLimit] {
        &self.interbreak_limits[vehicle]
    }

    pub fn has_break_constraints(&self) -> bool {
        self.break_windows.iter().any(|windows| !windows.is_empty())
            || self.interbreak_limits.iter().any(|limits| !limits.is_empty())
    }

    // Soft span bounds.

    pub fn set_soft_span_upper_bound(&mut self, vehicle: usize, bound_cost: BoundCost) {
        self.soft_span_upper_bounds
            .get_or_insert_with(|| {
                vec![
                    BoundCost {
                        bound: i64::MAX,
                        cost: 0
                    };
                    self.vehicle_capacities.len()
                ]
            })[vehicle] = bound_cost;
    }

    pub fn has_soft_span_upper_bounds(&self) -> bool {
        self.soft_span_upper_bounds.is_some()
    }

    pub fn soft_span_upper_bound(&self, vehicle: usize) -> Option<BoundCost> {
        self.soft_span_upper_bounds
            .as_ref()
            .map(|bounds| bounds[vehicle])
    }

    pub fn set_quadratic_soft_span_upper_bound(&mut self, vehicle: usize, bound_cost: BoundCost) {
        self.quadratic_soft_span_upper_bounds
            .get_or_insert_with(|| {
                vec![
                    BoundCost {
                        bound: i64::MAX,
                        cost: 0
                    };
                    self.vehicle_capacities.len()
                ]
            })[vehicle] = bound_cost;
    }

    pub fn has_quadratic_soft_span_upper_bounds(&self) -> bool {
        self.quadratic_soft_span_upper_bounds.is_some()
    }

    pub fn quadratic_soft_span_upper_bound(&self, vehicle: usize) -> Option<BoundCost> {
        self.quadratic_soft_span_upper_bounds
            .as_ref()
            .map(|bounds| bounds[vehicle])
    }
}

impl std::fmt::Debug for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("num_nodes", &self.num_nodes())
            .field("num_vehicles", &self.num_vehicles())
            .field("num_classes", &self.num_classes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_dimension() -> Dimension {
        Dimension::new(
            "time",
            8,
            6,
            vec![100, 100],
            vec![0, 0],
            vec![ClassEvaluator::binary(|_, _| 1)],
        )
    }

    #[test]
    fn test_transit_uses_vehicle_class() {
        let dimension = Dimension::new(
            "load",
            4,
            3,
            vec![10, 20],
            vec![0, 1],
            vec![
                ClassEvaluator::binary(|from, to| (from + to) as i64),
                ClassEvaluator::unary(|node| node as i64 * 10),
            ],
        );
        assert_eq!(dimension.transit(0, 1, 2), 3);
        assert_eq!(dimension.transit(1, 1, 2), 10);
        assert!(dimension.class_evaluator(1).unary.is_some());
    }

    #[test]
    fn test_forbidden_interval_jumps() {
        let mut dimension = unit_dimension();
        dimension.add_forbidden_interval(3, 10, 20);
        dimension.add_forbidden_interval(3, 20, 25);
        assert_eq!(dimension.first_possible_value_ge(3, 9), 9);
        assert_eq!(dimension.first_possible_value_ge(3, 10), 25);
        assert_eq!(dimension.first_possible_value_ge(3, 24), 25);
        assert_eq!(dimension.last_possible_value_le(3, 24), 9);
        assert_eq!(dimension.last_possible_value_le(3, 25), 25);
        assert_eq!(dimension.first_possible_value_ge(2, 10), 10);
    }

    #[test]
    fn test_total_slack_cost_coefficients_saturate() {
        let mut dimension = unit_dimension();
        dimension.set_span_cost_coefficient(0, i64::MAX);
        dimension.set_slack_cost_coefficient(0, 5);
        assert_eq!(dimension.vehicle_total_slack_cost_coefficients()[0], i64::MAX);
        assert_eq!(dimension.vehicle_total_slack_cost_coefficients()[1], 0);
    }

    #[test]
    fn test_pickup_to_delivery_limit_defaults_to_unbounded() {
        let mut dimension = unit_dimension();
        assert!(!dimension.has_pickup_to_delivery_limits());
        dimension.set_pickup_to_delivery_limit(0, 0, 1, 42);
        assert_eq!(dimension.pickup_to_delivery_limit(0, 0, 1), 42);
        assert_eq!(dimension.pickup_to_delivery_limit(0, 1, 1), i64::MAX);
        assert!(dimension.has_pickup_to_delivery_limits());
    }
}
