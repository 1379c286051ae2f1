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

//! The routing model the filters read: static topology plus every
//! constraint family the filter catalog knows about.
//!
//! Node layout: regular nodes occupy `[0, n)`, vehicle `v` starts at
//! `n + v` and ends at `n + num_vehicles + v`. Every node except the ends
//! carries a next variable.

use crate::problem::dimension::Dimension;
use crate::problem::disjunction::Disjunction;
use crate::problem::err::{
    DimensionSizeMismatchError, NodeOutOfRangeError, RoutingModelError, VehicleOutOfRangeError,
};
use crate::problem::paths::PathsMetadata;
use crate::problem::pickup_delivery::{
    PickupDeliveryPair, PickupDeliveryPolicy, PickupDeliveryPosition,
};

/// How a visit type counts toward a vehicle's on-board type multiset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitTypePolicy {
    #[default]
    TypeAddedToVehicle,
    AddedTypeRemovedFromVehicle,
}

/// Route-level check delegated to an external collaborator: given a vehicle
/// and a next accessor, decide whether the route respects the regulation.
pub type VehicleRouteCheck = Box<dyn Fn(usize, &dyn Fn(usize) -> Option<usize>) -> bool>;

pub struct RoutingModel {
    paths: PathsMetadata,
    num_regular_nodes: usize,
    max_active_vehicles: usize,
    disjunctions: Vec<Disjunction>,
    disjunction_indices_of_node: Vec<Vec<usize>>,
    activity_groups: Vec<Vec<usize>>,
    activity_group_of_node: Vec<Option<usize>>,
    pickup_delivery_pairs: Vec<PickupDeliveryPair>,
    pickup_position_of_node: Vec<Option<PickupDeliveryPosition>>,
    delivery_position_of_node: Vec<Option<PickupDeliveryPosition>>,
    vehicle_policies: Vec<PickupDeliveryPolicy>,
    allowed_vehicles: Vec<Option<Vec<bool>>>,
    amortized_linear_cost_factors: Vec<i64>,
    amortized_quadratic_cost_factors: Vec<i64>,
    has_amortized_cost_factors: bool,
    visit_types: Vec<Option<usize>>,
    visit_type_policies: Vec<VisitTypePolicy>,
    num_visit_types: usize,
    hard_type_incompatibilities: Vec<Vec<usize>>,
    temporal_incompatibility_checker: Option<VehicleRouteCheck>,
    type_requirement_checker: Option<VehicleRouteCheck>,
    vehicle_used_when_empty: Vec<bool>,
    route_cost_callback: Option<Box<dyn Fn(&[usize]) -> Option<i64>>>,
    dimensions: Vec<Dimension>,
}

impl RoutingModel {
    pub fn builder(num_regular_nodes: usize, num_vehicles: usize) -> RoutingModelBuilder {
        RoutingModelBuilder::new(num_regular_nodes, num_vehicles)
    }

    #[inline]
    pub fn paths(&self) -> &PathsMetadata {
        &self.paths
    }

    /// Number of next variables (regular nodes + starts).
    #[inline]
    pub fn size(&self) -> usize {
        self.paths.size()
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.paths.num_nodes()
    }

    #[inline]
    pub fn num_regular_nodes(&self) -> usize {
        self.num_regular_nodes
    }

    #[inline]
    pub fn num_vehicles(&self) -> usize {
        self.paths.num_paths()
    }

    #[inline]
    pub fn start(&self, vehicle: usize) -> usize {
        self.paths.start(vehicle)
    }

    #[inline]
    pub fn end(&self, vehicle: usize) -> usize {
        self.paths.end(vehicle)
    }

    #[inline]
    pub fn is_start(&self, node: usize) -> bool {
        self.paths.is_start(node)
    }

    #[inline]
    pub fn is_end(&self, node: usize) -> bool {
        self.paths.is_end(node)
    }

    #[inline]
    pub fn max_active_vehicles(&self) -> usize {
        self.max_active_vehicles
    }

    // Disjunctions.

    #[inline]
    pub fn num_disjunctions(&self) -> usize {
        self.disjunctions.len()
    }

    #[inline]
    pub fn disjunction(&self, index: usize) -> &Disjunction {
        &self.disjunctions[index]
    }

    #[inline]
    pub fn disjunction_indices_of_node(&self, node: usize) -> &[usize] {
        &self.disjunction_indices_of_node[node]
    }

    pub fn has_mandatory_disjunctions(&self) -> bool {
        self.disjunctions
            .iter()
            .any(Disjunction::is_mandatory)
    }

    // Same-activity groups.

    #[inline]
    pub fn num_activity_groups(&self) -> usize {
        self.activity_groups.len()
    }

    #[inline]
    pub fn activity_group(&self, group: usize) -> &[usize] {
        &self.activity_groups[group]
    }

    #[inline]
    pub fn activity_group_of_node(&self, node: usize) -> Option<usize> {
        self.activity_group_of_node[node]
    }

    // Pickup & delivery.

    #[inline]
    pub fn pickup_delivery_pairs(&self) -> &[PickupDeliveryPair] {
        &self.pickup_delivery_pairs
    }

    #[inline]
    pub fn pickup_position(&self, node: usize) -> Option<PickupDeliveryPosition> {
        self.pickup_position_of_node[node]
    }

    #[inline]
    pub fn delivery_position(&self, node: usize) -> Option<PickupDeliveryPosition> {
        self.delivery_position_of_node[node]
    }

    #[inline]
    pub fn is_pickup(&self, node: usize) -> bool {
        self.pickup_position_of_node[node].is_some()
    }

    #[inline]
    pub fn is_delivery(&self, node: usize) -> bool {
        self.delivery_position_of_node[node].is_some()
    }

    #[inline]
    pub fn vehicle_policy(&self, vehicle: usize) -> PickupDeliveryPolicy {
        self.vehicle_policies[vehicle]
    }

    #[inline]
    pub fn vehicle_policies(&self) -> &[PickupDeliveryPolicy] {
        &self.vehicle_policies
    }

    // Vehicle domains.

    pub fn is_vehicle_allowed(&self, node: usize, vehicle: usize) -> bool {
        match &self.allowed_vehicles[node] {
            Some(mask) => mask.get(vehicle).copied().unwrap_or(false),
            None => true,
        }
    }

    /// True iff the node's vehicle domain excludes some vehicle.
    pub fn has_constrained_vehicle_domain(&self, node: usize) -> bool {
        self.allowed_vehicles[node].is_some()
    }

    // Amortized vehicle costs.

    #[inline]
    pub fn has_amortized_cost_factors(&self) -> bool {
        self.has_amortized_cost_factors
    }

    #[inline]
    pub fn amortized_linear_cost_factors(&self) -> &[i64] {
        &self.amortized_linear_cost_factors
    }

    #[inline]
    pub fn amortized_quadratic_cost_factors(&self) -> &[i64] {
        &self.amortized_quadratic_cost_factors
    }

    // Visit types.

    #[inline]
    pub fn visit_type(&self, node: usize) -> Option<usize> {
        self.visit_types[node]
    }

    #[inline]
    pub fn visit_type_policy(&self, node: usize) -> VisitTypePolicy {
        self.visit_type_policies[node]
    }

    #[inline]
    pub fn num_visit_types(&self) -> usize {
        self.num_visit_types
    }

    pub fn has_hard_type_incompatibilities(&self) -> bool {
        self.hard_type_incompatibilities
            .iter()
            .any(|types| !types.is_empty())
    }

    #[inline]
    pub fn hard_type_incompatibilities_of_type(&self, visit_type: usize) -> &[usize] {
        &self.hard_type_incompatibilities[visit_type]
    }

    /// Temporal type incompatibilities, delegated to the model helper.
    pub fn check_temporal_incompatibilities(
        &self,
        vehicle: usize,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
    ) -> bool {
        match &self.temporal_incompatibility_checker {
            Some(checker) => checker(vehicle, next_accessor),
            None => true,
        }
    }

    /// Type requirements, delegated to the model helper.
    pub fn check_type_requirements(
        &self,
        vehicle: usize,
        next_accessor: &dyn Fn(usize) -> Option<usize>,
    ) -> bool {
        match &self.type_requirement_checker {
            Some(checker) => checker(vehicle, next_accessor),
            None => true,
        }
    }

    // Misc.

    #[inline]
    pub fn is_vehicle_used_when_empty(&self, vehicle: usize) -> bool {
        self.vehicle_used_when_empty[vehicle]
    }

    #[inline]
    pub fn route_cost_callback(&self) -> Option<&(dyn Fn(&[usize]) -> Option<i64>)> {
        self.route_cost_callback.as_deref()
    }

    #[inline]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[inline]
    pub fn dimension(&self, index: usize) -> &Dimension {
        &self.dimensions[index]
    }
}

impl std::fmt::Debug for RoutingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingModel")
            .field("num_regular_nodes", &self.num_regular_nodes)
            .field("num_vehicles", &self.num_vehicles())
            .field("num_disjunctions", &self.disjunctions.len())
            .field("num_dimensions", &self.dimensions.len())
            .finish()
    }
}

pub struct RoutingModelBuilder {
    num_regular_nodes: usize,
    num_vehicles: usize,
    max_active_vehicles: usize,
    disjunctions: Vec<Disjunction>,
    activity_groups: Vec<Vec<usize>>,
    pickup_delivery_pairs: Vec<PickupDeliveryPair>,
    vehicle_policies: Vec<PickupDeliveryPolicy>,
    allowed_vehicles: Vec<(usize, Vec<usize>)>,
    amortized_cost_factors: Option<(Vec<i64>, Vec<i64>)>,
    visit_types: Vec<(usize, usize, VisitTypePolicy)>,
    hard_type_incompatibilities: Vec<(usize, usize)>,
    temporal_incompatibility_checker: Option<VehicleRouteCheck>,
    type_requirement_checker: Option<VehicleRouteCheck>,
    vehicle_used_when_empty: Vec<bool>,
    route_cost_callback: Option<Box<dyn Fn(&[usize]) -> Option<i64>>>,
    dimensions: Vec<Dimension>,
}

impl RoutingModelBuilder {
    pub fn new(num_regular_nodes: usize, num_vehicles: usize) -> Self {
        Self {
            num_regular_nodes,
            num_vehicles,
            max_active_vehicles: num_vehicles,
            disjunctions: Vec::new(),
            activity_groups: Vec::new(),
            pickup_delivery_pairs: Vec::new(),
            vehicle_policies: vec![PickupDeliveryPolicy::default(); num_vehicles],
            allowed_vehicles: Vec::new(),
            amortized_cost_factors: None,
            visit_types: Vec::new(),
            hard_type_incompatibilities: Vec::new(),
            temporal_incompatibility_checker: None,
            type_requirement_checker: None,
            vehicle_used_when_empty: vec![false; num_vehicles],
            route_cost_callback: None,
            dimensions: Vec::new(),
        }
    }

    pub fn max_active_vehicles(mut self, cap: usize) -> Self {
        self.max_active_vehicles = cap;
        self
    }

    pub fn add_disjunction(mut self, disjunction: Disjunction) -> Self {
        self.disjunctions.push(disjunction);
        self
    }

    pub fn add_activity_group(mut self, nodes: Vec<usize>) -> Self {
        self.activity_groups.push(nodes);
        self
    }

    pub fn add_pickup_delivery_pair(mut self, pair: PickupDeliveryPair) -> Self {
        self.pickup_delivery_pairs.push(pair);
        self
    }

    pub fn vehicle_policy(mut self, vehicle: usize, policy: PickupDeliveryPolicy) -> Self {
        self.vehicle_policies[vehicle] = policy;
        self
    }

    pub fn allowed_vehicles(mut self, node: usize, vehicles: Vec<usize>) -> Self {
        self.allowed_vehicles.push((node, vehicles));
        self
    }

    pub fn amortized_cost_factors(mut self, linear: Vec<i64>, quadratic: Vec<i64>) -> Self {
        self.amortized_cost_factors = Some((linear, quadratic));
        self
    }

    pub fn visit_type(mut self, node: usize, visit_type: usize, policy: VisitTypePolicy) -> Self {
        self.visit_types.push((node, visit_type, policy));
        self
    }

    pub fn hard_type_incompatibility(mut self, type_a: usize, type_b: usize) -> Self {
        self.hard_type_incompatibilities.push((type_a, type_b));
        self
    }

    pub fn temporal_incompatibility_checker(mut self, checker: VehicleRouteCheck) -> Self {
        self.temporal_incompatibility_checker = Some(checker);
        self
    }

    pub fn type_requirement_checker(mut self, checker: VehicleRouteCheck) -> Self {
        self.type_requirement_checker = Some(checker);
        self
    }

    pub fn vehicle_used_when_empty(mut self, vehicle: usize, used: bool) -> Self {
        self.vehicle_used_when_empty[vehicle] = used;
        self
    }

    pub fn route_cost_callback(
        mut self,
        callback: impl Fn(&[usize]) -> Option<i64> + 'static,
    ) -> Self {
        self.route_cost_callback = Some(Box::new(callback));
        self
    }

    pub fn add_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn build(self) -> Result<RoutingModel, RoutingModelError> {
        let num_regular = self.num_regular_nodes;
        let num_vehicles = self.num_vehicles;
        let size = num_regular + num_vehicles;
        let num_nodes = num_regular + 2 * num_vehicles;
        let starts: Vec<usize> = (0..num_vehicles).map(|v| num_regular + v).collect();
        let ends: Vec<usize> = (0..num_vehicles).map(|v| size + v).collect();
        let paths = PathsMetadata::new(size, num_nodes, starts, ends);

        let check_regular_node = |node: usize| -> Result<(), RoutingModelError> {
            if node >= num_regular {
                return Err(NodeOutOfRangeError::new(node, num_regular).into());
            }
            Ok(())
        };

        let mut disjunction_indices_of_node = vec![Vec::new(); num_nodes];
        for (index, disjunction) in self.disjunctions.iter().enumerate() {
            for &node in &disjunction.nodes {
                check_regular_node(node)?;
                disjunction_indices_of_node[node].push(index);
            }
        }

        let mut activity_group_of_node = vec![None; num_nodes];
        for (group, nodes) in self.activity_groups.iter().enumerate() {
            for &node in nodes {
                check_regular_node(node)?;
                activity_group_of_node[node] = Some(group);
            }
        }

        let mut pickup_position_of_node = vec![None; num_nodes];
        let mut delivery_position_of_node = vec![None; num_nodes];
        for (pair_index, pair) in self.pickup_delivery_pairs.iter().enumerate() {
            for (alternative_index, &node) in pair.pickup_alternatives.iter().enumerate() {
                check_regular_node(node)?;
                pickup_position_of_node[node] = Some(PickupDeliveryPosition {
                    pair_index,
                    alternative_index,
                });
            }
            for (alternative_index, &node) in pair.delivery_alternatives.iter().enumerate() {
                check_regular_node(node)?;
                delivery_position_of_node[node] = Some(PickupDeliveryPosition {
                    pair_index,
                    alternative_index,
                });
            }
        }

        let mut allowed_vehicles = vec![None; num_nodes];
        for (node, vehicles) in &self.allowed_vehicles {
            check_regular_node(*node)?;
            let mut mask = vec![false; num_vehicles];
            for &vehicle in vehicles {
                if vehicle >= num_vehicles {
                    return Err(VehicleOutOfRangeError::new(vehicle, num_vehicles).into());
                }
                mask[vehicle] = true;
            }
            allowed_vehicles[*node] = Some(mask);
        }

        let has_amortized_cost_factors = self.amortized_cost_factors.is_some();
        let (amortized_linear, amortized_quadratic) = self
            .amortized_cost_factors
            .unwrap_or_else(|| (vec![0; num_vehicles], vec![0; num_vehicles]));
        if amortized_linear.len() != num_vehicles || amortized_quadratic.len() != num_vehicles {
            return Err(
                VehicleOutOfRangeError::new(amortized_linear.len(), num_vehicles).into(),
            );
        }

        let mut visit_types = vec![None; num_nodes];
        let mut visit_type_policies = vec![VisitTypePolicy::default(); num_nodes];
        let mut num_visit_types = 0;
        for (node, visit_type, policy) in self.visit_types {
            check_regular_node(node)?;
            visit_types[node] = Some(visit_type);
            visit_type_policies[node] = policy;
            num_visit_types = num_visit_types.max(visit_type + 1);
        }
        let mut hard_type_incompatibilities = vec![Vec::new(); num_visit_types];
        for (type_a, type_b) in self.hard_type_incompatibilities {
            if type_a >= num_visit_types || type_b >= num_visit_types {
                return Err(
                    NodeOutOfRangeError::new(type_a.max(type_b), num_visit_types).into(),
                );
            }
            hard_type_incompatibilities[type_a].push(type_b);
            hard_type_incompatibilities[type_b].push(type_a);
        }

        for dimension in &self.dimensions {
            if dimension.num_nodes() != num_nodes || dimension.size() != size {
                return Err(
                    DimensionSizeMismatchError::new(num_nodes, dimension.num_nodes()).into(),
                );
            }
            if dimension.num_vehicles() != num_vehicles {
                return Err(
                    VehicleOutOfRangeError::new(dimension.num_vehicles(), num_vehicles).into(),
                );
            }
        }

        Ok(RoutingModel {
            paths,
            num_regular_nodes: num_regular,
            max_active_vehicles: self.max_active_vehicles,
            disjunctions: self.disjunctions,
            disjunction_indices_of_node,
            activity_groups: self.activity_groups,
            activity_group_of_node,
            pickup_delivery_pairs: self.pickup_delivery_pairs,
            pickup_position_of_node,
            delivery_position_of_node,
            vehicle_policies: self.vehicle_policies,
            allowed_vehicles,
            amortized_linear_cost_factors: amortized_linear,
            amortized_quadratic_cost_factors: amortized_quadratic,
            has_amortized_cost_factors,
            visit_types,
            visit_type_policies,
            num_visit_types,
            hard_type_incompatibilities,
            temporal_incompatibility_checker: self.temporal_incompatibility_checker,
            type_requirement_checker: self.type_requirement_checker,
            vehicle_used_when_empty: self.vehicle_used_when_empty,
            route_cost_callback: self.route_cost_callback,
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_layout() {
        let model = RoutingModel::builder(4, 2).build().unwrap();
        assert_eq!(model.size(), 6);
        assert_eq!(model.num_nodes(), 8);
        assert_eq!(model.start(0), 4);
        assert_eq!(model.start(1), 5);
        assert_eq!(model.end(0), 6);
        assert_eq!(model.end(1), 7);
        assert!(model.is_start(4));
        assert!(model.is_end(7));
        assert!(!model.is_start(3));
    }

    #[test]
    fn test_disjunction_index_is_rejected_when_node_out_of_range() {
        let result = RoutingModel::builder(3, 1)
            .add_disjunction(Disjunction::new(vec![0, 5], 1, 10))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_disjunction_indices_of_node() {
        let model = RoutingModel::builder(4, 1)
            .add_disjunction(Disjunction::new(vec![0, 1], 1, 10))
            .add_disjunction(Disjunction::new(vec![1, 2], 1, 20))
            .build()
            .unwrap();
        assert_eq!(model.disjunction_indices_of_node(1), &[0, 1]);
        assert_eq!(model.disjunction_indices_of_node(3), &[] as &[usize]);
        assert!(!model.has_mandatory_disjunctions());
    }

    #[test]
    fn test_vehicle_domains() {
        let model = RoutingModel::builder(3, 2)
            .allowed_vehicles(1, vec![0])
            .build()
            .unwrap();
        assert!(model.is_vehicle_allowed(0, 1));
        assert!(model.is_vehicle_allowed(1, 0));
        assert!(!model.is_vehicle_allowed(1, 1));
        assert!(model.has_constrained_vehicle_domain(1));
        assert!(!model.has_constrained_vehicle_domain(0));
    }

    #[test]
    fn test_hard_type_incompatibilities_are_symmetric() {
        let model = RoutingModel::builder(3, 1)
            .visit_type(0, 0, VisitTypePolicy::TypeAddedToVehicle)
            .visit_type(1, 1, VisitTypePolicy::TypeAddedToVehicle)
            .hard_type_incompatibility(0, 1)
            .build()
            .unwrap();
        assert!(model.has_hard_type_incompatibilities());
        assert_eq!(model.hard_type_incompatibilities_of_type(0), &[1]);
        assert_eq!(model.hard_type_incompatibilities_of_type(1), &[0]);
    }
}
