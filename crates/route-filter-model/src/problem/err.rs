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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeOutOfRangeError {
    node: usize,
    num_nodes: usize,
}

impl NodeOutOfRangeError {
    pub fn new(node: usize, num_nodes: usize) -> Self {
        Self { node, num_nodes }
    }

    pub fn node(&self) -> usize {
        self.node
    }
}

impl std::fmt::Display for NodeOutOfRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node {} is out of range (the model has {} regular nodes).",
            self.node, self.num_nodes
        )
    }
}

impl std::error::Error for NodeOutOfRangeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleOutOfRangeError {
    vehicle: usize,
    num_vehicles: usize,
}

impl VehicleOutOfRangeError {
    pub fn new(vehicle: usize, num_vehicles: usize) -> Self {
        Self {
            vehicle,
            num_vehicles,
        }
    }

    pub fn vehicle(&self) -> usize {
        self.vehicle
    }
}

impl std::fmt::Display for VehicleOutOfRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Vehicle {} is out of range (the model has {} vehicles).",
            self.vehicle, self.num_vehicles
        )
    }
}

impl std::error::Error for VehicleOutOfRangeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionSizeMismatchError {
    expected_num_nodes: usize,
    actual_num_nodes: usize,
}

impl DimensionSizeMismatchError {
    pub fn new(expected_num_nodes: usize, actual_num_nodes: usize) -> Self {
        Self {
            expected_num_nodes,
            actual_num_nodes,
        }
    }
}

impl std::fmt::Display for DimensionSizeMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dimension covers {} nodes but the model has {}.",
            self.actual_num_nodes, self.expected_num_nodes
        )
    }
}

impl std::error::Error for DimensionSizeMismatchError {}

/// Any validation failure raised by `RoutingModelBuilder::build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingModelError {
    NodeOutOfRange(NodeOutOfRangeError),
    VehicleOutOfRange(VehicleOutOfRangeError),
    DimensionSizeMismatch(DimensionSizeMismatchError),
}

impl std::fmt::Display for RoutingModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeOutOfRange(error) => error.fmt(f),
            Self::VehicleOutOfRange(error) => error.fmt(f),
            Self::DimensionSizeMismatch(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for RoutingModelError {}

impl From<NodeOutOfRangeError> for RoutingModelError {
    fn from(error: NodeOutOfRangeError) -> Self {
        Self::NodeOutOfRange(error)
    }
}

impl From<VehicleOutOfRangeError> for RoutingModelError {
    fn from(error: VehicleOutOfRangeError) -> Self {
        Self::VehicleOutOfRange(error)
    }
}

impl From<DimensionSizeMismatchError> for RoutingModelError {
    fn from(error: DimensionSizeMismatchError) -> Self {
        Self::DimensionSizeMismatch(error)
    }
}
