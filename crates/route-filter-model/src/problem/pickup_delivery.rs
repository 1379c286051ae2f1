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

/// Per-vehicle discipline for visiting pickup/delivery pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickupDeliveryPolicy {
    /// Any order, as long as some pickup alternative precedes the delivery.
    #[default]
    NoOrder,
    /// Open pairs close in stack order.
    Lifo,
    /// Open pairs close in queue order.
    Fifo,
}

/// A pickup/delivery request, each side with alternative nodes of which at
/// most one is visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupDeliveryPair {
    pub pickup_alternatives: Vec<usize>,
    pub delivery_alternatives: Vec<usize>,
}

impl PickupDeliveryPair {
    pub fn new(pickup_alternatives: Vec<usize>, delivery_alternatives: Vec<usize>) -> Self {
        Self {
            pickup_alternatives,
            delivery_alternatives,
        }
    }
}

/// Position of a node inside the pair table: which pair, which alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupDeliveryPosition {
    pub pair_index: usize,
    pub alternative_index: usize,
}
