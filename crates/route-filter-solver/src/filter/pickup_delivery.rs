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

//! Pickup-before-delivery ordering along each path, with per-vehicle
//! visiting disciplines and alternative pickup/delivery nodes per pair.

use crate::filter::path_filter::{PathFilterBase, PathFilterLogic};
use route_filter_core::prelude::SparseBitset;
use route_filter_model::problem::model::RoutingModel;
use route_filter_model::problem::pickup_delivery::PickupDeliveryPolicy;
use std::collections::VecDeque;
use std::rc::Rc;

pub struct PickupDeliveryFilterLogic {
    model: Rc<RoutingModel>,
    visited: SparseBitset,
    visited_deque: VecDeque<usize>,
}

impl PickupDeliveryFilterLogic {
    pub fn new(model: Rc<RoutingModel>) -> Self {
        let size = model.size();
        Self {
            model,
            visited: SparseBitset::new(size),
            visited_deque: VecDeque::new(),
        }
    }
}

impl PathFilterLogic for PickupDeliveryFilterLogic {
    fn name(&self) -> &str {
        "PickupDeliveryFilter"
    }

    fn accept_path(
        &mut self,
        base: &PathFilterBase,
        path_start: usize,
        _chain_start: usize,
        _chain_end: usize,
    ) -> bool {
        match self.model.vehicle_policy(base.path_of_start(path_start)) {
            PickupDeliveryPolicy::NoOrder => self.accept_unordered(base, path_start),
            PickupDeliveryPolicy::Lifo => self.accept_ordered(base, path_start, true),
            PickupDeliveryPolicy::Fifo => self.accept_ordered(base, path_start, false),
        }
    }
}

impl PickupDeliveryFilterLogic {
    /// Any order: every visited delivery needs some visited pickup
    /// alternative before it, and vice versa at the end of the walk.
    fn accept_unordered(&mut self, base: &PathFilterBase, path_start: usize) -> bool {
        self.visited.clear_all();
        let size = base.size();
        let pairs = self.model.pickup_delivery_pairs();
        let mut node = path_start;
        let mut path_length = 1;
        while node < size {
            // A path longer than the longest possible one is a cycle.
            if path_length > size {
                return false;
            }
            if let Some(position) = self.model.pickup_position(node) {
                // Not strictly necessary (delivery-side checks catch the
                // inconsistency), but cuts the walk early.
                for &second in &pairs[position.pair_index].delivery_alternatives {
                    if self.visited.contains(second) {
                        return false;
                    }
                }
            }
            if let Some(position) = self.model.delivery_position(node) {
                let mut found_first = false;
                let mut some_synced = false;
                for &first in &pairs[position.pair_index].pickup_alternatives {
                    if self.visited.contains(first) {
                        found_first = true;
                        break;
                    }
                    if base.is_var_synced(first) {
                        some_synced = true;
                    }
                }
                if !found_first && some_synced {
                    return false;
                }
            }
            self.visited.set(node);
            let Some(next) = base.get_next(node) else {
                // LNS detected; the path was fine up to here.
                return true;
            };
            node = next;
            path_length += 1;
        }
        for &node in self.visited.positions_set_at_least_once() {
            let Some(position) = self.model.pickup_position(node) else {
                continue;
            };
            let mut found_second = false;
            let mut some_synced = false;
            for &second in &pairs[position.pair_index].delivery_alternatives {
                if self.visited.contains(second) {
                    found_second = true;
                    break;
                }
                if base.is_var_synced(second) {
                    some_synced = true;
                }
            }
            if !found_second && some_synced {
                return false;
            }
        }
        true
    }

    /// LIFO: open pairs close in stack order; FIFO: in queue order.
    fn accept_ordered(&mut self, base: &PathFilterBase, path_start: usize, lifo: bool) -> bool {
        self.visited_deque.clear();
        let size = base.size();
        let pairs = self.model.pickup_delivery_pairs();
        let mut node = path_start;
        let mut path_length = 1;
        while node < size {
            if path_length > size {
                return false;
            }
            if self.model.pickup_position(node).is_some() {
                if lifo {
                    self.visited_deque.push_back(node);
                } else {
                    self.visited_deque.push_front(node);
                }
            }
            if let Some(position) = self.model.delivery_position(node) {
                let mut found_first = false;
                let mut some_synced = false;
                for &first in &pairs[position.pair_index].pickup_alternatives {
                    if self.visited_deque.back() == Some(&first) {
                        found_first = true;
                        break;
                    }
                    if base.is_var_synced(first) {
                        some_synced = true;
                    }
                }
                if !found_first && some_synced {
                    return false;
                } else if !self.visited_deque.is_empty() {
                    self.visited_deque.pop_back();
                }
            }
            let Some(next) = base.get_next(node) else {
                // LNS detected; the path was fine up to here.
                return true;
            };
            node = next;
            path_length += 1;
        }
        // Pairs still open at the end of the path must have all their
        // delivery alternatives unsynced.
        while let Some(&open_pickup) = self.visited_deque.back() {
            if let Some(position) = self.model.pickup_position(open_pickup) {
                for &second in &pairs[position.pair_index].delivery_alternatives {
                    if base.is_var_synced(second) {
                        return false;
                    }
                }
            }
            self.visited_deque.pop_back();
        }
        true
    }
}
