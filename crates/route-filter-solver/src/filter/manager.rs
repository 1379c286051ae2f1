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

use crate::filter::filter_trait::LocalSearchFilter;
use route_filter_core::prelude::{cap_add_to, cap_sub};
use route_filter_model::assignment::Assignment;

/// When the manager invokes a filter during neighbor evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterEventType {
    /// Only `relax` runs; the filter's `accept` is trivial.
    Relax,
    /// `accept` runs, ordered by priority.
    Accept,
}

pub struct FilterEvent {
    pub filter: Box<dyn LocalSearchFilter>,
    pub event_type: FilterEventType,
    pub priority: i32,
}

impl FilterEvent {
    pub fn new(filter: Box<dyn LocalSearchFilter>, event_type: FilterEventType) -> Self {
        Self {
            filter,
            event_type,
            priority: 0,
        }
    }

    pub fn with_priority(
        filter: Box<dyn LocalSearchFilter>,
        event_type: FilterEventType,
        priority: i32,
    ) -> Self {
        Self {
            filter,
            event_type,
            priority,
        }
    }
}

/// Runs filters in event order: relax hints first, then accepts by
/// increasing priority, short-circuiting on the first rejection.
///
/// Cheap structural filters carry priority 0, optimizer-backed path
/// filters 1, bound propagators 2, resource assignment 3, global LP 4.
pub struct LocalSearchFilterManager {
    events: Vec<FilterEvent>,
    accepted_objective_value: i64,
    synchronized_objective_value: i64,
}

impl LocalSearchFilterManager {
    pub fn new(mut events: Vec<FilterEvent>) -> Self {
        // Stable: filters of equal rank keep registration order.
        events.sort_by_key(|event| (event.event_type, event.priority));
        Self {
            events,
            accepted_objective_value: 0,
            synchronized_objective_value: 0,
        }
    }

    #[inline]
    pub fn num_filters(&self) -> usize {
        self.events.len()
    }

    /// Relaxes every filter, then runs accepts in priority order. Each
    /// filter sees the objective window reduced by the bounds already
    /// accumulated by cheaper filters.
    pub fn accept(
        &mut self,
        delta: &Assignment,
        objective_min: i64,
        objective_max: i64,
    ) -> bool {
        self.accepted_objective_value = 0;
        for event in &mut self.events {
            event.filter.relax(delta);
        }
        for index in 0..self.events.len() {
            if self.events[index].event_type != FilterEventType::Accept {
                continue;
            }
            let remaining_min = cap_sub(objective_min, self.accepted_objective_value);
            let remaining_max = cap_sub(objective_max, self.accepted_objective_value);
            let event = &mut self.events[index];
            if !event.filter.accept(delta, remaining_min, remaining_max) {
                tracing::trace!(
                    filter = event.filter.name(),
                    priority = event.priority,
                    "neighbor rejected"
                );
                self.revert();
                return false;
            }
            cap_add_to(
                event.filter.accepted_objective_value(),
                &mut self.accepted_objective_value,
            );
        }
        true
    }

    /// Commits the chosen neighbor into every filter. Relax-event filters
    /// are re-relaxed forward first, then everything synchronizes in
    /// reverse event order so dependent filters read tentative changes
    /// from their dependencies before those commit.
    pub fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Assignment>) {
        self.synchronized_objective_value = 0;
        for event in &mut self.events {
            if event.event_type != FilterEventType::Relax {
                continue;
            }
            match delta {
                Some(delta) if !delta.is_empty() => event.filter.relax(delta),
                _ => event.filter.relax(assignment),
            }
        }
        for event in self.events.iter_mut().rev() {
            event.filter.synchronize(assignment, delta);
            cap_add_to(
                event.filter.synchronized_objective_value(),
                &mut self.synchronized_objective_value,
            );
        }
    }

    /// Undoes a relaxed-then-rejected neighbor in every filter. Every
    /// filter was relaxed before the accept pass, so every filter reverts.
    pub fn revert(&mut self) {
        for event in self.events.iter_mut().rev() {
            event.filter.revert();
        }
    }

    #[inline]
    pub fn accepted_objective_value(&self) -> i64 {
        self.accepted_objective_value
    }

    #[inline]
    pub fn synchronized_objective_value(&self) -> i64 {
        self.synchronized_objective_value
    }
}

impl std::fmt::Debug for LocalSearchFilterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSearchFilterManager")
            .field("num_filters", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingFilter {
        accepts: bool,
        cost: i64,
        accept_calls: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl LocalSearchFilter for CountingFilter {
        fn name(&self) -> &str {
            "CountingFilter"
        }

        fn accept(&mut self, _delta: &Assignment, _min: i64, objective_max: i64) -> bool {
            self.accept_calls.set(self.accept_calls.get() + 1);
            self.accepts && self.cost <= objective_max
        }

        fn synchronize(&mut self, _assignment: &Assignment, _delta: Option<&Assignment>) {}

        fn accepted_objective_value(&self) -> i64 {
            self.cost
        }
    }

    fn counting(
        accepts: bool,
        cost: i64,
        priority: i32,
        calls: &std::rc::Rc<std::cell::Cell<usize>>,
    ) -> FilterEvent {
        FilterEvent::with_priority(
            Box::new(CountingFilter {
                accepts,
                cost,
                accept_calls: calls.clone(),
            }),
            FilterEventType::Accept,
            priority,
        )
    }

    #[test]
    fn test_rejection_short_circuits_higher_priorities() {
        let first = std::rc::Rc::new(std::cell::Cell::new(0));
        let second = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut manager = LocalSearchFilterManager::new(vec![
            counting(false, 0, 0, &first),
            counting(true, 0, 4, &second),
        ]);
        assert!(!manager.accept(&Assignment::new(), i64::MIN, i64::MAX));
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn test_objective_window_shrinks_with_accumulated_bounds() {
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        // First filter consumes 60 of the budget of 100; second needs 50.
        let mut manager = LocalSearchFilterManager::new(vec![
            counting(true, 60, 0, &calls),
            counting(true, 50, 1, &calls),
        ]);
        assert!(!manager.accept(&Assignment::new(), 0, 100));
    }

    #[test]
    fn test_accepted_objective_accumulates() {
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut manager = LocalSearchFilterManager::new(vec![
            counting(true, 30, 0, &calls),
            counting(true, 50, 1, &calls),
        ]);
        assert!(manager.accept(&Assignment::new(), 0, 100));
        assert_eq!(manager.accepted_objective_value(), 80);
    }
}
