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

//! Incremental local-search filters for vehicle routing.
//!
//! A search engine proposes a delta over next variables; each filter decides
//! in O(size of delta) whether the neighbor is feasible and contributes a
//! bound on its objective. See `filter::manager` for the dispatch contract.

pub mod checker;
pub mod filter;
pub mod optim;
pub mod ranges;
pub mod state;

pub mod prelude {
    pub use crate::checker::dimension_checker::DimensionChecker;
    pub use crate::checker::energy_checker::{EnergyCost, PathEnergyCostChecker};
    pub use crate::filter::filter_trait::LocalSearchFilter;
    pub use crate::filter::manager::{FilterEvent, FilterEventType, LocalSearchFilterManager};
    pub use crate::filter::path_filter::{PathFilter, PathFilterBase, PathFilterLogic};
    pub use crate::state::path_state::{ChainBounds, PathState};
    pub use crate::state::path_state_filter::PathStateFilter;
}
