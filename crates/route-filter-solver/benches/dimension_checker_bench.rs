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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use route_filter_core::prelude::Interval;
use route_filter_solver::checker::dimension_checker::DimensionChecker;
use route_filter_solver::state::path_state::{ChainBounds, PathState};
use std::cell::RefCell;
use std::rc::Rc;

fn checker_on_committed_path(
    num_regular: usize,
    min_range_size_for_riq: usize,
) -> (DimensionChecker, Rc<RefCell<PathState>>) {
    let start = num_regular;
    let end = num_regular + 1;
    let state = Rc::new(RefCell::new(PathState::new(
        num_regular + 2,
        vec![start],
        vec![end],
    )));
    let node_capacity: Vec<Interval> = (0..num_regular + 2)
        .map(|node| Interval::new(0, 1_000 + (node as i64 % 7) * 100))
        .collect();
    let mut checker = DimensionChecker::with_min_range_size_for_riq(
        state.clone(),
        vec![Interval::new(0, 100_000)],
        vec![0],
        vec![Box::new(|from, to| {
            let base = ((from * 7 + to * 3) % 5) as i64;
            Interval::new(base, base + 2)
        })],
        node_capacity,
        min_range_size_for_riq,
    );
    {
        let mut borrowed = state.borrow_mut();
        let chains: Vec<ChainBounds> = std::iter::once(start)
            .chain(0..num_regular)
            .chain(std::iter::once(end))
            .map(|node| {
                let index = borrowed.committed_index(node);
                ChainBounds::new(index, index + 1)
            })
            .collect();
        borrowed.change_path(0, &chains);
    }
    // The checker reads the tentative chains, so it commits first.
    checker.commit();
    state.borrow_mut().commit();
    (checker, state)
}

/// Drops a middle segment of the committed path, reusing two long chains.
fn tentative_two_chain_change(state: &Rc<RefCell<PathState>>, num_regular: usize) {
    let mut borrowed = state.borrow_mut();
    let cut_a = num_regular / 3;
    let cut_b = 2 * num_regular / 3;
    let start_index = borrowed.committed_index(num_regular);
    let first_chain = ChainBounds::new(start_index, start_index + 1 + cut_a);
    let tail_begin = borrowed.committed_index(cut_b);
    let tail_end = borrowed.committed_index(num_regular + 1) + 1;
    borrowed.change_path(0, &[first_chain, ChainBounds::new(tail_begin, tail_end)]);
}

fn bench_check_reused_chains(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("dimension_checker_check");
    for &num_regular in &[64usize, 512, 4096] {
        group.bench_with_input(
            BenchmarkId::new("riq", num_regular),
            &num_regular,
            |bencher, &num_regular| {
                let (checker, state) = checker_on_committed_path(num_regular, 4);
                tentative_two_chain_change(&state, num_regular);
                bencher.iter(|| checker.check());
            },
        );
        group.bench_with_input(
            BenchmarkId::new("node_by_node", num_regular),
            &num_regular,
            |bencher, &num_regular| {
                let (checker, state) = checker_on_committed_path(num_regular, usize::MAX);
                tentative_two_chain_change(&state, num_regular);
                bencher.iter(|| checker.check());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_check_reused_chains);
criterion_main!(benches);
