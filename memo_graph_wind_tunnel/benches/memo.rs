// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::convert::Infallible;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use memo_graph::{MemoGraph, MemoResult, WrapOptions, Wrapped};

type Memoized = Wrapped<u64, u64, u64, Infallible>;

/// Entry point for `memo_graph` wind-tunnel benchmarks.
///
/// The scenarios exercise the costs that dominate real workloads: pulling a
/// clean cached value, re-running an invalidated dependency chain, fanning an
/// invalidation out to many dependents, and churning a tightly bounded cache.
fn bench_memo(c: &mut Criterion) {
    bench_chain_hit(c);
    bench_chain_rerun(c);
    bench_fanout_rerun(c);
    bench_bounded_cache_churn(c);
}

/// Builds a linear chain of `len` wrappers, each depending on the previous
/// one, and returns the base and the top of the chain.
fn build_chain(graph: &MemoGraph, len: usize) -> (Memoized, Memoized) {
    let base = graph.wrap(|k: &u64| *k, |k: &u64| -> MemoResult<u64, Infallible> {
        Ok(*k)
    });
    let mut top = base.clone();
    for _ in 1..len {
        let prev = top.clone();
        top = graph.wrap(|k: &u64| *k, move |k: &u64| -> MemoResult<u64, Infallible> {
            Ok(prev.call(*k)? + 1)
        });
    }
    (base, top)
}

/// Steady-state cost of pulling the top of a clean chain.
///
/// This should be near-constant: a clean pull touches one entry, not the
/// whole chain.
fn bench_chain_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_hit");
    for &len in &[10_usize, 100, 1_000] {
        let graph = MemoGraph::new();
        let (_base, top) = build_chain(&graph, len);
        top.call(0).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| top.call(black_box(0)).unwrap());
        });
    }
    group.finish();
}

/// Cost of dirtying the base of a chain and re-pulling the top, which
/// propagates the dirty mark up and re-runs every level.
fn bench_chain_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_rerun");
    for &len in &[10_usize, 100, 1_000] {
        let graph = MemoGraph::new();
        let (base, top) = build_chain(&graph, len);
        top.call(0).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                base.dirty(&0);
                top.call(black_box(0)).unwrap()
            });
        });
    }
    group.finish();
}

/// One shared base with `fanout` dependents pulled through a single
/// aggregating wrapper; dirtying the base re-runs every dependent.
fn bench_fanout_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_rerun");
    for &fanout in &[10_u64, 100] {
        let graph = MemoGraph::new();
        let base = graph.wrap(|(): &()| (), |(): &()| -> MemoResult<u64, Infallible> {
            Ok(1)
        });

        let leaves: Vec<Memoized> = (0..fanout)
            .map(|offset| {
                let base = base.clone();
                graph.wrap(|k: &u64| *k, move |_: &u64| -> MemoResult<u64, Infallible> {
                    Ok(base.call(())? + offset)
                })
            })
            .collect();

        let sum = {
            let leaves = leaves.clone();
            graph.wrap(|(): &()| (), move |(): &()| -> MemoResult<u64, Infallible> {
                let mut total = 0;
                for (key, leaf) in (0_u64..).zip(leaves.iter()) {
                    total += leaf.call(key)?;
                }
                Ok(total)
            })
        };
        sum.call(()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(fanout), &fanout, |b, _| {
            b.iter(|| {
                base.dirty(&());
                sum.call(black_box(())).unwrap()
            });
        });
    }
    group.finish();
}

/// Rotating key set against a cache bound far smaller than the set, so every
/// call evicts through the dispose hook.
fn bench_bounded_cache_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_cache_churn");
    for &keys in &[64_u64, 1_024] {
        let graph = MemoGraph::new();
        let w = graph.wrap_with(
            |k: &u64| *k,
            |k: &u64| -> MemoResult<u64, Infallible> { Ok(k.wrapping_mul(31)) },
            WrapOptions {
                max: 8,
                ..WrapOptions::default()
            },
        );
        let mut next = 0;
        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, _| {
            b.iter(|| {
                next = (next + 1) % keys;
                w.call(black_box(next)).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_memo);
criterion_main!(benches);
