//! B+tree micro-benchmarks.
//!
//! Point operations on trees of a few sizes, with sequential and shuffled
//! key orders. Keys are short structured strings, payloads 8 bytes, which
//! keeps the benches dominated by search and page maintenance rather than
//! memcpy.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagetree::BTree;

fn make_keys(count: usize, shuffled: bool) -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|i| format!("key{i:08}").into_bytes())
        .collect();
    if shuffled {
        // deterministic xorshift permutation
        let mut state = 0x9E3779B97F4A7C15u64;
        for i in (1..keys.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            keys.swap(i, (state % (i as u64 + 1)) as usize);
        }
    }
    keys
}

fn build_tree(keys: &[Vec<u8>]) -> BTree {
    let mut tree = BTree::new().unwrap();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(key, &(i as u64).to_le_bytes()).unwrap();
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");
    for &count in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        for (order, shuffled) in [("sequential", false), ("random", true)] {
            let keys = make_keys(count, shuffled);
            group.bench_with_input(BenchmarkId::new(order, count), &keys, |b, keys| {
                b.iter(|| black_box(build_tree(keys)));
            });
        }
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_lookup");
    for &count in &[1_000usize, 100_000] {
        group.throughput(Throughput::Elements(count as u64));
        let keys = make_keys(count, true);
        let tree = build_tree(&keys);
        group.bench_with_input(BenchmarkId::new("point", count), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(tree.lookup(key));
                }
            });
        });
    }
    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_remove");
    for &count in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        let keys = make_keys(count, true);
        group.bench_with_input(BenchmarkId::new("drain", count), &keys, |b, keys| {
            b.iter_with_setup(
                || build_tree(keys),
                |mut tree| {
                    for key in keys {
                        black_box(tree.remove(key));
                    }
                    tree
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_remove);
criterion_main!(benches);
