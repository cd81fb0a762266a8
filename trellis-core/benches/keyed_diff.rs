//! Keyed list reconciliation benchmarks
//!
//! Mounts a keyed list into a `MemoryHost`, then measures re-rendering it
//! after a reversal, a single move and a shuffle.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::{h, Child, MemoryHost, Runtime};

fn list(keys: &[usize]) -> Child {
    h("ul")
        .children(keys.iter().map(|k| h("li").key(k).child(k.to_string())))
        .into()
}

/// Deterministic permutation so runs are comparable.
fn shuffled(len: usize) -> Vec<usize> {
    let mut keys: Vec<usize> = (0..len).collect();
    let mut seed = 0x2545_f491_u64;
    for i in (1..len).rev() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        keys.swap(i, (seed % (i as u64 + 1)) as usize);
    }
    keys
}

fn bench_reorder(c: &mut Criterion, name: &str, reorder: fn(usize) -> Vec<usize>) {
    let mut group = c.benchmark_group(name);
    for size in [100, 1_000] {
        let original: Vec<usize> = (0..size).collect();
        let next = reorder(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let host = Rc::new(MemoryHost::new());
            let container = host.create_container();
            let runtime = Runtime::new(host.clone());
            let mut flip = false;
            b.iter(|| {
                let keys = if flip { &original } else { &next };
                flip = !flip;
                runtime.render(black_box(list(keys)), container).ok();
                host.take_ops();
            });
        });
    }
    group.finish();
}

fn keyed_diff(c: &mut Criterion) {
    bench_reorder(c, "reverse", |size| (0..size).rev().collect());
    bench_reorder(c, "move_last_to_front", |size| {
        let mut keys: Vec<usize> = (0..size).collect();
        keys.rotate_right(1);
        keys
    });
    bench_reorder(c, "shuffle", shuffled);
}

criterion_group!(benches, keyed_diff);
criterion_main!(benches);
