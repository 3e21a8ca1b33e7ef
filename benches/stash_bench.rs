use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stashdb::{MemoryBlobStore, MultiStash};

fn populated(keys: usize, values: usize) -> MultiStash<MemoryBlobStore> {
    let mut stash = MultiStash::with_store(MemoryBlobStore::new(), "bench").unwrap();
    let updates: Vec<(String, Vec<String>)> = (0..keys)
        .map(|k| {
            let values = (0..values).map(|v| format!("value-{}-{}", k, v)).collect();
            (format!("key-{}", k), values)
        })
        .collect();
    stash.add_many(updates).unwrap();
    stash
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("add_duplicate_1k", |b| {
        let mut stash = populated(1_000, 4);
        b.iter(|| stash.add(black_box("key-500"), black_box("value-500-2")).unwrap())
    });

    c.bench_function("add_many_100x4", |b| {
        b.iter(|| populated(black_box(100), black_box(4)))
    });
}

fn bench_search(c: &mut Criterion) {
    let stash = populated(1_000, 4);
    c.bench_function("search_1k_case_sensitive", |b| {
        b.iter(|| stash.search(black_box("-42"), false))
    });
    c.bench_function("search_1k_any_case", |b| {
        b.iter(|| stash.search(black_box("VALUE-9"), true))
    });
}

criterion_group!(benches, bench_add, bench_search);
criterion_main!(benches);
