#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use opjson::{JsonObject, ProgramCache};
use std::hint::black_box;

#[derive(Debug, Default, JsonObject)]
struct Small {
    a: u32,
    b: bool,
}

fn bench_lookup(c: &mut Criterion) {
    let cache = ProgramCache::new();
    // Warm both paths so only lookups are measured.
    cache.compile::<Small>();
    cache.compile::<Vec<Small>>();

    let mut group = c.benchmark_group("Program Lookup");

    group.bench_function("dense_slot", |b| {
        b.iter(|| black_box(cache.compile::<Small>()));
    });

    group.bench_function("keyed_fallback", |b| {
        b.iter(|| black_box(cache.compile::<Vec<Small>>()));
    });

    group.finish();

    let mut group = c.benchmark_group("Small Round Trip");
    let value = Small { a: 7, b: true };

    group.bench_function("encode", |b| {
        b.iter(|| opjson::to_vec(black_box(&value)).expect("Failed to encode"));
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            let _res: Small = opjson::from_slice(black_box(br#"{"a":7,"b":true}"#)).expect("Failed to decode");
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
