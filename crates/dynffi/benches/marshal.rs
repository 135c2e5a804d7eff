// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaling Benchmark
//!
//! Measures the cost of moving host values in and out of raw memory:
//! - scalar struct encode/decode
//! - sequence encode with growth from an empty slice
//! - struct declaration lookups through the registry

#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynffi::{Arena, Decoder, Describe, Encoder, Marshal, NaturalAbi, TypeRegistry};
use std::sync::Arc;

#[derive(Debug, Clone, Marshal)]
struct Reading {
    sensor: u32,
    value: f64,
    stamp: i64,
    window: [f32; 4],
}

fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::new(Arc::new(NaturalAbi::new())))
}

fn bench_struct_round_trip(c: &mut Criterion) {
    let arena = Arena::new(registry());
    let reading = Reading {
        sensor: 7,
        value: 21.5,
        stamp: 1_700_000_000,
        window: [1.0, 2.0, 3.0, 4.0],
    };
    let value = arena.value_of(&reading).expect("encode");

    c.bench_function("struct_encode", |b| {
        b.iter(|| Encoder::new(&value).encode(black_box(&reading)).expect("encode"));
    });
    c.bench_function("struct_decode", |b| {
        b.iter(|| {
            let back: Reading = Decoder::new(&value).decode().expect("decode");
            black_box(back)
        });
    });
}

fn bench_sequence_growth(c: &mut Criterion) {
    let registry = registry();
    let desc = registry.slice_of(&registry.int32()).expect("slice type");
    let mut group = c.benchmark_group("sequence_encode");

    for len in [16usize, 256, 4096] {
        let data: Vec<i32> = (0..len as i32).collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &data, |b, data| {
            b.iter(|| {
                let arena = Arena::new(registry.clone());
                let value = arena.make_slice(&desc, 0, 0).expect("make slice");
                Encoder::new(&value).encode(data).expect("encode");
                black_box(value.len().expect("len"))
            });
        });
    }
    group.finish();
}

fn bench_describe(c: &mut Criterion) {
    let registry = registry();
    Reading::describe(&registry).expect("declare");
    c.bench_function("describe_interned_struct", |b| {
        b.iter(|| black_box(Reading::describe(&registry).expect("describe")));
    });
}

criterion_group!(
    benches,
    bench_struct_round_trip,
    bench_sequence_growth,
    bench_describe
);
criterion_main!(benches);
