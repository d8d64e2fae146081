//! Benchmarks for the diff engine.
//!
//! The hot path is a pass over many watches whose values did not change, so
//! the equal-input cases matter most.
//!
//! Run with: cargo bench -p watchkit-core --bench diff_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use watchkit_core::diff::{CompareOptions, compare, diff_arrays, diff_objects, key_by_field};
use watchkit_core::value::{ObjectRef, Value};

fn numbers(len: usize) -> Vec<Value> {
    (0..len).map(Value::from).collect()
}

fn records(len: usize) -> Value {
    Value::array((0..len).map(|i| Value::object([("id", Value::from(i)), ("n", Value::from(i * 2))])))
}

// =============================================================================
// Arrays
// =============================================================================

fn bench_array_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/array");

    for len in [16usize, 256, 1024] {
        let old = numbers(len);
        let same = numbers(len);
        let mut edited = numbers(len);
        edited[len / 2] = Value::from("x");
        edited.push(Value::from("tail"));

        group.bench_with_input(BenchmarkId::new("equal", len), &len, |b, _| {
            b.iter(|| black_box(diff_arrays(black_box(&same), black_box(&old))))
        });
        group.bench_with_input(BenchmarkId::new("two_edits", len), &len, |b, _| {
            b.iter(|| black_box(diff_arrays(black_box(&edited), black_box(&old))))
        });
    }

    let mut reversed = numbers(128);
    reversed.reverse();
    let forward = numbers(128);
    group.bench_function("reversed_128", |b| {
        b.iter(|| black_box(diff_arrays(black_box(&reversed), black_box(&forward))))
    });

    group.finish();
}

fn bench_keyed_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/keyed");
    let options = CompareOptions::by_key(key_by_field("id"));
    let old = records(256);
    let new = old.snapshot();

    group.bench_function("equal_256", |b| {
        b.iter(|| black_box(compare(black_box(&new), black_box(&old), &options)))
    });

    group.finish();
}

// =============================================================================
// Objects
// =============================================================================

fn bench_object_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/object");

    let old = ObjectRef::from_pairs((0..64).map(|i| (format!("k{i}"), Value::from(i))));
    let same = ObjectRef::from_pairs((0..64).map(|i| (format!("k{i}"), Value::from(i))));
    let changed = ObjectRef::from_pairs((1..65).map(|i| (format!("k{i}"), Value::from(i))));

    group.bench_function("equal_64", |b| {
        b.iter(|| black_box(diff_objects(black_box(&same), black_box(&old))))
    });
    group.bench_function("shifted_64", |b| {
        b.iter(|| black_box(diff_objects(black_box(&changed), black_box(&old))))
    });

    group.finish();
}

criterion_group!(benches, bench_array_diff, bench_keyed_compare, bench_object_diff);
criterion_main!(benches);
