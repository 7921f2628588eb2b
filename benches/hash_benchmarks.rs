use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sketch_core::common::hash::{hash64, hash_f64, hash_str, hash_u64};

fn bench_hash64(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash64");

    for size in [8, 64, 512, 4096].iter() {
        let data: Vec<u8> = (0..*size).map(|i| i as u8).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| hash64(black_box(&data), black_box(0)));
        });
    }

    group.finish();
}

fn bench_hash_u64(c: &mut Criterion) {
    c.bench_function("hash_u64", |b| {
        b.iter(|| hash_u64(black_box(12345), black_box(0)));
    });
}

fn bench_hash_f64(c: &mut Criterion) {
    c.bench_function("hash_f64", |b| {
        b.iter(|| hash_f64(black_box(3.14159), black_box(0)));
    });
}

fn bench_hash_str(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_str");

    for len in [8, 64, 256] {
        let s: String = "a".repeat(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &s, |b, s| {
            b.iter(|| hash_str(black_box(s), black_box(0)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash64, bench_hash_u64, bench_hash_f64, bench_hash_str);
criterion_main!(benches);
