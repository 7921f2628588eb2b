use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sketch_core::frequency::{ErrorType, FrequentItems};

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_update");

    for lg_max_size in [4u8, 7, 10] {
        group.bench_with_input(
            BenchmarkId::new("single", lg_max_size),
            &lg_max_size,
            |b, &lg_size| {
                let mut sketch: FrequentItems<String> = FrequentItems::new(lg_size).unwrap();
                let mut counter = 0;
                b.iter(|| {
                    sketch.update(black_box(format!("item_{}", counter % 100)));
                    counter += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_update_by(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_update_by");

    for lg_max_size in [4u8, 7, 10] {
        group.bench_with_input(
            BenchmarkId::new("batch", lg_max_size),
            &lg_max_size,
            |b, &lg_size| {
                let mut sketch: FrequentItems<String> = FrequentItems::new(lg_size).unwrap();
                let mut counter = 0;
                b.iter(|| {
                    sketch.update_by(black_box(format!("item_{}", counter % 100)), black_box(10));
                    counter += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_get_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_get_estimate");

    for lg_max_size in [4u8, 7, 10] {
        let mut sketch: FrequentItems<String> = FrequentItems::new(lg_max_size).unwrap();
        let n = 1u32 << lg_max_size;
        for i in 0..n * 2 {
            sketch.update(format!("item_{}", i % n));
        }

        group.bench_with_input(
            BenchmarkId::new("query", lg_max_size),
            &lg_max_size,
            |b, _| {
                let mut counter = 0;
                b.iter(|| {
                    let item = format!("item_{}", counter % n);
                    black_box(sketch.get_estimate(&item));
                    counter += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_frequent_items(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_top_k");

    for lg_max_size in [4u8, 7, 10] {
        let mut sketch: FrequentItems<String> = FrequentItems::new(lg_max_size).unwrap();
        let n = 1u32 << lg_max_size;

        for rank in 1..=n {
            let freq = 1000 / rank;
            for _ in 0..freq {
                sketch.update(format!("item_{}", rank));
            }
        }

        group.bench_with_input(
            BenchmarkId::new("no_false_positives", lg_max_size),
            &sketch,
            |b, sketch: &FrequentItems<String>| {
                b.iter(|| {
                    black_box(sketch.get_frequent_items(ErrorType::NoFalsePositives, None));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("no_false_negatives", lg_max_size),
            &sketch,
            |b, sketch: &FrequentItems<String>| {
                b.iter(|| {
                    black_box(sketch.get_frequent_items(ErrorType::NoFalseNegatives, None));
                });
            },
        );
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_merge");

    for lg_max_size in [4u8, 7, 10] {
        group.bench_with_input(
            BenchmarkId::new("merge", lg_max_size),
            &lg_max_size,
            |b, &lg_size| {
                let n = 1u32 << lg_size;
                b.iter_batched(
                    || {
                        let mut sketch1: FrequentItems<String> = FrequentItems::new(lg_size).unwrap();
                        let mut sketch2: FrequentItems<String> = FrequentItems::new(lg_size).unwrap();

                        for i in 0..n {
                            sketch1.update(format!("item_{}", i));
                            sketch2.update(format!("item_{}", i + n / 2));
                        }

                        (sketch1, sketch2)
                    },
                    |(mut sketch1, sketch2)| {
                        sketch1.merge(&sketch2);
                        black_box(());
                        sketch1
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_heavy_hitter_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_heavy_hitter");

    group.bench_function("zipf_stream", |b| {
        b.iter(|| {
            let mut sketch: FrequentItems<String> = FrequentItems::new(black_box(7)).unwrap();

            for rank in 1..=100 {
                let freq = 1000 / rank;
                for _ in 0..freq {
                    sketch.update(format!("item_{}", rank));
                }
            }

            let items = sketch.get_frequent_items(ErrorType::NoFalsePositives, None);
            black_box(items.into_iter().take(10).collect::<Vec<_>>());
        });
    });

    group.finish();
}

fn bench_item_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items_types");

    group.bench_function("integers", |b| {
        let mut sketch: FrequentItems<u64> = FrequentItems::new(7).unwrap();
        let mut counter = 0u64;
        b.iter(|| {
            sketch.update(black_box(counter % 100));
            counter += 1;
        });
    });

    group.bench_function("strings", |b| {
        let mut sketch: FrequentItems<String> = FrequentItems::new(7).unwrap();
        let mut counter = 0;
        b.iter(|| {
            sketch.update(black_box(format!("item_{}", counter % 100)));
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_update,
    bench_update_by,
    bench_get_estimate,
    bench_frequent_items,
    bench_merge,
    bench_heavy_hitter_workload,
    bench_item_types,
);

criterion_main!(benches);
