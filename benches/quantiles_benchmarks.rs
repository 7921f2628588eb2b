use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sketch_core::quantiles::{KllSketch, QuantilesSketch};

fn bench_classic_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantiles_classic_update");

    for k in [64, 128, 256] {
        group.bench_with_input(BenchmarkId::new("update", k), &k, |b, &k| {
            let mut sketch = QuantilesSketch::new(k).unwrap();
            let mut counter = 0.0f64;
            b.iter(|| {
                sketch.update(black_box(counter));
                counter += 1.0;
            });
        });
    }

    group.finish();
}

fn bench_classic_quantile(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantiles_classic_quantile");

    for n in [1_000, 10_000, 100_000] {
        let mut sketch = QuantilesSketch::new(128).unwrap();
        for i in 0..n {
            sketch.update(i as f64);
        }

        group.bench_with_input(BenchmarkId::new("get_quantile", n), &(), |b, _| {
            b.iter(|| {
                black_box(sketch.get_quantile(0.5).unwrap());
                black_box(sketch.get_quantile(0.99).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_kll_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("kll_update");

    for k in [100, 200, 500] {
        group.bench_with_input(BenchmarkId::new("update", k), &k, |b, &k| {
            let mut kll = KllSketch::new(k).unwrap();
            let mut counter = 0.0f64;
            b.iter(|| {
                kll.update(black_box(counter));
                counter += 1.0;
            });
        });
    }

    group.finish();
}

fn bench_kll_quantile(c: &mut Criterion) {
    let mut group = c.benchmark_group("kll_quantile");

    for n in [1_000, 10_000, 100_000] {
        let mut kll = KllSketch::new(200).unwrap();
        for i in 0..n {
            kll.update(i as f64);
        }

        group.bench_with_input(BenchmarkId::new("quantile", n), &(), |b, _| {
            b.iter(|| {
                black_box(kll.get_quantile(0.5).unwrap());
                black_box(kll.get_quantile(0.99).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_quantile_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantile_comparison");
    let n = 10000;

    group.bench_function("classic_pipeline", |b| {
        b.iter(|| {
            let mut sketch = QuantilesSketch::new(128).unwrap();
            for i in 0..n {
                sketch.update(i as f64);
            }
            black_box(sketch.get_quantile(0.99).unwrap())
        });
    });

    group.bench_function("kll_pipeline", |b| {
        b.iter(|| {
            let mut kll = KllSketch::new(200).unwrap();
            for i in 0..n {
                kll.update(i as f64);
            }
            black_box(kll.get_quantile(0.99).unwrap())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classic_update,
    bench_classic_quantile,
    bench_kll_update,
    bench_kll_quantile,
    bench_quantile_comparison,
);

criterion_main!(benches);
