//! Benchmarks for filter and feature performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gesture_pointer::filters::{FilteredPoint, FilteredValue, Kalman1D};
use nalgebra::{Complex, Vector2};

fn benchmark_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");

    // Simulated noisy head-pose angles, deterministic
    let test_data: Vec<f64> = (0..100)
        .map(|i| {
            let t = i as f64 * 0.1;
            10.0 * t.sin() + 0.5 * (7.3 * t).cos()
        })
        .collect();

    group.bench_function("kalman_single_update", |b| {
        let mut filter = Kalman1D::new(0.01);
        b.iter(|| black_box(filter.update_real(black_box(12.5))));
    });

    group.bench_function("kalman_complex_update", |b| {
        let mut filter = Kalman1D::new(0.01);
        b.iter(|| black_box(filter.update(black_box(Complex::new(12.5, -3.0)))));
    });

    for strength in [0.001, 0.022, 0.5] {
        group.bench_with_input(
            BenchmarkId::new("filtered_value_sequence_100", strength),
            &test_data,
            |b, data| {
                b.iter(|| {
                    let mut value = FilteredValue::with_strength(0.0, strength);
                    for &raw in data {
                        black_box(value.set(black_box(raw)));
                    }
                });
            },
        );
    }

    group.bench_function("filtered_point_sequence_100", |b| {
        b.iter(|| {
            let mut point = FilteredPoint::with_strength(Vector2::zeros(), 0.022);
            for &raw in &test_data {
                black_box(point.set(black_box(Vector2::new(raw, -raw))));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_filters);
criterion_main!(benches);
