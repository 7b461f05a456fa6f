//! Benchmarks for the hot engine paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use watershed::engine::{GeoEngine, NativeEngine, OrderMethod};
use watershed::raster::{GeoTransform, Raster};
use watershed::utils::natural_sort;

const SIZE: usize = 200;

fn pitted_valley() -> Raster<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    let mid = SIZE / 2;
    let values = (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| 10.0 + 2.0 * r.abs_diff(mid) as f64 + 0.1 * c as f64))
        .collect();
    let mut dem = Raster::from_vec(SIZE, SIZE, values, GeoTransform::new(0.0, SIZE as f64, 1.0), None).unwrap();
    for _ in 0..SIZE {
        let (r, c) = (rng.gen_range(1..SIZE - 1), rng.gen_range(1..SIZE - 1));
        let z = dem.value(r, c).unwrap();
        dem.set(r, c, z - rng.gen_range(1.0..5.0));
    }
    dem
}

fn natural_order_benchmark(c: &mut Criterion) {
    let names: Vec<String> = (0..1000).rev().map(|i| format!("dtm_split_{i}")).collect();
    c.bench_function("natural_sort_1000", |b| {
        b.iter(|| {
            let mut names = names.clone();
            natural_sort(&mut names);
            black_box(names)
        });
    });
}

fn hydrology_benchmark(c: &mut Criterion) {
    let engine = NativeEngine::new();
    let dem = pitted_valley();
    c.bench_function("fill_200", |b| b.iter(|| black_box(engine.fill(&dem, 0.0).unwrap())));

    let filled = engine.fill(&dem, 0.0).unwrap();
    let direction = engine.flow_direction(&filled).unwrap();
    c.bench_function("stream_order_200", |b| {
        b.iter(|| black_box(engine.stream_order(&direction, OrderMethod::Strahler).unwrap()));
    });
}

fn contour_benchmark(c: &mut Criterion) {
    let engine = NativeEngine::new();
    let dem = pitted_valley();
    c.bench_function("contour_lines_200", |b| {
        b.iter(|| black_box(engine.contour_lines(&dem, 25.0, 500.0, 10_000).unwrap()));
    });
}

criterion_group!(benches, natural_order_benchmark, hydrology_benchmark, contour_benchmark);
criterion_main!(benches);
