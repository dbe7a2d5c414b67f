//! Benchmarks for skeleton extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use terraclass_algorithms::skeleton::{Skeleton, SkeletonParams};
use terraclass_core::{Algorithm, GeoTransform, Raster};
use terraclass_parallel::ProcessingMode;

fn create_test_raster(size: usize) -> Raster {
    let mut data = Vec::with_capacity(size * size);
    let c = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            // Two crossing ridges
            let d = (row as f64 - c).abs().min((col as f64 - c).abs());
            data.push((100.0 - 4.0 * d).max(0.0));
        }
    }
    Raster::from_vec(data, size, size)
        .unwrap()
        .with_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0))
}

fn bench_skeleton(c: &mut Criterion) {
    for (name, processing) in [
        ("sequential", ProcessingMode::Sequential),
        ("parallel", ProcessingMode::Parallel),
    ] {
        let mut group = c.benchmark_group(format!("skeleton/{name}"));
        group.sample_size(10);
        for size in [128, 256, 512] {
            let raster = create_test_raster(size);
            let params = SkeletonParams {
                diffusion_max_iterations: 20,
                processing,
                ..SkeletonParams::default()
            };
            group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
                b.iter(|| {
                    Skeleton
                        .execute(black_box(raster.clone()), params.clone())
                        .unwrap()
                })
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_skeleton);
criterion_main!(benches);
