//! Benchmarks for classification strategies

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use terraclass_algorithms::classification::{
    ClassSamples, ClassifierStrategy, EdParams, EuclideanDistanceStrategy, IsoSegParams,
    IsoSegStrategy, MapParams, MaximumAPosterioriStrategy,
};
use terraclass_core::vector::pixel_window_polygon;
use terraclass_core::{DataType, GeoTransform, Raster, RasterRead};

const BANDS: [usize; 3] = [0, 1, 2];

fn create_test_raster(size: usize) -> Raster {
    let arrays = (0..3)
        .map(|b| {
            Array2::from_shape_fn((size, size), |(row, col)| {
                ((row * (7 + b) + col * (13 + 2 * b)) % 256) as f64
            })
        })
        .collect();
    Raster::from_arrays(arrays)
        .unwrap()
        .with_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0))
}

fn create_samples() -> ClassSamples {
    let mut samples = ClassSamples::new();
    for (id, base) in [(1, 20.0), (2, 90.0), (3, 160.0), (4, 230.0)] {
        for k in 0..8 {
            let k = k as f64;
            samples.push_sample(id, vec![base + k, base - k * 0.5, base + (k * 1.7) % 5.0]);
        }
    }
    samples
}

fn bench_ed(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/ed");
    let mut ed = EuclideanDistanceStrategy::new();
    ed.initialize(&EdParams {
        samples: create_samples(),
    })
    .unwrap();
    for size in [128, 256, 512] {
        let raster = create_test_raster(size);
        let mut out = Raster::new(size, size, 1, DataType::F64).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                ed.execute(black_box(&raster), &BANDS, &[], &mut out, 0, None)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/map");
    let mut map = MaximumAPosterioriStrategy::new();
    map.initialize(&MapParams {
        samples: create_samples(),
        priori: Some(vec![0.25; 4]),
        ..MapParams::default()
    })
    .unwrap();
    for size in [128, 256, 512] {
        let raster = create_test_raster(size);
        let mut out = Raster::new(size, size, 1, DataType::F64).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                map.execute(black_box(&raster), &BANDS, &[], &mut out, 0, None)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_isoseg(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/isoseg");
    let mut iso = IsoSegStrategy::new();
    iso.initialize(&IsoSegParams::default()).unwrap();
    for tile in [32, 16, 8] {
        let size = 256;
        let raster = create_test_raster(size);
        let t = *raster.transform();
        let polygons: Vec<_> = (0..size / tile)
            .flat_map(|r| (0..size / tile).map(move |c| (r * tile, c * tile)))
            .map(|(row, col)| pixel_window_polygon(&t, row, col, tile, tile))
            .collect();
        let mut out = Raster::new(size, size, 1, DataType::F64).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(polygons.len()), &tile, |b, _| {
            b.iter(|| {
                iso.execute(black_box(&raster), &BANDS, &polygons, &mut out, 0, None)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ed, bench_map, bench_isoseg);
criterion_main!(benches);
