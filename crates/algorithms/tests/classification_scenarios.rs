//! End-to-end classification scenarios across strategies, samples and the
//! classifier facade.

use geo::Polygon;
use ndarray::Array2;
use terraclass_algorithms::classification::{
    Classifier, ClassifierInput, ClassifierParams, ClassifierStrategy, ClassSamples, DistanceType,
    EdParams, EuclideanDistanceStrategy, IsoSegParams, IsoSegStrategy, MapParams,
    MaximumAPosterioriStrategy,
};
use terraclass_core::vector::pixel_window_polygon;
use terraclass_core::{DataType, OutputRasterSpec, Raster, RasterFactory, RasterRead};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn labels(raster: &Raster) -> Vec<f64> {
    raster.band_data(0).unwrap().iter().copied().collect()
}

/// Samples around `center` whose population covariance is the identity.
fn unit_cloud(center: [f64; 2]) -> Vec<Vec<f64>> {
    [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)]
        .iter()
        .map(|&(dx, dy)| vec![center[0] + dx, center[1] + dy])
        .collect()
}

/// Two-band raster whose values sweep the plane between both class means.
fn sweep_raster(rows: usize, cols: usize) -> Raster {
    let b0 = Array2::from_shape_fn((rows, cols), |(_, c)| c as f64 * 1.3 + 0.1);
    let b1 = Array2::from_shape_fn((rows, cols), |(r, _)| r as f64 * 0.7 + 0.05);
    Raster::from_arrays(vec![b0, b1]).unwrap()
}

#[test]
fn test_ed_single_pixel_nearest_mean() {
    init_tracing();
    let input = Raster::from_arrays(vec![
        Array2::from_elem((1, 1), 1.0),
        Array2::from_elem((1, 1), 1.0),
    ])
    .unwrap();
    let samples = ClassSamples::new()
        .with_class(1, vec![vec![0.0, 0.0]])
        .unwrap()
        .with_class(2, vec![vec![10.0, 10.0]])
        .unwrap();

    let mut ed = EuclideanDistanceStrategy::new();
    ed.initialize(&EdParams { samples }).unwrap();
    let mut out = Raster::new(1, 1, 1, DataType::F64).unwrap();
    ed.execute(&input, &[0, 1], &[], &mut out, 0, None).unwrap();
    assert_eq!(labels(&out), vec![1.0]);
}

#[test]
fn test_map_with_identity_covariance_matches_ed() {
    init_tracing();
    let input = sweep_raster(15, 9);
    let samples = ClassSamples::new()
        .with_class(1, unit_cloud([0.0, 0.0]))
        .unwrap()
        .with_class(2, unit_cloud([10.0, 10.0]))
        .unwrap();

    let mut ed = EuclideanDistanceStrategy::new();
    ed.initialize(&EdParams {
        samples: samples.clone(),
    })
    .unwrap();
    let mut ed_out = Raster::new(15, 9, 1, DataType::F64).unwrap();
    ed.execute(&input, &[0, 1], &[], &mut ed_out, 0, None).unwrap();

    let mut map = MaximumAPosterioriStrategy::new();
    map.initialize(&MapParams {
        samples,
        priori: Some(vec![0.5, 0.5]),
        ..MapParams::default()
    })
    .unwrap();
    let mut map_out = Raster::new(15, 9, 1, DataType::F64).unwrap();
    map.execute(&input, &[0, 1], &[], &mut map_out, 0, None).unwrap();

    let ed_labels = labels(&ed_out);
    assert_eq!(ed_labels, labels(&map_out));
    // Both classes occur in the sweep
    assert!(ed_labels.contains(&1.0) && ed_labels.contains(&2.0));
}

#[test]
fn test_map_estimated_priori_matches_explicit() {
    init_tracing();
    let input = sweep_raster(12, 12);
    let samples = ClassSamples::new()
        .with_class(1, unit_cloud([2.0, 2.0]))
        .unwrap()
        .with_class(2, unit_cloud([12.0, 6.0]))
        .unwrap();

    let mut estimated = MaximumAPosterioriStrategy::new();
    estimated
        .initialize(&MapParams {
            samples: samples.clone(),
            ..MapParams::default()
        })
        .unwrap();
    let priori = estimated.estimate_priori(&input, &[0, 1], 2, None).unwrap();
    approx::assert_relative_eq!(priori.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

    let mut explicit = MaximumAPosterioriStrategy::new();
    explicit
        .initialize(&MapParams {
            samples,
            priori: Some(priori),
            ..MapParams::default()
        })
        .unwrap();

    let mut a = Raster::new(12, 12, 1, DataType::F64).unwrap();
    let mut b = Raster::new(12, 12, 1, DataType::F64).unwrap();
    estimated.execute(&input, &[0, 1], &[], &mut a, 0, None).unwrap();
    explicit.execute(&input, &[0, 1], &[], &mut b, 0, None).unwrap();
    assert_eq!(labels(&a), labels(&b));
}

/// 8x8 two-band raster: the left half sits near 0, the right half near 100,
/// with the same texture in every 4x4 quadrant.
fn two_group_raster() -> (Raster, Vec<Polygon<f64>>) {
    let base = |c: usize| if c < 4 { 0.0 } else { 100.0 };
    let b0 = Array2::from_shape_fn((8, 8), |(r, c)| base(c) + ((r * 3 + c * 5) % 4) as f64);
    let b1 = Array2::from_shape_fn((8, 8), |(r, c)| base(c) + ((r * c) % 4) as f64);
    let raster = Raster::from_arrays(vec![b0, b1]).unwrap();
    let t = *raster.transform();
    let polygons = vec![
        pixel_window_polygon(&t, 0, 0, 4, 4),
        pixel_window_polygon(&t, 0, 4, 4, 4),
        pixel_window_polygon(&t, 4, 0, 4, 4),
        pixel_window_polygon(&t, 4, 4, 4, 4),
    ];
    (raster, polygons)
}

fn run_isoseg(acceptance: f64, distance: DistanceType) -> (Raster, usize, Vec<u32>, Vec<usize>) {
    let (raster, polygons) = two_group_raster();
    let mut iso = IsoSegStrategy::new();
    iso.initialize(&IsoSegParams {
        acceptance_threshold: acceptance,
        distance,
    })
    .unwrap();
    let mut out = Raster::new(8, 8, 1, DataType::F64).unwrap();
    let report = iso
        .execute_with_report(&raster, &[0, 1], &polygons, &mut out, 0, None)
        .unwrap();
    (out, report.cluster_count(), report.labels, report.clusters_per_pass)
}

#[test]
fn test_isoseg_full_acceptance_single_cluster() {
    init_tracing();
    for distance in [DistanceType::Mahalanobis, DistanceType::Bhattacharyya] {
        let (out, clusters, labels_per_polygon, _) = run_isoseg(100.0, distance);
        assert_eq!(clusters, 1);
        assert_eq!(labels_per_polygon, vec![1, 1, 1, 1]);
        assert!(labels(&out).iter().all(|&v| v == 1.0));
    }
}

#[test]
fn test_isoseg_separates_distant_groups() {
    init_tracing();
    let (out, clusters, labels_per_polygon, per_pass) =
        run_isoseg(99.0, DistanceType::Mahalanobis);
    assert_eq!(clusters, 2);
    assert_eq!(labels_per_polygon, vec![1, 2, 1, 2]);
    assert_eq!(per_pass, vec![2, 2]);

    let values = out.band_data(0).unwrap();
    assert_eq!(values[[0, 0]], 1.0);
    assert_eq!(values[[7, 3]], 1.0);
    assert_eq!(values[[0, 4]], 2.0);
    assert_eq!(values[[7, 7]], 2.0);
}

#[test]
fn test_isoseg_cluster_count_monotonic() {
    init_tracing();
    for distance in [DistanceType::Mahalanobis, DistanceType::Bhattacharyya] {
        let mut previous = usize::MAX;
        for acceptance in [50.0, 90.0, 95.0, 99.0, 99.9, 100.0] {
            let (_, clusters, labels_per_polygon, per_pass) = run_isoseg(acceptance, distance);
            assert!(clusters <= previous);
            assert!(clusters >= 1 && clusters <= 4);
            assert!(labels_per_polygon.iter().all(|&l| l >= 1 && l as usize <= clusters));
            assert!(per_pass.windows(2).all(|w| w[1] <= w[0]));
            previous = clusters;
        }
    }
}

#[test]
fn test_ed_deterministic_across_runs() {
    init_tracing();
    let input = sweep_raster(20, 20);
    let samples = ClassSamples::new()
        .with_class(5, vec![vec![1.0, 1.0], vec![2.0, 3.0]])
        .unwrap()
        .with_class(6, vec![vec![20.0, 4.0]])
        .unwrap()
        .with_class(7, vec![vec![8.0, 12.0]])
        .unwrap();
    let mut ed = EuclideanDistanceStrategy::new();
    ed.initialize(&EdParams { samples }).unwrap();

    let mut first = Raster::new(20, 20, 1, DataType::F64).unwrap();
    let mut second = Raster::new(20, 20, 1, DataType::F64).unwrap();
    ed.execute(&input, &[0, 1], &[], &mut first, 0, None).unwrap();
    ed.execute(&input, &[0, 1], &[], &mut second, 0, None).unwrap();
    assert_eq!(labels(&first), labels(&second));
    assert!(labels(&first).iter().all(|v| [5.0, 6.0, 7.0].contains(v)));
}

#[test]
fn test_ed_class_order_irrelevant_without_ties() {
    init_tracing();
    let input = sweep_raster(20, 20);
    let classes = [
        (5, vec![1.5, 2.0]),
        (6, vec![20.25, 4.125]),
        (7, vec![8.0625, 12.375]),
    ];

    // Every pixel has a unique nearest mean
    for r in 0..20 {
        for c in 0..20 {
            let (x, y) = (c as f64 * 1.3 + 0.1, r as f64 * 0.7 + 0.05);
            let mut d: Vec<f64> = classes
                .iter()
                .map(|(_, m)| (x - m[0]).powi(2) + (y - m[1]).powi(2))
                .collect();
            d.sort_by(f64::total_cmp);
            assert!(d[1] - d[0] > 1e-9, "tie at ({r}, {c})");
        }
    }

    let run = |order: [usize; 3]| {
        let mut samples = ClassSamples::new();
        for i in order {
            let (id, mean) = &classes[i];
            samples = samples.with_class(*id, vec![mean.clone()]).unwrap();
        }
        let mut ed = EuclideanDistanceStrategy::new();
        ed.initialize(&EdParams { samples }).unwrap();
        let mut out = Raster::new(20, 20, 1, DataType::F64).unwrap();
        ed.execute(&input, &[0, 1], &[], &mut out, 0, None).unwrap();
        labels(&out)
    };

    let forward = run([0, 1, 2]);
    assert_eq!(forward, run([2, 0, 1]));
    assert_eq!(forward, run([1, 2, 0]));
    for id in [5.0, 6.0, 7.0] {
        assert!(forward.contains(&id), "class {id} never chosen");
    }
}

#[test]
fn test_params_json_round_trip() {
    let samples = ClassSamples::new()
        .with_class(1, unit_cloud([0.0, 0.0]))
        .unwrap();
    let all = vec![
        ClassifierParams::Ed(EdParams {
            samples: samples.clone(),
        }),
        ClassifierParams::Map(MapParams {
            samples,
            priori: Some(vec![1.0]),
            priori_stride: 3,
            skip_nodata: true,
        }),
        ClassifierParams::IsoSeg(IsoSegParams {
            acceptance_threshold: 95.0,
            distance: DistanceType::Bhattacharyya,
        }),
    ];
    let json = serde_json::to_string(&all).unwrap();
    let back: Vec<ClassifierParams> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, all);

    let map: ClassifierParams =
        serde_json::from_str(r#"{"strategy":"map","samples":{"classes":[]}}"#).unwrap();
    match map {
        ClassifierParams::Map(p) => {
            assert_eq!(p.priori_stride, 2);
            assert!(p.priori.is_none());
            assert!(!p.skip_nodata);
        }
        other => panic!("unexpected params {other:?}"),
    }
}

#[test]
fn test_facade_isoseg_through_mem_driver() {
    init_tracing();
    let (raster, polygons) = two_group_raster();
    let input = ClassifierInput::new(
        &raster,
        vec![0, 1],
        ClassifierParams::IsoSeg(IsoSegParams::default()),
    )
    .with_polygons(polygons);

    let mut classifier = Classifier::new();
    classifier.initialize(input).unwrap();
    let out = classifier
        .execute(&OutputRasterSpec::default(), &RasterFactory::default(), None)
        .unwrap()
        .into_raster()
        .unwrap();

    assert_eq!(out.shape(), (8, 8));
    assert_eq!(out.transform(), raster.transform());
    let values = labels(&out);
    assert_eq!(values.iter().filter(|&&v| v == 1.0).count(), 32);
    assert_eq!(values.iter().filter(|&&v| v == 2.0).count(), 32);
}

#[test]
fn test_facade_cancellation() {
    init_tracing();
    let input_raster = sweep_raster(10, 10);
    let samples = ClassSamples::new()
        .with_class(1, unit_cloud([0.0, 0.0]))
        .unwrap()
        .with_class(2, unit_cloud([10.0, 10.0]))
        .unwrap();
    let mut classifier = Classifier::new();
    classifier
        .initialize(ClassifierInput::new(
            &input_raster,
            vec![0, 1],
            ClassifierParams::Ed(EdParams { samples }),
        ))
        .unwrap();

    let progress = terraclass_core::TaskProgress::cancel_after(3);
    let result = classifier.execute(
        &OutputRasterSpec::default(),
        &RasterFactory::default(),
        Some(&progress),
    );
    assert!(matches!(result, Err(terraclass_core::Error::Cancelled)));
}
