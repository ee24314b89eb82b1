// tests/unit_tests.rs
use std::sync::Arc;

use chrono::NaiveDate;
use geo::Rect;
use ndvi_pest_scan::{
    analyze_field, run_batch, BaselineEstimator, DetectionConfig, Field, FieldOutcome, GeoInfo,
    MemorySource, Raster, Scene, SourceError,
};

/// 10x10 grid of 10 m pixels covering (0,0)-(100,100)
fn grid() -> GeoInfo {
    GeoInfo::north_up(10, 10, 0.0, 100.0, 10.0)
}

fn whole_field() -> Field {
    Field::new("plot-1", Rect::new((0.0, 0.0), (100.0, 100.0)).to_polygon())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Scene whose NIR/RED bands produce the given NDVI per pixel (NIR + RED = 1).
fn scene_with_ndvi(
    geo: &GeoInfo,
    day: NaiveDate,
    cloud_pct: f32,
    ndvi: &[f32],
    scl: &[f32],
) -> Scene {
    let nir: Vec<f32> = ndvi.iter().map(|v| (1.0 + v) / 2.0).collect();
    let red: Vec<f32> = ndvi.iter().map(|v| (1.0 - v) / 2.0).collect();
    Scene::new(
        format!("S2_{day}"),
        day,
        cloud_pct,
        Arc::new(Raster::new(geo.clone(), scl.to_vec()).unwrap()),
        Arc::new(Raster::new(geo.clone(), nir).unwrap()),
        Arc::new(Raster::new(geo.clone(), red).unwrap()),
    )
    .unwrap()
}

/// Clear-sky scene with the same NDVI everywhere.
fn uniform_scene(geo: &GeoInfo, day: NaiveDate, ndvi: f32) -> Scene {
    let n = geo.len();
    scene_with_ndvi(geo, day, 10.0, &vec![ndvi; n], &vec![4.0; n])
}

/// Scene where `low_pixels` pixels sit at `low` and the rest are set so the
/// field mean equals `mean`.
fn patchy_scene(geo: &GeoInfo, day: NaiveDate, mean: f32, low_pixels: usize, low: f32) -> Scene {
    let n = geo.len();
    let high = (mean * n as f32 - low * low_pixels as f32) / (n - low_pixels) as f32;
    let ndvi: Vec<f32> = (0..n).map(|i| if i < low_pixels { low } else { high }).collect();
    scene_with_ndvi(geo, day, 10.0, &ndvi, &vec![4.0; n])
}

/// One clear scene at NDVI 0.55 in each default reference year.
fn baseline_scenes(geo: &GeoInfo) -> Vec<Scene> {
    (2019..=2023)
        .map(|y| uniform_scene(geo, date(y, 7, 15), 0.55))
        .collect()
}

/// Five season dates with field-mean anomalies [-0.10, -0.13, -0.14, -0.15, -0.05]
/// against a 0.55 baseline; the last date has `low_pixels` stressed pixels.
fn season_scenes(geo: &GeoInfo, low_pixels: usize) -> Vec<Scene> {
    let mut scenes: Vec<Scene> = [
        (date(2025, 6, 10), 0.45),
        (date(2025, 6, 25), 0.42),
        (date(2025, 7, 10), 0.41),
        (date(2025, 7, 25), 0.40),
    ]
    .into_iter()
    .map(|(d, v)| uniform_scene(geo, d, v))
    .collect();
    scenes.push(patchy_scene(geo, date(2025, 8, 9), 0.50, low_pixels, 0.30));
    scenes
}

fn source_with(low_pixels: usize) -> MemorySource {
    let geo = grid();
    let mut scenes = baseline_scenes(&geo);
    scenes.extend(season_scenes(&geo, low_pixels));
    MemorySource::new(scenes)
}

#[test]
fn test_end_to_end_detection() {
    let source = source_with(22);
    let config = DetectionConfig::default();

    let analysis = analyze_field(&source, &config, &whole_field()).unwrap();
    let result = &analysis.result;

    assert!((result.baseline_mean - 0.55).abs() < 1e-6);
    assert_eq!(result.n_images, 5);

    let flags: Vec<bool> = analysis.records.iter().map(|r| r.is_low).collect();
    assert_eq!(flags, vec![false, true, true, true, false]);
    let expected = [-0.10, -0.13, -0.14, -0.15, -0.05];
    for (got, want) in result.last_anomalies.iter().zip(expected) {
        assert!((got - want).abs() < 1e-5, "expected {want}, got {got}");
    }

    assert!(result.consecutive_flag);
    assert_eq!(result.pix_below, 22);
    assert_eq!(result.pix_total, 100);
    assert!((result.frac_below - 0.22).abs() < 1e-12);
    assert!(result.pest_detected);
}

#[test]
fn test_small_stressed_area_is_not_detected() {
    let source = source_with(5);
    let config = DetectionConfig::default();

    let result = analyze_field(&source, &config, &whole_field()).unwrap().result;

    assert!(result.consecutive_flag);
    assert!((result.frac_below - 0.05).abs() < 1e-12);
    assert!(!result.pest_detected);
}

#[test]
fn test_empty_season() {
    let source = MemorySource::new(baseline_scenes(&grid()));
    let config = DetectionConfig::default();

    let analysis = analyze_field(&source, &config, &whole_field()).unwrap();
    let result = analysis.result;

    assert_eq!(result.n_images, 0);
    assert_eq!(result.frac_below, 0.0);
    assert!(!result.pest_detected);
    assert!(!result.consecutive_flag);
    assert!(result.last_anomalies.is_empty());
    assert!(analysis.latest_anomaly.is_none());
}

#[test]
fn test_two_low_observations_are_not_a_run() {
    let geo = grid();
    let mut scenes = baseline_scenes(&geo);
    scenes.push(uniform_scene(&geo, date(2025, 6, 10), 0.30));
    scenes.push(uniform_scene(&geo, date(2025, 6, 25), 0.30));
    let source = MemorySource::new(scenes);

    let result = analyze_field(&source, &DetectionConfig::default(), &whole_field())
        .unwrap()
        .result;

    assert_eq!(result.n_images, 2);
    assert_eq!(result.frac_below, 1.0);
    assert!(!result.consecutive_flag);
    assert!(!result.pest_detected);
}

#[test]
fn test_only_trailing_window_is_examined() {
    let geo = grid();
    let mut scenes = baseline_scenes(&geo);
    // three low dates early in the season, then five normal ones
    for day in [1, 5, 9] {
        scenes.push(uniform_scene(&geo, date(2025, 6, day), 0.30));
    }
    for day in [1, 5, 9, 13, 17] {
        scenes.push(uniform_scene(&geo, date(2025, 7, day), 0.55));
    }
    let source = MemorySource::new(scenes);

    let analysis = analyze_field(&source, &DetectionConfig::default(), &whole_field()).unwrap();
    assert_eq!(analysis.result.n_images, 8);
    assert_eq!(analysis.records.len(), 8);
    assert_eq!(analysis.result.last_anomalies.len(), 5);
    assert!(!analysis.result.consecutive_flag);
}

#[test]
fn test_cloud_filter_sets_image_count() {
    let geo = grid();
    let n = geo.len();
    let clear = vec![4.0; n];
    let ndvi = vec![0.5; n];
    let mut scenes = baseline_scenes(&geo);
    scenes.push(scene_with_ndvi(&geo, date(2025, 6, 10), 39.9, &ndvi, &clear));
    scenes.push(scene_with_ndvi(&geo, date(2025, 6, 20), 40.0, &ndvi, &clear));
    scenes.push(scene_with_ndvi(&geo, date(2025, 6, 30), 85.0, &ndvi, &clear));
    // outside the season window
    scenes.push(scene_with_ndvi(&geo, date(2025, 10, 1), 0.0, &ndvi, &clear));
    let source = MemorySource::new(scenes);

    let result = analyze_field(&source, &DetectionConfig::default(), &whole_field())
        .unwrap()
        .result;
    assert_eq!(result.n_images, 1);
}

#[test]
fn test_masked_pixels_are_left_out() {
    let geo = grid();
    let n = geo.len();
    let mut scenes = baseline_scenes(&geo);

    // Half the field under cloud reporting a very low NDVI; the clear half is normal.
    let ndvi: Vec<f32> = (0..n).map(|i| if i < 50 { 0.05 } else { 0.55 }).collect();
    let scl: Vec<f32> = (0..n).map(|i| if i < 50 { 9.0 } else { 4.0 }).collect();
    scenes.push(scene_with_ndvi(&geo, date(2025, 7, 1), 20.0, &ndvi, &scl));
    let source = MemorySource::new(scenes);

    let analysis = analyze_field(&source, &DetectionConfig::default(), &whole_field()).unwrap();
    let record = &analysis.records[0];
    assert!((record.mean_ndvi - 0.55).abs() < 1e-6);
    assert!(!record.is_low);
    assert_eq!(analysis.result.pix_total, 50);
    assert_eq!(analysis.result.pix_below, 0);
}

#[test]
fn test_fully_masked_dates_default_to_zero() {
    let geo = grid();
    let n = geo.len();
    let cloudy = vec![9.0; n];
    let ndvi = vec![0.55; n];

    // No reference imagery at all, and a season date that is entirely cloud.
    let scene = scene_with_ndvi(&geo, date(2025, 7, 1), 30.0, &ndvi, &cloudy);
    let source = MemorySource::new(vec![scene]);

    let analysis = analyze_field(&source, &DetectionConfig::default(), &whole_field()).unwrap();
    assert_eq!(analysis.baseline.mean, 0.0);
    assert!(analysis.baseline.raster.is_none());
    assert_eq!(analysis.records[0].mean_ndvi, 0.0);
    assert_eq!(analysis.records[0].anomaly, 0.0);
    assert_eq!(analysis.result.pix_total, 0);
    assert_eq!(analysis.result.frac_below, 0.0);
    assert!(!analysis.result.pest_detected);
}

#[test]
fn test_baseline_is_median_of_yearly_medians() {
    let geo = grid();
    let mut scenes = Vec::new();
    // 2019: three dates, median 0.60
    for (day, v) in [(1, 0.20), (2, 0.60), (3, 0.70)] {
        scenes.push(uniform_scene(&geo, date(2019, 7, day), v));
    }
    // 2020 and 2021: one date each
    scenes.push(uniform_scene(&geo, date(2020, 7, 1), 0.50));
    scenes.push(uniform_scene(&geo, date(2021, 7, 1), 0.40));
    // outside the calendar window, ignored
    scenes.push(uniform_scene(&geo, date(2021, 11, 1), 0.90));
    let source = MemorySource::new(scenes);

    let config = DetectionConfig::default();
    let baseline = BaselineEstimator::new(&source, &config)
        .estimate(&whole_field())
        .unwrap();

    assert_eq!(baseline.years_used, vec![2019, 2020, 2021]);
    assert_eq!(baseline.scene_count, 5);
    assert!((baseline.mean - 0.50).abs() < 1e-6);
}

#[test]
fn test_field_outside_imagery_gets_empty_result() {
    let source = source_with(22);
    let far = Field::new("far", Rect::new((1000.0, 1000.0), (1100.0, 1100.0)).to_polygon());

    let result = analyze_field(&source, &DetectionConfig::default(), &far)
        .unwrap()
        .result;
    assert_eq!(result.n_images, 0);
    assert_eq!(result.baseline_mean, 0.0);
    assert!(!result.pest_detected);
}

#[test]
fn test_batch_reports_failed_field_and_continues() {
    let fine = grid();
    let coarse = GeoInfo::north_up(10, 10, 0.0, 200.0, 20.0);

    let mut scenes = baseline_scenes(&fine);
    scenes.extend(season_scenes(&fine, 22));
    // One season scene on a coarser grid, overlapping only the first field.
    scenes.push(uniform_scene(&coarse, date(2025, 8, 20), 0.50));
    let source = MemorySource::new(scenes);

    // The coarse grid spans x 0..200, y 0..200; the fine one x 0..100, y 0..100.
    let mixed = whole_field();
    let coarse_only = Field::new("plot-2", Rect::new((120.0, 120.0), (200.0, 200.0)).to_polygon());

    let runs = run_batch(&source, &DetectionConfig::default(), &[mixed, coarse_only]);
    assert_eq!(runs.len(), 2);

    assert_eq!(runs[0].field, "plot-1");
    assert!(matches!(runs[0].analysis, Err(SourceError::GridMismatch { .. })));
    assert!(matches!(runs[0].outcome(), FieldOutcome::Failed { .. }));

    let second = runs[1].analysis.as_ref().unwrap();
    assert_eq!(second.result.field, "plot-2");
    assert_eq!(second.result.n_images, 1);
    assert_eq!(second.result.baseline_mean, 0.0);
}

#[test]
fn test_extent_is_repeatable() {
    let source = source_with(22);
    let config = DetectionConfig::default();
    let first = analyze_field(&source, &config, &whole_field()).unwrap().result;
    let second = analyze_field(&source, &config, &whole_field()).unwrap().result;
    assert_eq!(first, second);
}
