//! Integration: fitted forest and GeoTIFF layers -> tile and change maps.

use canopy_io::{GeoTransform, Raster, TileBounds, read_geotiff, read_geotiff_window, write_geotiff};
use canopy_map::{
    ChangeClass, DurationConfig, PREDICTION_NODATA, change_duration, classify_change_types,
    decadal_change, predict_tile, predictor_order,
};
use canopy_rf::RandomForestConfig;
use tempfile::TempDir;

#[test]
fn tile_prediction_round_trips_through_geotiff() {
    let dir = TempDir::new().unwrap();
    let gt = GeoTransform::new(0.0, 400.0, 10.0, -10.0);
    let (rows, cols) = (40, 40);

    // Cover follows the first predictor; the gap column is constant.
    let features: Vec<Vec<f64>> = (0..200)
        .map(|i| vec![f64::from(i % 100), f64::from((i * 7) % 13), 3.0])
        .collect();
    let targets: Vec<f64> = features.iter().map(|r| r[0]).collect();
    let names = vec!["ndvi".to_string(), "slope".to_string(), "gap".to_string()];
    let forest = RandomForestConfig::new(20)
        .unwrap()
        .with_seed(7)
        .fit(&features, &targets, &names)
        .unwrap()
        .into_forest();

    let ndvi: Vec<f32> = (0..rows * cols).map(|i| (i % cols) as f32 * 2.0).collect();
    let slope: Vec<f32> = vec![5.0; rows * cols];
    let mask: Vec<u8> = (0..rows * cols).map(|i| u8::from(i / cols >= 10)).collect();
    let ndvi_path = dir.path().join("ndvi_2010.tif");
    let slope_path = dir.path().join("slope.tif");
    let mask_path = dir.path().join("mask.tif");
    write_geotiff(&Raster::from_vec(ndvi, rows, cols, gt).unwrap(), &ndvi_path).unwrap();
    write_geotiff(&Raster::from_vec(slope, rows, cols, gt).unwrap(), &slope_path).unwrap();
    write_geotiff(&Raster::from_vec(mask, rows, cols, gt).unwrap(), &mask_path).unwrap();

    // A 20 x 20 tile in the lower-left quadrant.
    let bounds = TileBounds::new(0.0, 0.0, 200.0, 200.0);
    let mask = read_geotiff_window::<u8>(&mask_path, &bounds, 0).unwrap();
    let predictors = vec![
        read_geotiff_window::<f32>(&ndvi_path, &bounds, 0.0).unwrap(),
        read_geotiff_window::<f32>(&slope_path, &bounds, 0.0).unwrap(),
    ];
    assert_eq!(mask.shape(), (20, 20));

    let tile = predict_tile(&forest, &mask, &predictors, 3.0).unwrap();
    assert_eq!(tile.n_predicted, 400);

    let out = dir.path().join("canopy").join("0_2010_tcc.tif");
    write_geotiff(&tile.prediction, &out).unwrap();
    let back = read_geotiff::<f32>(&out).unwrap();
    assert_eq!(back.nodata(), Some(f64::from(PREDICTION_NODATA)));
    assert_eq!(back.transform().origin_y, 200.0);
    assert_eq!(back.count_where(|v| v != PREDICTION_NODATA), 400);
    // Predictions rise with the first predictor across the tile.
    let left = back.get(5, 0).unwrap();
    let right = back.get(5, 19).unwrap();
    assert!(right > left, "left {left}, right {right}");

    // Configuration declaring slope before ndvi reads the layers in model order.
    let configured = vec!["slope".to_string(), "ndvi".to_string()];
    let paths = [&slope_path, &ndvi_path];
    let order = predictor_order(forest.feature_names(), &configured).unwrap();
    assert_eq!(order, [1, 0]);
    let reordered: Vec<_> = order
        .iter()
        .map(|&i| read_geotiff_window::<f32>(paths[i], &bounds, 0.0).unwrap())
        .collect();
    let again = predict_tile(&forest, &mask, &reordered, 3.0).unwrap();
    assert_eq!(again.prediction, tile.prediction);
}

#[test]
fn change_layers_agree_on_a_loss_pixel() {
    let gt = GeoTransform::new(0.0, 20.0, 10.0, -10.0);
    let years = [2000, 2002, 2004, 2006, 2008, 2010, 2012, 2014];
    // Pixel 0 declines steadily, pixel 1 stays at 40.
    let layers: Vec<Raster<f32>> = (0..years.len())
        .map(|t| {
            let lost = 90.0 - 10.0 * t as f32;
            Raster::from_vec(vec![lost, 40.0], 1, 2, gt).unwrap()
        })
        .collect();

    let types = classify_change_types(&layers, 0.05).unwrap();
    assert_eq!(types.class.get(0, 0), Some(ChangeClass::Loss.code()));
    assert_eq!(types.class.get(0, 1), Some(ChangeClass::StableTree.code()));

    let durations = change_duration(&layers, &types.class, &DurationConfig::new()).unwrap();
    // Seven equal losses of 10: 6/7 is the first share above 0.8.
    assert_eq!(durations.loss.get(0, 0), Some(6));
    assert_eq!(durations.loss.get(0, 1), Some(0));

    let area = Raster::filled(1, 2, 1.0f32, gt);
    let decades = [(1992, 1999), (2000, 2010), (2011, 2018)];
    let decadal = decadal_change(&layers, &years, &area, &decades).unwrap();
    // 2002..=2010 carries five of the seven steps.
    assert_eq!(decadal.max_decade.get(0, 0), Some(2));
    assert!((decadal.max_change.get(0, 0).unwrap() - 0.5).abs() < 1e-6);
    assert_eq!(decadal.max_decade.get(0, 1), Some(0));
}
