//! Integration: GeoTIFF layers -> stratified sample -> CSV.

use canopy_io::{GeoTransform, Raster, read_geotiff, write_geotiff};
use canopy_sample::{ChangeGroup, SamplingLayers, StratifiedSampler, write_samples};
use tempfile::TempDir;

#[test]
fn sampled_points_fall_on_eligible_pixels() {
    let dir = TempDir::new().unwrap();
    let gt = GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0);
    let (rows, cols) = (120, 100);

    let cover: Vec<u8> = (0..rows * cols).map(|i| if i % cols < 40 { 1 } else { 2 }).collect();
    let start: Vec<f32> = vec![60.0; rows * cols];
    let end: Vec<f32> = (0..rows * cols)
        .map(|i| if i % 5 == 0 { 60.0 - (i % 37) as f32 - 1.0 } else { 60.0 })
        .collect();

    let write_u8 = |name: &str, data: Vec<u8>| {
        let path = dir.path().join(name);
        write_geotiff(&Raster::from_vec(data, rows, cols, gt).unwrap(), &path).unwrap();
        path
    };
    let mask_path = write_u8("mask.tif", vec![1; rows * cols]);
    let lc_path = write_u8("lc_2000.tif", cover);
    let gain_path = write_u8("gain.tif", vec![0; rows * cols]);
    let start_path = dir.path().join("tcc_2000.tif");
    let end_path = dir.path().join("tcc_2010.tif");
    write_geotiff(&Raster::from_vec(start, rows, cols, gt).unwrap(), &start_path).unwrap();
    write_geotiff(&Raster::from_vec(end, rows, cols, gt).unwrap(), &end_path).unwrap();

    let land_mask = read_geotiff::<u8>(&mask_path).unwrap();
    let land_cover = read_geotiff::<i32>(&lc_path).unwrap();
    let forest_gains = read_geotiff::<u8>(&gain_path).unwrap();
    let start_cover = read_geotiff::<f32>(&start_path).unwrap();
    let end_cover = read_geotiff::<f32>(&end_path).unwrap();
    let layers = SamplingLayers {
        land_mask: &land_mask,
        land_cover: &land_cover,
        start_cover: &start_cover,
        end_cover: &end_cover,
        forest_gains: &forest_gains,
    };

    let set = StratifiedSampler::new().with_seed(11).sample(&layers).unwrap();
    // 12_000 valid pixels: ceil(12_000 / 5000) = 3 per group.
    assert_eq!(set.target, 3);
    assert!(set.points_in(ChangeGroup::Changing).count() >= 3);
    assert!(set.points_in(ChangeGroup::Stable).count() >= 3);

    for p in set.points_in(ChangeGroup::Changing) {
        let col = ((p.x - 500_000.0 - 15.0) / 30.0).round() as usize;
        let row = ((4_000_000.0 - 15.0 - p.y) / 30.0).round() as usize;
        assert_ne!(start_cover.get(row, col), end_cover.get(row, col));
        let expected_class = if col < 40 { 1 } else { 2 };
        assert_eq!(p.land_cover, expected_class);
    }

    let csv_path = dir.path().join("samples").join("0_samples.csv");
    write_samples(&csv_path, &set).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("x,y,land_cover,group"));
    assert_eq!(lines.count(), set.points.len());
}
