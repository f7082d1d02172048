//! Stratified, change-aware selection of training pixels within a tile.

use std::collections::BTreeSet;

use canopy_io::Raster;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::SampleError;
use crate::skew::{SkewNormal, draws_to_ranks};

/// Which side of the change partition a pixel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeGroup {
    /// Non-zero canopy-cover difference between the start and end year.
    Changing,
    /// No difference.
    Stable,
}

/// Aligned input layers of one tile.
#[derive(Debug, Clone, Copy)]
pub struct SamplingLayers<'a> {
    /// Pixels eligible for sampling have value 1.
    pub land_mask: &'a Raster<u8>,
    /// Land-cover class codes; positive codes are sampled.
    pub land_cover: &'a Raster<i32>,
    /// Canopy cover of the start year.
    pub start_cover: &'a Raster<f32>,
    /// Canopy cover of the end year.
    pub end_cover: &'a Raster<f32>,
    /// Non-zero where forest was gained.
    pub forest_gains: &'a Raster<u8>,
}

impl SamplingLayers<'_> {
    fn check_grid(&self) -> Result<(), SampleError> {
        let mask = self.land_mask;
        mask.ensure_same_shape("land_cover", self.land_cover)?;
        mask.ensure_same_shape("start canopy_cover", self.start_cover)?;
        mask.ensure_same_shape("end canopy_cover", self.end_cover)?;
        mask.ensure_same_shape("forest_gains", self.forest_gains)?;
        Ok(())
    }
}

/// Quota bookkeeping for one class and group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassQuota {
    /// Land-cover class.
    pub land_cover: i32,
    /// Change group.
    pub group: ChangeGroup,
    /// Pixels that qualified.
    pub eligible: usize,
    /// Samples requested.
    pub quota: usize,
    /// Samples taken.
    pub selected: usize,
}

/// One selected pixel in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplePoint {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
    /// Land-cover class of the pixel.
    pub land_cover: i32,
    /// Change group of the pixel.
    pub group: ChangeGroup,
}

/// Result of sampling one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    /// Samples per group before class splitting.
    pub target: usize,
    /// Per class and group, changing before stable within each class.
    pub quotas: Vec<ClassQuota>,
    /// Selected pixels, class by class, changing before stable.
    pub points: Vec<SamplePoint>,
}

impl SampleSet {
    /// Points belonging to `group`.
    pub fn points_in(&self, group: ChangeGroup) -> impl Iterator<Item = &SamplePoint> {
        self.points.iter().filter(move |p| p.group == group)
    }
}

/// Configuration for [`StratifiedSampler`].
///
/// Defaults: one sample per 2 500 valid pixels, split over 2 groups, skew
/// shape −5, seed 42.
#[derive(Debug, Clone, PartialEq)]
pub struct StratifiedSampler {
    pub(crate) pixels_per_sample: f64,
    pub(crate) group_split: f64,
    pub(crate) skew_shape: f64,
    pub(crate) seed: u64,
}

impl Default for StratifiedSampler {
    fn default() -> Self {
        Self {
            pixels_per_sample: 2500.0,
            group_split: 2.0,
            skew_shape: -5.0,
            seed: 42,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64, SampleError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SampleError::InvalidParameter { name, value })
    }
}

/// Eligible pixel with its change magnitude.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    col: usize,
    magnitude: f64,
}

impl StratifiedSampler {
    /// Sampler with default constants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of valid pixels per sample.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidParameter`] unless positive and finite.
    pub fn with_pixels_per_sample(mut self, pixels: f64) -> Result<Self, SampleError> {
        self.pixels_per_sample = positive("pixels_per_sample", pixels)?;
        Ok(self)
    }

    /// Set the divisor splitting the target between groups.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidParameter`] unless positive and finite.
    pub fn with_group_split(mut self, split: f64) -> Result<Self, SampleError> {
        self.group_split = positive("group_split", split)?;
        Ok(self)
    }

    /// Set the skew-normal shape used for changing pixels.
    #[must_use]
    pub fn with_skew_shape(mut self, shape: f64) -> Self {
        self.skew_shape = shape;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of samples per group for `valid_pixels` valid pixels.
    #[must_use]
    pub fn target_count(&self, valid_pixels: usize) -> usize {
        (valid_pixels as f64 / self.pixels_per_sample / self.group_split).ceil() as usize
    }

    /// Select sample pixels from one tile.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SampleError::Raster`] | layers do not share the land mask's shape |
    /// | [`SampleError::DegenerateDraw`] | a skewed draw could not be rescaled |
    #[instrument(skip_all, fields(seed = self.seed))]
    pub fn sample(&self, layers: &SamplingLayers<'_>) -> Result<SampleSet, SampleError> {
        layers.check_grid()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let (rows, cols) = layers.land_mask.shape();
        let mask = layers.land_mask.data();
        let cover = layers.land_cover.data();
        let gains = layers.forest_gains.data();
        let start = layers.start_cover.data();
        let end = layers.end_cover.data();

        let mut valid = 0usize;
        let mut classes = BTreeSet::new();
        for r in 0..rows {
            for c in 0..cols {
                let lc = cover[(r, c)];
                if mask[(r, c)] == 1 && lc > 0 {
                    classes.insert(lc);
                    if gains[(r, c)] == 0 {
                        valid += 1;
                    }
                }
            }
        }
        let target = self.target_count(valid);
        info!(valid, target, n_classes = classes.len(), "sampling target computed");

        // Eligible pixels per class: (changing, stable).
        let mut eligible: Vec<(i32, Vec<Candidate>, Vec<Candidate>)> = classes
            .iter()
            .map(|&lc| (lc, Vec::new(), Vec::new()))
            .collect();
        for r in 0..rows {
            for c in 0..cols {
                if mask[(r, c)] != 1 || gains[(r, c)] != 0 {
                    continue;
                }
                let Some(slot) = classes.iter().position(|&lc| lc == cover[(r, c)]) else {
                    continue;
                };
                let delta = f64::from(start[(r, c)]) - f64::from(end[(r, c)]);
                let candidate = Candidate {
                    row: r,
                    col: c,
                    magnitude: delta.abs(),
                };
                if delta != 0.0 {
                    eligible[slot].1.push(candidate);
                } else {
                    eligible[slot].2.push(candidate);
                }
            }
        }

        let total_changing: usize = eligible.iter().map(|e| e.1.len()).sum();
        let total_stable: usize = eligible.iter().map(|e| e.2.len()).sum();
        if total_changing == 0 {
            warn!("no changing pixels in tile, changing group gets no samples");
        }
        if total_stable == 0 {
            warn!("no stable pixels in tile, stable group gets no samples");
        }

        let transform = layers.land_mask.transform();
        let res = transform.resolution();
        let (ox, oy) = (transform.origin_x, transform.origin_y);
        let x_of = |col: usize| ox + res / 2.0 + col as f64 * res;

        let mut quotas = Vec::with_capacity(eligible.len() * 2);
        let mut points = Vec::new();
        for (land_cover, mut changing, stable) in eligible {
            let quota = share_quota(target, changing.len(), total_changing);
            let picked = select_changing(&mut changing, quota, self.skew_shape, land_cover, &mut rng)?;
            quotas.push(ClassQuota {
                land_cover,
                group: ChangeGroup::Changing,
                eligible: changing.len(),
                quota,
                selected: picked.len(),
            });
            points.extend(picked.iter().map(|p| SamplePoint {
                x: x_of(p.col),
                y: oy - res / 2.0 - p.row as f64 * res,
                land_cover,
                group: ChangeGroup::Changing,
            }));

            let quota = share_quota(target, stable.len(), total_stable);
            let picked = select_stable(&stable, quota, &mut rng);
            quotas.push(ClassQuota {
                land_cover,
                group: ChangeGroup::Stable,
                eligible: stable.len(),
                quota,
                selected: picked.len(),
            });
            points.extend(picked.iter().map(|p| SamplePoint {
                x: x_of(p.col),
                y: oy + res / 2.0 - p.row as f64 * res,
                land_cover,
                group: ChangeGroup::Stable,
            }));
            debug!(land_cover, "class sampled");
        }

        info!(n_samples = points.len(), "tile sampled");
        Ok(SampleSet {
            target,
            quotas,
            points,
        })
    }
}

/// `ceil(target * count / total)`, zero when the group is empty.
fn share_quota(target: usize, count: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (target * count).div_ceil(total)
    }
}

/// Magnitude-weighted selection of changing pixels.
///
/// Candidates are sorted by ascending magnitude in place.
fn select_changing<R: Rng + ?Sized>(
    candidates: &mut [Candidate],
    quota: usize,
    shape: f64,
    land_cover: i32,
    rng: &mut R,
) -> Result<Vec<Candidate>, SampleError> {
    if candidates.len() <= quota {
        return Ok(candidates.to_vec());
    }
    candidates.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
    let max_rank = candidates.len() - 1;
    match quota {
        0 => Ok(Vec::new()),
        1 => Ok(vec![candidates[max_rank]]),
        _ => {
            let draws = SkewNormal::new(shape, max_rank as f64, 1.0).sample_n(rng, quota);
            let ranks = draws_to_ranks(&draws, max_rank)
                .ok_or(SampleError::DegenerateDraw { land_cover, quota })?;
            Ok(ranks.into_iter().map(|rank| candidates[rank]).collect())
        }
    }
}

/// Uniform selection without replacement.
fn select_stable(candidates: &[Candidate], quota: usize, rng: &mut ChaCha8Rng) -> Vec<Candidate> {
    if candidates.len() <= quota {
        return candidates.to_vec();
    }
    index::sample(rng, candidates.len(), quota)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use canopy_io::{GeoTransform, Raster};

    use super::*;

    struct Tile {
        mask: Raster<u8>,
        cover: Raster<i32>,
        start: Raster<f32>,
        end: Raster<f32>,
        gains: Raster<u8>,
    }

    impl Tile {
        fn uniform(rows: usize, cols: usize) -> Self {
            let gt = GeoTransform::new(1000.0, 2000.0, 30.0, -30.0);
            Self {
                mask: Raster::filled(rows, cols, 1, gt),
                cover: Raster::filled(rows, cols, 1, gt),
                start: Raster::filled(rows, cols, 50.0, gt),
                end: Raster::filled(rows, cols, 50.0, gt),
                gains: Raster::filled(rows, cols, 0, gt),
            }
        }

        fn layers(&self) -> SamplingLayers<'_> {
            SamplingLayers {
                land_mask: &self.mask,
                land_cover: &self.cover,
                start_cover: &self.start,
                end_cover: &self.end,
                forest_gains: &self.gains,
            }
        }
    }

    #[test]
    fn small_tile_targets_one_sample() {
        // 40 valid pixels: ceil(40 / 2500 / 2) = 1.
        let mut tile = Tile::uniform(10, 10);
        for (i, v) in tile.mask.data_mut().iter_mut().enumerate() {
            *v = u8::from(i < 40);
        }
        let set = StratifiedSampler::new().sample(&tile.layers()).unwrap();
        assert_eq!(set.target, 1);
        // No changing pixels: the single sample is stable.
        assert_eq!(set.points_in(ChangeGroup::Changing).count(), 0);
        assert_eq!(set.points_in(ChangeGroup::Stable).count(), 1);
        assert_eq!(set.quotas.len(), 2);
        assert_eq!(set.quotas[0].quota, 0);
    }

    #[test]
    fn quota_of_one_takes_largest_change() {
        let mut tile = Tile::uniform(10, 10);
        for (i, v) in tile.end.data_mut().iter_mut().enumerate() {
            *v = 50.0 - (i % 7) as f32;
        }
        tile.end.data_mut()[(4, 6)] = 90.0; // |delta| = 40, the largest
        let set = StratifiedSampler::new().sample(&tile.layers()).unwrap();
        let changing: Vec<_> = set.points_in(ChangeGroup::Changing).collect();
        assert_eq!(changing.len(), 1);
        assert_relative_eq!(changing[0].x, 1000.0 + 15.0 + 6.0 * 30.0);
        assert_relative_eq!(changing[0].y, 2000.0 - 15.0 - 4.0 * 30.0);
    }

    #[test]
    fn stable_coordinates_use_upper_offset() {
        let mut tile = Tile::uniform(3, 3);
        for (i, v) in tile.mask.data_mut().iter_mut().enumerate() {
            *v = u8::from(i == 5);
        }
        let set = StratifiedSampler::new().sample(&tile.layers()).unwrap();
        assert_eq!(set.points.len(), 1);
        let p = set.points[0];
        // Row 1, col 2.
        assert_relative_eq!(p.x, 1000.0 + 15.0 + 60.0);
        assert_relative_eq!(p.y, 2000.0 + 15.0 - 30.0);
        assert_eq!(p.group, ChangeGroup::Stable);
    }

    #[test]
    fn quotas_follow_class_shares_and_never_upsample() {
        // 200 x 100 = 20_000 valid pixels: target ceil(20_000 / 5000) = 4.
        let mut tile = Tile::uniform(200, 100);
        for ((_, c), v) in tile.cover.data_mut().indexed_iter_mut() {
            *v = if c < 75 { 10 } else { 20 };
        }
        for ((r, c), v) in tile.end.data_mut().indexed_iter_mut() {
            // Class 10 has 3 changing pixels; class 20 has 300.
            if (c < 75 && r == 0 && c < 3) || (c >= 75 && r < 12) {
                *v = 50.0 - ((r * 100 + c) % 40) as f32 - 1.0;
            }
        }
        let set = StratifiedSampler::new().with_seed(7).sample(&tile.layers()).unwrap();
        assert_eq!(set.target, 4);

        let q = |lc: i32, g: ChangeGroup| {
            *set.quotas.iter().find(|q| q.land_cover == lc && q.group == g).unwrap()
        };
        let c10 = q(10, ChangeGroup::Changing);
        let c20 = q(20, ChangeGroup::Changing);
        assert_eq!((c10.eligible, c20.eligible), (3, 300));
        // ceil(4 * 3 / 303) = 1 and ceil(4 * 300 / 303) = 4.
        assert_eq!((c10.quota, c20.quota), (1, 4));

        let s10 = q(10, ChangeGroup::Stable);
        let s20 = q(20, ChangeGroup::Stable);
        assert_eq!(s10.quota + s20.quota, 4 + 1);
        for quota in &set.quotas {
            assert!(quota.selected <= quota.eligible);
            assert!(quota.selected <= quota.quota);
        }
        assert_eq!(set.points.len(), set.quotas.iter().map(|q| q.selected).sum::<usize>());
    }

    #[test]
    fn skewed_selection_favours_large_changes() {
        let mut tile = Tile::uniform(100, 100);
        // 10_000 valid: target 2 per group; one class gets all of it.
        for (i, v) in tile.end.data_mut().iter_mut().enumerate() {
            if i % 2 == 0 {
                *v = 50.0 - (i % 50) as f32 - 1.0;
            }
        }
        let mut candidates: Vec<Candidate> = (0..1000)
            .map(|i| Candidate { row: i, col: 0, magnitude: i as f64 })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let picked = select_changing(&mut candidates, 200, -5.0, 1, &mut rng).unwrap();
        assert_eq!(picked.len(), 200);
        let median_pick = {
            let mut m: Vec<f64> = picked.iter().map(|c| c.magnitude).collect();
            m.sort_by(f64::total_cmp);
            m[100]
        };
        assert!(median_pick > 500.0, "median magnitude {median_pick}");

        let set = StratifiedSampler::new().sample(&tile.layers()).unwrap();
        assert_eq!(set.points_in(ChangeGroup::Changing).count(), 2);
        assert_eq!(set.points_in(ChangeGroup::Stable).count(), 2);
    }

    /// Yields the same word on every call.
    struct ConstantRng(u64);

    impl rand::RngCore for ConstantRng {
        fn next_u32(&mut self) -> u32 {
            self.0 as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0 as u8);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn identical_draws_cannot_be_ranked() {
        let mut candidates: Vec<Candidate> = (0..5)
            .map(|i| Candidate { row: i, col: 0, magnitude: i as f64 })
            .collect();
        let mut rng = ConstantRng(1 << 62);
        let err = select_changing(&mut candidates, 2, -5.0, 3, &mut rng).unwrap_err();
        assert!(matches!(err, SampleError::DegenerateDraw { land_cover: 3, quota: 2 }));

        // A single pick needs no draw at all.
        let picked = select_changing(&mut candidates, 1, -5.0, 3, &mut rng).unwrap();
        assert_eq!(picked[0].magnitude, 4.0);
    }

    #[test]
    fn gains_and_outside_mask_excluded() {
        let mut tile = Tile::uniform(4, 4);
        tile.gains.data_mut().fill(1);
        tile.gains.data_mut()[(0, 0)] = 0;
        tile.mask.data_mut()[(0, 0)] = 0;
        let set = StratifiedSampler::new().sample(&tile.layers()).unwrap();
        assert_eq!(set.target, 0);
        assert!(set.points.is_empty());
    }

    #[test]
    fn mismatched_layers_rejected() {
        let tile = Tile::uniform(4, 4);
        let other = Raster::filled(4, 5, 0.0f32, GeoTransform::default());
        let layers = SamplingLayers {
            end_cover: &other,
            ..tile.layers()
        };
        assert!(matches!(
            StratifiedSampler::new().sample(&layers),
            Err(SampleError::Raster(canopy_io::IoError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn invalid_constants_rejected() {
        assert!(StratifiedSampler::new().with_pixels_per_sample(0.0).is_err());
        assert!(StratifiedSampler::new().with_group_split(f64::NAN).is_err());
    }
}
