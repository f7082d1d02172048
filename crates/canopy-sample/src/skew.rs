//! Skew-normal draws and their mapping onto magnitude ranks.

use rand::Rng;

/// Standard normal draw (Box-Muller).
pub(crate) fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.r#gen::<f64>().max(1e-12);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Skew-normal distribution with shape `alpha`, location and scale.
///
/// Negative `alpha` gives a long left tail, so most mass sits just below
/// `loc`. Draws use Azzalini's construction from two independent normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewNormal {
    alpha: f64,
    loc: f64,
    scale: f64,
}

impl SkewNormal {
    /// Create the distribution.
    #[must_use]
    pub fn new(alpha: f64, loc: f64, scale: f64) -> Self {
        Self { alpha, loc, scale }
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let delta = self.alpha / (1.0 + self.alpha * self.alpha).sqrt();
        let u0 = standard_normal(rng);
        let v = standard_normal(rng);
        let u1 = delta * u0 + (1.0 - delta * delta).sqrt() * v;
        let z = if u0 >= 0.0 { u1 } else { -u1 };
        self.loc + self.scale * z
    }

    /// Draw `n` values.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Rescale draws onto integer ranks `0..=max_rank`.
///
/// The minimum maps to 0 and the maximum to `max_rank`. Returns `None`
/// when the draws have zero or non-finite range.
#[must_use]
pub fn draws_to_ranks(draws: &[f64], max_rank: usize) -> Option<Vec<usize>> {
    let lo = draws.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = draws.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if !(range.is_finite() && range > 0.0) {
        return None;
    }
    let top = max_rank as f64;
    Some(
        draws
            .iter()
            .map(|&d| (((d - lo) / range * top).round() as usize).min(max_rank))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{SkewNormal, draws_to_ranks};

    #[test]
    fn negative_shape_skews_left() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let dist = SkewNormal::new(-5.0, 100.0, 1.0);
        let draws = dist.sample_n(&mut rng, 20_000);
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        // Mean of SN(-5) is loc - sqrt(2/pi) * 5/sqrt(26) ≈ loc - 0.782.
        assert!((mean - 99.218).abs() < 0.05, "mean {mean}");
        // P(Z > 0) = 1/2 - atan(5)/pi ≈ 0.063.
        let above = draws.iter().filter(|&&d| d > 100.0).count() as f64 / draws.len() as f64;
        assert!((above - 0.063).abs() < 0.01, "{above} of draws above loc");
    }

    #[test]
    fn ranks_span_full_range() {
        let ranks = draws_to_ranks(&[3.0, 1.0, 2.0, 1.5], 10).unwrap();
        assert_eq!(ranks, vec![10, 0, 5, 3]);
    }

    #[test]
    fn constant_draws_are_degenerate() {
        assert!(draws_to_ranks(&[2.0, 2.0], 5).is_none());
        assert!(draws_to_ranks(&[], 5).is_none());
    }
}
