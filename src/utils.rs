//! Small numeric helpers shared across the engine.

use rand::Rng;

/// Clamp a permanence value to the valid [0.0, 1.0] range.
///
/// # Examples
///
/// ```
/// use cortical::utils::clamp01;
///
/// assert_eq!(clamp01(1.3), 1.0);
/// assert_eq!(clamp01(-0.2), 0.0);
/// assert_eq!(clamp01(0.5), 0.5);
/// ```
#[inline]
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Generate a random unsigned integer in range [min, max] (inclusive).
///
/// # Examples
///
/// ```
/// use cortical::utils::rand_uint;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let val = rand_uint(10, 20, &mut rng);
/// assert!(val >= 10 && val <= 20);
/// ```
#[inline]
pub fn rand_uint<R: Rng>(min: u32, max: u32, rng: &mut R) -> u32 {
    rng.gen_range(min..=max)
}

/// Ceiling division, used to partition the column index space into
/// near-equal contiguous ranges.
#[inline]
pub fn div_ceil(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}
