//! Seeded latent noise for the mapping network.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Draw a `(rows, cols)` matrix of standard normal samples.
///
/// The generator is reseeded on every call, so the same seed and shape always
/// produce the same values.
#[must_use]
pub fn sample(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.sample(StandardNormal))
}
