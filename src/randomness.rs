//! Small wrappers around the shared RNG.
//!
//! All stochastic choices in the engine go through these helpers so that
//! weight handling (zero totals, non-finite weights) is dealt with in one
//! place.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Draws an index proportionally to `weights`. Non-finite or negative
/// weights count as zero; if every weight is zero the draw degrades to
/// uniform. Returns `None` only for an empty slice.
pub fn weighted_choice(weights: &[f64], rng: &mut ChaCha8Rng) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let sanitized: Vec<f64> = weights
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
        .collect();
    match WeightedIndex::new(&sanitized) {
        Ok(dist) => Some(dist.sample(rng)),
        Err(_) => Some(rng.gen_range(0..weights.len())),
    }
}

/// True with probability `p`, clamped into [0, 1].
pub fn coin_flip(p: f64, rng: &mut ChaCha8Rng) -> bool {
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    rng.gen_bool(p)
}
