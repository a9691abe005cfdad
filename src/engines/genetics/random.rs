use crate::error::{ClanTuneError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Source of randomness consumed by the strategies.
///
/// Strategies never own a generator; every call receives one, so tests can
/// script exact draws and concurrent callers can each hold an independent
/// stream. Only the three primitives are required; the weighted helpers are
/// derived from `uniform` unless an implementation has a better sampler.
pub trait RandomSource {
    /// Uniform draw in [0, 1).
    fn uniform(&mut self) -> f64;

    /// Standard normal draw.
    fn gaussian(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn choose_index(&mut self, len: usize) -> usize;

    /// Index drawn with probability proportional to `weights`.
    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize> {
        let total = checked_total(weights)?;
        let target = self.uniform() * total;
        let mut cumulative = 0.0;
        let mut last_live = 0;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_live = i;
            if target < cumulative {
                return Ok(i);
            }
        }
        // Rounding can leave target just above the final cumulative sum
        Ok(last_live)
    }

    /// Two distinct uniform indices in `0..len`, in draw order.
    fn choose_two_distinct(&mut self, len: usize) -> Result<(usize, usize)> {
        if len < 2 {
            return Err(ClanTuneError::InvalidParameter(format!(
                "cannot draw two distinct indices from {} candidates",
                len
            )));
        }
        let first = self.choose_index(len);
        let mut second = self.choose_index(len - 1);
        if second >= first {
            second += 1;
        }
        Ok((first, second))
    }

    /// Two distinct indices drawn by weight, without replacement.
    fn weighted_choose_two(&mut self, weights: &[f64]) -> Result<(usize, usize)> {
        let live = weights.iter().filter(|w| **w > 0.0).count();
        if live < 2 {
            return Err(ClanTuneError::InvalidParameter(format!(
                "weighted draw of two needs two positive weights, found {}",
                live
            )));
        }
        let first = self.weighted_index(weights)?;
        let mut remaining = weights.to_vec();
        remaining[first] = 0.0;
        let second = self.weighted_index(&remaining)?;
        Ok((first, second))
    }
}

fn checked_total(weights: &[f64]) -> Result<f64> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ClanTuneError::InvalidParameter(
            "weights must be finite and non-negative".to_string(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(ClanTuneError::InvalidParameter(
            "weights must contain at least one positive entry".to_string(),
        ));
    }
    Ok(total)
}

/// [`RandomSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn choose_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize> {
        checked_total(weights)?;
        let dist = WeightedIndex::new(weights)
            .map_err(|e| ClanTuneError::InvalidParameter(format!("weighted draw failed: {}", e)))?;
        Ok(dist.sample(&mut self.rng))
    }
}
