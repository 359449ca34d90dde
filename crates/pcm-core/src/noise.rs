//! Noise Injector — additive white Gaussian noise at a target SNR
//!
//! The transmit power and SNR are both given in dB. The noise power is
//! their difference and sets the variance of the i.i.d. zero-mean Gaussian
//! samples added to the line-coded signal:
//!
//! ```text
//!   noise_db  = power_db - snr_db
//!   variance  = 10^(noise_db / 10)
//!   y[i]      = x[i] + N(0, variance)
//! ```
//!
//! The random source is injected through [`NoiseSource`], so runs can be
//! seeded ([`GaussianNoise::seeded`]), silenced ([`Silent`]) or replayed
//! from a fixed sequence ([`ReplayNoise`]).
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::noise::{add_noise, GaussianNoise, NoiseParams};
//!
//! let line = vec![1.0, -1.0, -1.0, 1.0];
//! let mut rng = GaussianNoise::seeded(42);
//! let noisy = add_noise(&line, NoiseParams::new(0.0, 20.0), &mut rng).unwrap();
//! assert_eq!(noisy.len(), line.len());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::types::{PcmError, PcmResult, Sample};

/// Transmit power and target SNR, both in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    pub power_db: f64,
    pub snr_db: f64,
}

impl NoiseParams {
    pub fn new(power_db: f64, snr_db: f64) -> Self {
        Self { power_db, snr_db }
    }

    /// Noise power in dB (`power_db - snr_db`).
    pub fn noise_power_db(&self) -> f64 {
        self.power_db - self.snr_db
    }

    /// Linear noise variance.
    pub fn variance(&self) -> f64 {
        10.0f64.powf(self.noise_power_db() / 10.0)
    }

    /// Standard deviation of each noise sample.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn validate(&self) -> PcmResult<()> {
        if !self.power_db.is_finite() || !self.snr_db.is_finite() {
            return Err(PcmError::invalid(format!(
                "power_db ({}) and snr_db ({}) must be finite",
                self.power_db, self.snr_db
            )));
        }
        if !self.std_dev().is_finite() {
            return Err(PcmError::invalid(format!(
                "noise power {} dB overflows",
                self.noise_power_db()
            )));
        }
        Ok(())
    }
}

/// Source of zero-mean Gaussian samples.
pub trait NoiseSource {
    /// Draw one sample with the given standard deviation.
    fn gaussian(&mut self, std_dev: f64) -> f64;
}

impl<N: NoiseSource + ?Sized> NoiseSource for &mut N {
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        (**self).gaussian(std_dev)
    }
}

/// Gaussian noise from a seedable [`StdRng`].
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    rng: StdRng,
}

impl GaussianNoise {
    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, entropy otherwise.
    pub fn from_seed_opt(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl NoiseSource for GaussianNoise {
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * std_dev
    }
}

/// A source that never adds noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl NoiseSource for Silent {
    fn gaussian(&mut self, _std_dev: f64) -> f64 {
        0.0
    }
}

/// Replays a fixed unit-variance sequence (cycled), scaled by `std_dev`.
#[derive(Debug, Clone)]
pub struct ReplayNoise {
    sequence: Vec<f64>,
    pos: usize,
}

impl ReplayNoise {
    pub fn new(sequence: Vec<f64>) -> Self {
        Self { sequence, pos: 0 }
    }
}

impl NoiseSource for ReplayNoise {
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        if self.sequence.is_empty() {
            return 0.0;
        }
        let z = self.sequence[self.pos % self.sequence.len()];
        self.pos += 1;
        z * std_dev
    }
}

/// Add one independent Gaussian sample per element of `line`.
pub fn add_noise<N: NoiseSource>(
    line: &[Sample],
    params: NoiseParams,
    source: &mut N,
) -> PcmResult<Vec<Sample>> {
    params.validate()?;
    let sigma = params.std_dev();

    tracing::debug!(
        num_samples = line.len(),
        noise_power_db = params.noise_power_db(),
        sigma,
        "adding AWGN"
    );

    Ok(line.iter().map(|&x| x + source.gaussian(sigma)).collect())
}

/// Measured SNR in dB of `noisy` against the `clean` reference.
///
/// `None` when lengths differ, the input is empty or no noise is present.
pub fn measured_snr_db(clean: &[Sample], noisy: &[Sample]) -> Option<f64> {
    if clean.len() != noisy.len() || clean.is_empty() {
        return None;
    }
    let n = clean.len() as f64;
    let signal = clean.iter().map(|x| x * x).sum::<f64>() / n;
    let noise = clean
        .iter()
        .zip(noisy)
        .map(|(c, y)| (y - c) * (y - c))
        .sum::<f64>()
        / n;
    (noise > 0.0).then(|| 10.0 * (signal / noise).log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_params() {
        let p = NoiseParams::new(10.0, 20.0);
        assert_relative_eq!(p.noise_power_db(), -10.0);
        assert_relative_eq!(p.variance(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(p.std_dev(), 0.1f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_silent_is_identity() {
        let line = vec![1.0, -1.0, 1.0, 1.0, -1.0];
        for (p, s) in [(0.0, 10.0), (30.0, -5.0), (-20.0, 100.0)] {
            let out = add_noise(&line, NoiseParams::new(p, s), &mut Silent).unwrap();
            assert_eq!(out, line);
        }
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let line = vec![1.0; 64];
        let p = NoiseParams::new(0.0, 5.0);
        let a = add_noise(&line, p, &mut GaussianNoise::seeded(7)).unwrap();
        let b = add_noise(&line, p, &mut GaussianNoise::seeded(7)).unwrap();
        let c = add_noise(&line, p, &mut GaussianNoise::seeded(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_variance_matches_params() {
        let line = vec![0.0; 20_000];
        let p = NoiseParams::new(3.0, 10.0);
        let noisy = add_noise(&line, p, &mut GaussianNoise::seeded(42)).unwrap();
        let mean = noisy.iter().sum::<f64>() / noisy.len() as f64;
        let var = noisy.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / noisy.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean:.4}");
        assert!(
            (var - p.variance()).abs() < 0.1 * p.variance(),
            "variance {var:.4} vs expected {:.4}",
            p.variance()
        );
    }

    #[test]
    fn test_measured_snr() {
        let clean: Vec<f64> = (0..10_000).map(|i| if i % 3 == 0 { 1.0 } else { -1.0 }).collect();
        let noisy = add_noise(&clean, NoiseParams::new(0.0, 10.0), &mut GaussianNoise::seeded(1)).unwrap();
        let snr = measured_snr_db(&clean, &noisy).unwrap();
        assert!((snr - 10.0).abs() < 0.5, "measured {snr:.2} dB");
        assert!(measured_snr_db(&clean, &clean).is_none());
    }

    #[test]
    fn test_replay() {
        let mut src = ReplayNoise::new(vec![1.0, -2.0]);
        let out = add_noise(&[0.0, 0.0, 0.0], NoiseParams::new(0.0, 0.0), &mut src).unwrap();
        assert_eq!(out, vec![1.0, -2.0, 1.0]);
    }

    #[test]
    fn test_rejects_non_finite() {
        let err = add_noise(&[1.0], NoiseParams::new(f64::NAN, 0.0), &mut Silent).unwrap_err();
        assert!(matches!(err, PcmError::InvalidParameter(_)));
        let err = add_noise(&[1.0], NoiseParams::new(1e6, 0.0), &mut Silent).unwrap_err();
        assert!(matches!(err, PcmError::InvalidParameter(_)));
    }
}
