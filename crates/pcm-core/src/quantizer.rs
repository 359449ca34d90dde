//! Uniform quantizer over the signal's own dynamic range.
//!
//! Unlike a fixed full-scale ADC model, this quantizer derives its range
//! from the input: `num_levels` reconstruction levels are spread evenly
//! from `min(signal)` to `max(signal)` inclusive, and every sample is
//! snapped to the nearest one.
//!
//! ```text
//!  max ─┬─────────── level n-1
//!       │    ·  ·
//!       ├─────────── level k     p = (x - min) / (max - min)
//!       │  ·      ·              k = round(p · (n - 1))
//!  min ─┴─────────── level 0     x̂ = levels[k]
//! ```
//!
//! Rounding ties (`p · (n-1)` exactly halfway between two integers) are
//! resolved by [`RoundingMode`]; the default rounds half away from zero.
//!
//! # Example
//!
//! ```
//! use pcm_core::quantizer::Quantizer;
//!
//! let q = Quantizer::new(4).unwrap();
//! let out = q.quantize(&[0.0, 0.2, 0.5, 0.9, 1.2]).unwrap();
//! assert_eq!(out.levels.len(), 4);
//! assert!(out.values.iter().all(|v| out.levels.contains(v)));
//! ```

use serde::{Deserialize, Serialize};

use crate::image_source::GrayImage;
use crate::types::{PcmError, PcmResult, Sample};

/// Largest supported level count (24-bit code words).
pub const MAX_LEVELS: usize = 1 << 24;

/// Tie-breaking rule applied to the scaled normalised position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// `2.5 -> 3`, `3.5 -> 4` (positions are never negative, so this is half-up).
    #[default]
    HalfAwayFromZero,
    /// Banker's rounding: `2.5 -> 2`, `3.5 -> 4`.
    HalfEven,
}

impl RoundingMode {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            RoundingMode::HalfAwayFromZero => x.round(),
            RoundingMode::HalfEven => x.round_ties_even(),
        }
    }
}

/// Output of [`Quantizer::quantize`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedSignal {
    /// Quantized samples, same length and order as the input.
    pub values: Vec<Sample>,
    /// The `num_levels` reconstruction levels, ascending, `levels[0] == min`.
    pub levels: Vec<Sample>,
    /// Minimum of the input (first level).
    pub min: Sample,
    /// Maximum of the input (last level).
    pub max: Sample,
}

impl QuantizedSignal {
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Spacing between adjacent levels.
    pub fn step(&self) -> f64 {
        (self.max - self.min) / (self.levels.len() - 1) as f64
    }
}

/// Uniform quantizer with a data-derived range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    num_levels: usize,
    rounding: RoundingMode,
}

impl Quantizer {
    /// Create a quantizer with `num_levels` levels.
    ///
    /// Fails with [`PcmError::InvalidParameter`] when `num_levels` is
    /// outside `2..=MAX_LEVELS`.
    pub fn new(num_levels: usize) -> PcmResult<Self> {
        if num_levels < 2 {
            return Err(PcmError::invalid(format!(
                "num_levels must be >= 2, got {num_levels}"
            )));
        }
        if num_levels > MAX_LEVELS {
            return Err(PcmError::invalid(format!(
                "num_levels must be <= {MAX_LEVELS}, got {num_levels}"
            )));
        }
        Ok(Self {
            num_levels,
            rounding: RoundingMode::default(),
        })
    }

    /// Select the tie-breaking rule.
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// `num_levels` evenly spaced values from `min` to `max`, endpoints exact.
    pub fn levels(&self, min: f64, max: f64) -> Vec<f64> {
        let div = (self.num_levels - 1) as f64;
        let step = (max - min) / div;
        let mut levels: Vec<f64> = (0..self.num_levels)
            .map(|i| min + i as f64 * step)
            .collect();
        levels[self.num_levels - 1] = max;
        levels
    }

    /// Quantize a sample array to the level set spanning its own range.
    ///
    /// Errors:
    /// - [`PcmError::DegenerateInput`] for an empty or constant signal
    /// - [`PcmError::InvalidParameter`] for a non-finite sample, or a range
    ///   `max - min` too wide for `f64`
    pub fn quantize(&self, samples: &[Sample]) -> PcmResult<QuantizedSignal> {
        let (min, max) = finite_range(samples)?;
        if max <= min {
            return Err(PcmError::degenerate(format!(
                "constant signal ({min}) has no dynamic range to quantize"
            )));
        }
        if !(max - min).is_finite() {
            return Err(PcmError::invalid(format!(
                "signal range [{min}, {max}] overflows f64"
            )));
        }

        let levels = self.levels(min, max);
        let values = samples
            .iter()
            .map(|&x| levels[self.index_in(x, min, max)])
            .collect();

        tracing::debug!(
            num_samples = samples.len(),
            num_levels = self.num_levels,
            min,
            max,
            "quantized signal"
        );

        Ok(QuantizedSignal {
            values,
            levels,
            min,
            max,
        })
    }

    /// Quantize an image element-wise, keeping its shape.
    ///
    /// Pixels are normalised to `[0, 1]` first.
    pub fn quantize_image(&self, image: &GrayImage) -> PcmResult<(GrayImage, QuantizedSignal)> {
        let normalized = image.normalized();
        let q = self.quantize(normalized.pixels())?;
        let quantized = GrayImage::from_normalized(normalized.rows(), normalized.cols(), q.values.clone())?;
        Ok((quantized, q))
    }

    /// Level index a value maps to within `[min, max]`, or `None` when the
    /// range is empty or the value is not finite.
    pub fn level_index(&self, value: f64, min: f64, max: f64) -> Option<usize> {
        if !value.is_finite() || max <= min {
            return None;
        }
        Some(self.index_in(value, min, max))
    }

    fn index_in(&self, x: f64, min: f64, max: f64) -> usize {
        let top = (self.num_levels - 1) as f64;
        let p = (x - min) / (max - min);
        self.rounding.apply(p * top).clamp(0.0, top) as usize
    }
}

/// Convenience wrapper: `quantize(samples, num_levels) -> (quantized, levels)`.
pub fn quantize(samples: &[Sample], num_levels: usize) -> PcmResult<(Vec<Sample>, Vec<Sample>)> {
    let q = Quantizer::new(num_levels)?.quantize(samples)?;
    Ok((q.values, q.levels))
}

/// Signal-to-quantization-noise ratio in dB.
///
/// Returns `f64::INFINITY` when the two signals are identical.
pub fn sqnr_db(original: &[Sample], quantized: &[Sample]) -> PcmResult<f64> {
    if original.len() != quantized.len() {
        return Err(PcmError::invalid(format!(
            "length mismatch: {} original vs {} quantized",
            original.len(),
            quantized.len()
        )));
    }
    if original.is_empty() {
        return Err(PcmError::degenerate("empty signal"));
    }
    let n = original.len() as f64;
    let signal_power = original.iter().map(|x| x * x).sum::<f64>() / n;
    let noise_power = original
        .iter()
        .zip(quantized)
        .map(|(o, q)| (o - q) * (o - q))
        .sum::<f64>()
        / n;
    if noise_power == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (signal_power / noise_power).log10())
}

pub(crate) fn finite_range(samples: &[Sample]) -> PcmResult<(f64, f64)> {
    if samples.is_empty() {
        return Err(PcmError::degenerate("empty signal"));
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (i, &x) in samples.iter().enumerate() {
        if !x.is_finite() {
            return Err(PcmError::invalid(format!("non-finite sample {x} at index {i}")));
        }
        min = min.min(x);
        max = max.max(x);
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sine(n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * i as f64 / n as f64).sin()).collect()
    }

    #[test]
    fn test_rejects_too_few_levels() {
        assert!(matches!(Quantizer::new(1), Err(PcmError::InvalidParameter(_))));
        assert!(matches!(Quantizer::new(0), Err(PcmError::InvalidParameter(_))));
        assert!(Quantizer::new(2).is_ok());
    }

    #[test]
    fn test_rejects_too_many_levels() {
        assert!(Quantizer::new(MAX_LEVELS).is_ok());
        assert!(matches!(
            Quantizer::new(MAX_LEVELS + 1),
            Err(PcmError::InvalidParameter(_))
        ));
        assert!(matches!(
            Quantizer::new(usize::MAX),
            Err(PcmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_range_overflow() {
        let q = Quantizer::new(4).unwrap();
        assert!(matches!(
            q.quantize(&[-1e308, 0.0, 1e308]),
            Err(PcmError::InvalidParameter(_))
        ));
        // wide but representable range still quantizes onto its levels
        let out = q.quantize(&[-1e307, 0.0, 1e307]).unwrap();
        assert!(out.values.iter().all(|v| v.is_finite() && out.levels.contains(v)));
    }

    #[test]
    fn test_rejects_constant_and_empty() {
        let q = Quantizer::new(4).unwrap();
        assert!(matches!(q.quantize(&[0.3; 16]), Err(PcmError::DegenerateInput(_))));
        assert!(matches!(q.quantize(&[]), Err(PcmError::DegenerateInput(_))));
    }

    #[test]
    fn test_rejects_nan() {
        let q = Quantizer::new(4).unwrap();
        assert!(matches!(
            q.quantize(&[0.0, f64::NAN, 1.0]),
            Err(PcmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_levels_span_range() {
        let q = Quantizer::new(5).unwrap();
        let levels = q.levels(-1.0, 1.0);
        assert_eq!(levels.len(), 5);
        assert_eq!(levels[0], -1.0);
        assert_eq!(levels[4], 1.0);
        assert_relative_eq!(levels[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_output_subset_of_levels() {
        let q = Quantizer::new(8).unwrap();
        let out = q.quantize(&sine(100)).unwrap();
        for v in &out.values {
            assert!(out.levels.iter().any(|l| (l - v).abs() < 1e-12));
        }
    }

    #[test]
    fn test_endpoints_preserved() {
        let signal = [0.1, 0.35, 0.7, 0.2];
        let out = Quantizer::new(3).unwrap().quantize(&signal).unwrap();
        assert_eq!(out.min, 0.1);
        assert_eq!(out.max, 0.7);
        assert_eq!(out.values[0], 0.1);
        assert_eq!(out.values[2], 0.7);
    }

    #[test]
    fn test_idempotent() {
        for n in [2, 3, 4, 7, 16] {
            let q = Quantizer::new(n).unwrap();
            let once = q.quantize(&sine(64)).unwrap();
            let twice = q.quantize(&once.values).unwrap();
            assert_eq!(once.values, twice.values, "num_levels = {n}");
        }
    }

    #[test]
    fn test_monotonic() {
        let ramp: Vec<f64> = (0..50).map(|i| (i as f64).powf(1.3)).collect();
        let out = Quantizer::new(6).unwrap().quantize(&ramp).unwrap();
        assert!(out.values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_rounding_ties() {
        // 3 levels over [0, 4]: p·2 = 0.5 and 1.5 for x = 1 and x = 3
        let signal = [0.0, 1.0, 3.0, 4.0];
        let away = Quantizer::new(3).unwrap().quantize(&signal).unwrap();
        assert_eq!(away.values, vec![0.0, 2.0, 4.0, 4.0]);

        let even = Quantizer::new(3)
            .unwrap()
            .with_rounding(RoundingMode::HalfEven)
            .quantize(&signal)
            .unwrap();
        assert_eq!(even.values, vec![0.0, 0.0, 4.0, 4.0]);
    }

    #[test]
    fn test_two_levels_is_threshold() {
        let out = Quantizer::new(2).unwrap().quantize(&[-1.0, -0.6, 0.4, 1.0]).unwrap();
        assert_eq!(out.values, vec![-1.0, -1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_level_index() {
        let q = Quantizer::new(4).unwrap();
        assert_eq!(q.level_index(0.0, 0.0, 3.0), Some(0));
        assert_eq!(q.level_index(2.1, 0.0, 3.0), Some(2));
        assert_eq!(q.level_index(3.0, 0.0, 3.0), Some(3));
        assert_eq!(q.level_index(1.0, 1.0, 1.0), None);
    }

    #[test]
    fn test_free_function() {
        let (values, levels) = quantize(&[0.0, 0.5, 1.0], 2).unwrap();
        assert_eq!(levels, vec![0.0, 1.0]);
        assert_eq!(values, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sqnr_grows_with_levels() {
        let signal = sine(1024);
        let coarse = Quantizer::new(4).unwrap().quantize(&signal).unwrap();
        let fine = Quantizer::new(256).unwrap().quantize(&signal).unwrap();
        let s4 = sqnr_db(&signal, &coarse.values).unwrap();
        let s256 = sqnr_db(&signal, &fine.values).unwrap();
        assert!(s256 > s4 + 30.0, "4 levels: {s4:.1} dB, 256 levels: {s256:.1} dB");
        assert_eq!(sqnr_db(&signal, &signal).unwrap(), f64::INFINITY);
    }
}
