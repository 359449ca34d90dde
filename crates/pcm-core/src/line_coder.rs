//! NRZ Line Coder — symbols to bipolar ±1
//!
//! Maps a symbol stream onto Non-Return-to-Zero bipolar levels by comparing
//! each symbol's ordinal value against a single decision threshold chosen
//! once for the whole stream.
//!
//! ## Threshold selection
//!
//! Let `V` be the *distinct* ordinal values sorted ascending. Repeated
//! levels do not bias the threshold.
//!
//! ```text
//!  |V| even:  threshold = V[|V|/2 - 1]   +1 iff value >  threshold
//!  |V| odd:   threshold = V[|V|/2]       +1 iff value >= threshold
//!
//!  V = {1,2,3,4}: threshold 2 (exclusive)  ->  3 => +1, 2 => -1
//!  V = {1,2,3}:   threshold 2 (inclusive)  ->  2 => +1, 1 => -1
//! ```
//!
//! Symbols may be code words (compared by integer value) or raw quantized
//! levels (compared numerically); both go through [`Ordinal`].
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::line_coder::encode_nrz;
//!
//! let nrz = encode_nrz(&[1u32, 2, 3, 4, 3, 2]);
//! assert_eq!(nrz, vec![-1, -1, 1, 1, 1, -1]);
//! ```

use serde::{Deserialize, Serialize};

use crate::binary_encoder::CodeWord;
use crate::types::{Bipolar, Sample};

/// A symbol that can be ranked on the real line.
pub trait Ordinal {
    fn ordinal(&self) -> f64;
}

impl Ordinal for CodeWord {
    fn ordinal(&self) -> f64 {
        self.value() as f64
    }
}

impl Ordinal for f64 {
    fn ordinal(&self) -> f64 {
        *self
    }
}

impl Ordinal for u32 {
    fn ordinal(&self) -> f64 {
        *self as f64
    }
}

impl Ordinal for i64 {
    fn ordinal(&self) -> f64 {
        *self as f64
    }
}

impl<T: Ordinal> Ordinal for &T {
    fn ordinal(&self) -> f64 {
        (*self).ordinal()
    }
}

/// Median decision threshold with its parity-dependent comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThreshold {
    /// The median distinct value.
    pub value: f64,
    /// `true` when the median itself maps to +1 (odd distinct count).
    pub inclusive: bool,
    /// Number of distinct ordinal values the threshold was chosen from.
    pub distinct: usize,
}

impl DecisionThreshold {
    /// Choose the threshold from a stream of ordinal values.
    ///
    /// Returns `None` for an empty stream.
    pub fn from_ordinals<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut distinct: Vec<f64> = values.into_iter().collect();
        distinct.sort_by(|a, b| a.total_cmp(b));
        // same equality as `decide`: -0.0 and 0.0 are one value
        distinct.dedup_by(|a, b| *a == *b);

        let n = distinct.len();
        if n == 0 {
            return None;
        }
        let (value, inclusive) = if n % 2 == 0 {
            (distinct[n / 2 - 1], false)
        } else {
            (distinct[n / 2], true)
        };
        Some(Self {
            value,
            inclusive,
            distinct: n,
        })
    }

    /// Bipolar decision for one ordinal value.
    #[inline]
    pub fn decide(&self, v: f64) -> Bipolar {
        let high = if self.inclusive {
            v >= self.value
        } else {
            v > self.value
        };
        if high {
            1
        } else {
            -1
        }
    }
}

/// NRZ encoder holding the threshold chosen for the last stream.
#[derive(Debug, Clone, Default)]
pub struct NrzEncoder {
    threshold: Option<DecisionThreshold>,
}

impl NrzEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a full symbol stream. Output length equals input length.
    pub fn encode<T: Ordinal>(&mut self, symbols: &[T]) -> Vec<Bipolar> {
        let Some(threshold) = DecisionThreshold::from_ordinals(symbols.iter().map(|s| s.ordinal()))
        else {
            self.threshold = None;
            return Vec::new();
        };

        tracing::debug!(
            threshold = threshold.value,
            inclusive = threshold.inclusive,
            distinct = threshold.distinct,
            "NRZ decision threshold"
        );

        self.threshold = Some(threshold);
        symbols
            .iter()
            .map(|s| threshold.decide(s.ordinal()))
            .collect()
    }

    /// Threshold used by the most recent [`encode`](Self::encode).
    pub fn threshold(&self) -> Option<DecisionThreshold> {
        self.threshold
    }
}

/// Encode a symbol stream to bipolar NRZ.
pub fn encode_nrz<T: Ordinal>(symbols: &[T]) -> Vec<Bipolar> {
    NrzEncoder::new().encode(symbols)
}

/// Bipolar symbols as real amplitudes (for noise injection and spectra).
pub fn to_f64(line: &[Bipolar]) -> Vec<Sample> {
    line.iter().map(|&s| s as f64).collect()
}

/// Count polarity changes between adjacent symbols.
pub fn transitions(line: &[Bipolar]) -> usize {
    line.windows(2).filter(|w| w[0] != w[1]).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_threshold_exclusive() {
        let t = DecisionThreshold::from_ordinals([1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.value, 2.0);
        assert!(!t.inclusive);
        assert_eq!(t.decide(3.0), 1);
        assert_eq!(t.decide(2.0), -1);
    }

    #[test]
    fn test_odd_threshold_inclusive() {
        let t = DecisionThreshold::from_ordinals([1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.value, 2.0);
        assert!(t.inclusive);
        assert_eq!(t.decide(2.0), 1);
        assert_eq!(t.decide(1.0), -1);
    }

    #[test]
    fn test_distinct_values_only() {
        // Multiset heavily weighted to 0; distinct set {0, 1, 2, 3} still gives threshold 1
        let mut symbols = vec![0u32; 100];
        symbols.extend([1, 2, 3]);
        let mut enc = NrzEncoder::new();
        let nrz = enc.encode(&symbols);
        let t = enc.threshold().unwrap();
        assert_eq!(t.value, 1.0);
        assert_eq!(t.distinct, 4);
        assert_eq!(&nrz[100..], &[-1, 1, 1]);
    }

    #[test]
    fn test_code_words() {
        let words: Vec<CodeWord> = ["00", "01", "10", "11", "10"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(encode_nrz(&words), vec![-1, -1, 1, 1, 1]);
    }

    #[test]
    fn test_levels_and_words_agree() {
        let levels = [-1.0, -1.0 / 3.0, 1.0 / 3.0, 1.0, 1.0 / 3.0];
        let words: Vec<u32> = vec![0, 1, 2, 3, 2];
        assert_eq!(encode_nrz(&levels), encode_nrz(&words));
    }

    #[test]
    fn test_single_distinct_value() {
        // One distinct value: odd, inclusive, everything is +1
        assert_eq!(encode_nrz(&[5u32, 5, 5]), vec![1, 1, 1]);
    }

    #[test]
    fn test_two_distinct_values() {
        assert_eq!(encode_nrz(&[0u32, 1, 1, 0]), vec![-1, 1, 1, -1]);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let t = DecisionThreshold::from_ordinals([-0.0, 0.0, 1.0]).unwrap();
        assert_eq!(t.distinct, 2);
        assert!(!t.inclusive);
        assert_eq!(encode_nrz(&[-0.0, 0.0, 1.0]), encode_nrz(&[0.0, 0.0, 1.0]));
        assert_eq!(encode_nrz(&[-0.0, 0.0, 1.0]), vec![-1, -1, 1]);
    }

    #[test]
    fn test_empty() {
        let mut enc = NrzEncoder::new();
        assert!(enc.encode::<u32>(&[]).is_empty());
        assert!(enc.threshold().is_none());
    }

    #[test]
    fn test_length_preserved() {
        let symbols: Vec<f64> = (0..37).map(|i| (i % 5) as f64).collect();
        let nrz = encode_nrz(&symbols);
        assert_eq!(nrz.len(), symbols.len());
        assert!(nrz.iter().all(|&s| s == 1 || s == -1));
    }

    #[test]
    fn test_helpers() {
        let line: Vec<Bipolar> = vec![1, 1, -1, -1, 1];
        assert_eq!(to_f64(&line), vec![1.0, 1.0, -1.0, -1.0, 1.0]);
        assert_eq!(transitions(&line), 2);
    }
}
