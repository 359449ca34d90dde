//! Binary Encoder — quantized levels to fixed-width code words
//!
//! Each quantized sample is mapped back to its level index in
//! `[0, num_levels - 1]` and rendered as an unsigned binary word of
//! `num_bits = ceil(log2(num_levels))` bits, MSB first, zero-padded.
//!
//! ```text
//!  num_levels = 4  ->  2 bits
//!  level 0 -> "00"   level 1 -> "01"   level 2 -> "10"   level 3 -> "11"
//! ```
//!
//! The level index is recovered with the quantizer's normalisation,
//! `round((x - min) * (num_levels - 1) / (max - min))`. Rounding (rather
//! than truncation) absorbs the last-ulp drift in reconstructed levels.
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::binary_encoder::BinaryEncoder;
//!
//! let enc = BinaryEncoder::new(4).unwrap();
//! let words = enc.encode(&[0.0, 1.0, 2.0, 3.0]).unwrap();
//! let text: Vec<String> = words.iter().map(|w| w.to_string()).collect();
//! assert_eq!(text, ["00", "01", "10", "11"]);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::quantizer::finite_range;
use crate::types::{PcmError, PcmResult, Sample};

/// Number of bits needed to index `num_levels` levels: `ceil(log2(num_levels))`.
pub fn num_bits(num_levels: usize) -> u32 {
    if num_levels <= 1 {
        return 0;
    }
    usize::BITS - (num_levels - 1).leading_zeros()
}

/// A fixed-width unsigned binary word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeWord {
    value: u32,
    width: u32,
}

impl CodeWord {
    /// Create a word; fails when `value` does not fit in `width` bits.
    pub fn new(value: u32, width: u32) -> PcmResult<Self> {
        if width == 0 || width > 32 {
            return Err(PcmError::invalid(format!("code word width {width} outside 1..=32")));
        }
        if width < 32 && value >> width != 0 {
            return Err(PcmError::EncodingOverflow {
                ordinal: value as i64,
                max: ((1u64 << width) - 1) as u32,
            });
        }
        Ok(Self { value, width })
    }

    /// Integer value of the word.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Width in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bits MSB first, each 0 or 1.
    pub fn bits(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.width)
            .rev()
            .map(move |i| ((self.value >> i) & 1) as u8)
    }
}

impl fmt::Display for CodeWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.value, width = self.width as usize)
    }
}

impl FromStr for CodeWord {
    type Err = PcmError;

    /// Parse a binary string such as `"0110"`; the width is the string length.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 32 || !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(PcmError::invalid(format!("not a binary code word: {s:?}")));
        }
        let value = u32::from_str_radix(s, 2)
            .map_err(|e| PcmError::invalid(format!("{s:?}: {e}")))?;
        Self::new(value, s.len() as u32)
    }
}

/// Flatten code words into a bitstream, MSB first per word.
pub fn to_bitstream(words: &[CodeWord]) -> Vec<u8> {
    words.iter().flat_map(|w| w.bits()).collect()
}

/// Encoder from quantized levels to [`CodeWord`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryEncoder {
    num_levels: usize,
    num_bits: u32,
}

impl BinaryEncoder {
    /// Create an encoder for `num_levels` levels (`2..=2^32`).
    pub fn new(num_levels: usize) -> PcmResult<Self> {
        if num_levels < 2 {
            return Err(PcmError::invalid(format!(
                "num_levels must be >= 2, got {num_levels}"
            )));
        }
        if (num_levels - 1) as u64 > u32::MAX as u64 {
            return Err(PcmError::invalid(format!(
                "num_levels {num_levels} exceeds 32-bit code words"
            )));
        }
        Ok(Self {
            num_levels,
            num_bits: num_bits(num_levels),
        })
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Code-word width in bits.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Encode, deriving the level range from the array's own min/max.
    pub fn encode(&self, quantized: &[Sample]) -> PcmResult<Vec<CodeWord>> {
        let (min, max) = finite_range(quantized)?;
        if max <= min {
            return Err(PcmError::degenerate(format!(
                "constant array ({min}) has no level range to encode"
            )));
        }
        self.encode_in_range(quantized, min, max)
    }

    /// Encode against an explicit level range, normally the quantizer's
    /// first and last level.
    ///
    /// A sample outside `[min, max]` yields an ordinal outside the code-word
    /// range and fails with [`PcmError::EncodingOverflow`].
    pub fn encode_in_range(&self, quantized: &[Sample], min: f64, max: f64) -> PcmResult<Vec<CodeWord>> {
        if !(max > min) || !min.is_finite() || !max.is_finite() {
            return Err(PcmError::degenerate(format!("invalid level range [{min}, {max}]")));
        }
        let top = (self.num_levels - 1) as u32;
        let scale = top as f64 / (max - min);

        quantized
            .iter()
            .map(|&x| {
                let ordinal = ((x - min) * scale).round();
                if !(0.0..=top as f64).contains(&ordinal) {
                    return Err(PcmError::EncodingOverflow {
                        ordinal: if ordinal.is_finite() { ordinal as i64 } else { i64::MAX },
                        max: top,
                    });
                }
                Ok(CodeWord {
                    value: ordinal as u32,
                    width: self.num_bits,
                })
            })
            .collect()
    }
}

/// Convenience wrapper: encode with the range derived from `quantized`.
pub fn encode_binary(quantized: &[Sample], num_levels: usize) -> PcmResult<Vec<CodeWord>> {
    BinaryEncoder::new(num_levels)?.encode(quantized)
}
