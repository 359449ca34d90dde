//! Core types for the PCM teaching pipeline
//!
//! This module defines the sample aliases shared by every stage and the
//! error taxonomy the stages report.
//!
//! ## Signal representations
//!
//! ```text
//!   Sample      f64   time-domain amplitude or normalised pixel in [0, 1]
//!   Bipolar     i8    NRZ symbol, always +1 or -1
//!   CodeWord    -     fixed-width binary word (see binary_encoder)
//! ```
//!
//! Every stage consumes its input by reference and returns freshly owned
//! output, so a later stage never mutates the array an earlier stage
//! produced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A real-valued sample (waveform amplitude or normalised pixel intensity)
pub type Sample = f64;

/// A bipolar NRZ symbol: `+1` or `-1`
pub type Bipolar = i8;

/// Result type for core DSP operations
pub type PcmResult<T> = Result<T, PcmError>;

/// Errors raised by the core stages and their collaborators
#[derive(Debug, thiserror::Error)]
pub enum PcmError {
    /// A parameter is outside its valid domain (e.g. `num_levels < 2`)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input has no dynamic range (or no samples at all)
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// A computed ordinal does not fit the code-word range
    #[error("Encoding overflow: ordinal {ordinal} outside [0, {max}]")]
    EncodingOverflow { ordinal: i64, max: u32 },

    /// The external sample/image source failed after bounded retries
    #[error("Source unavailable after {attempts} attempt(s): {reason}")]
    SourceUnavailable { attempts: u32, reason: String },

    /// The rendering collaborator rejected a frame
    #[error("Render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PcmError {
    /// Shorthand for [`PcmError::InvalidParameter`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        PcmError::InvalidParameter(msg.into())
    }

    /// Shorthand for [`PcmError::DegenerateInput`]
    pub fn degenerate(msg: impl Into<String>) -> Self {
        PcmError::DegenerateInput(msg.into())
    }
}

/// Pipeline stage, used to tag errors and tracing spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Source,
    Quantize,
    Encode,
    LineCode,
    Noise,
    Eye,
    Spectrum,
    Render,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Quantize => "quantize",
            Stage::Encode => "encode",
            Stage::LineCode => "line_code",
            Stage::Noise => "noise",
            Stage::Eye => "eye",
            Stage::Spectrum => "spectrum",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A core error annotated with the stage that raised it.
///
/// Every error is terminal for the current run.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: PcmError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: PcmError) -> Self {
        Self { stage, source }
    }
}

/// Extension for tagging a [`PcmResult`] with its pipeline stage
pub trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageExt<T> for PcmResult<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

/// Summary statistics of a real-valued signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub num_samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub average_power: f64,
}

impl SignalStats {
    /// Compute statistics; `None` for an empty slice.
    pub fn compute(samples: &[Sample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });
        Some(Self {
            num_samples: samples.len(),
            min,
            max,
            mean: samples.iter().sum::<f64>() / n,
            average_power: samples.iter().map(|s| s * s).sum::<f64>() / n,
        })
    }

    /// Dynamic range `max - min`
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}
