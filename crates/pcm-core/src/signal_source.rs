//! Signal Source — sampled sine waveform
//!
//! Generates the analog test signal fed to the quantizer in waveform mode.
//!
//! ```text
//!   amplitude     = 10^(power_db / 10)
//!   sampling_rate = round(samples_per_period · frequency)
//!   duration      = cycles / frequency
//!   count         = floor(sampling_rate · duration)
//!   t[i]          = i · duration / (count - 1)        i = 0 .. count-1
//!   x[i]          = amplitude · sin(2π · frequency · t[i])
//! ```
//!
//! The time axis includes both endpoints, so the last sample lands exactly
//! on `duration`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::{PcmError, PcmResult, Sample};

/// Sampling parameters of the sine waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Tone frequency in Hz
    pub frequency_hz: f64,
    /// Number of periods to generate
    pub cycles: f64,
    /// Samples per period
    pub samples_per_period: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            cycles: 4.0,
            samples_per_period: 16,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> PcmResult<()> {
        if !(self.frequency_hz > 0.0) || !self.frequency_hz.is_finite() {
            return Err(PcmError::invalid(format!(
                "frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        if !(self.cycles > 0.0) || !self.cycles.is_finite() {
            return Err(PcmError::invalid(format!("cycles must be positive, got {}", self.cycles)));
        }
        if self.samples_per_period == 0 {
            return Err(PcmError::invalid("samples_per_period must be >= 1"));
        }
        Ok(())
    }

    /// Sampling rate in Hz, rounded to a whole number of samples per second.
    pub fn sampling_rate(&self) -> f64 {
        (self.samples_per_period as f64 * self.frequency_hz).round()
    }

    /// Signal duration in seconds.
    pub fn duration(&self) -> f64 {
        self.cycles / self.frequency_hz
    }

    /// Number of samples generated.
    pub fn num_samples(&self) -> usize {
        (self.sampling_rate() * self.duration()).floor() as usize
    }
}

/// A sampled real waveform with its time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub time: Vec<f64>,
    pub samples: Vec<Sample>,
    pub sampling_rate: f64,
}

impl Waveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sine generator configured from [`SamplingConfig`] and a power in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineSource {
    sampling: SamplingConfig,
    amplitude: f64,
}

impl SineSource {
    pub fn from_config(sampling: &SamplingConfig, power_db: f64) -> PcmResult<Self> {
        sampling.validate()?;
        if !power_db.is_finite() {
            return Err(PcmError::invalid(format!("power_db must be finite, got {power_db}")));
        }
        Ok(Self {
            sampling: *sampling,
            amplitude: 10.0f64.powf(power_db / 10.0),
        })
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Generate the waveform. Fails when fewer than two samples result.
    pub fn generate(&self) -> PcmResult<Waveform> {
        let count = self.sampling.num_samples();
        if count < 2 {
            return Err(PcmError::invalid(format!(
                "{} cycles at {} samples/period yield {count} sample(s); need at least 2",
                self.sampling.cycles, self.sampling.samples_per_period
            )));
        }

        let duration = self.sampling.duration();
        let dt = duration / (count - 1) as f64;
        let mut time: Vec<f64> = (0..count).map(|i| i as f64 * dt).collect();
        time[count - 1] = duration;

        let w = 2.0 * PI * self.sampling.frequency_hz;
        let samples = time.iter().map(|&t| self.amplitude * (w * t).sin()).collect();

        tracing::debug!(
            count,
            sampling_rate = self.sampling.sampling_rate(),
            amplitude = self.amplitude,
            "generated sine waveform"
        );

        Ok(Waveform {
            time,
            samples,
            sampling_rate: self.sampling.sampling_rate(),
        })
    }
}
