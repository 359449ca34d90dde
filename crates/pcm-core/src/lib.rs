//! # PCM Core DSP Library
//!
//! Pulse-code modulation for teaching: turn an analog-looking signal or a
//! greyscale image into a digital line code and look at what each step does
//! to the signal and its spectrum.
//!
//! ## Overview
//!
//! - **Quantizer**: uniform quantization over the signal's own range
//! - **Binary Encoder**: fixed-width code word per quantization level
//! - **Line Coder**: bipolar NRZ with a median decision threshold
//! - **Noise Injector**: AWGN at a target SNR
//! - **Eye Windower**: transition-aligned overlay traces
//! - **Spectral Analyzer**: shifted 1-D and log-compressed 2-D spectra
//!
//! ## Signal Flow
//!
//! ```text
//! Sine/Image → Quantize → Encode → NRZ → + AWGN → Eye windows
//!       └─────────┴──────────────────┴───────┴──→ Spectra
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use pcm_core::{run_waveform, GaussianNoise, MemorySink, PipelineConfig};
//!
//! let config = PipelineConfig { num_levels: 8, seed: Some(42), ..Default::default() };
//! let mut noise = GaussianNoise::seeded(42);
//! let report = run_waveform(&config, &mut noise).unwrap();
//!
//! let mut sink = MemorySink::new();
//! report.render(&mut sink).unwrap();
//! ```

pub mod binary_encoder;
pub mod config;
pub mod eye_diagram;
pub mod image_source;
pub mod line_coder;
pub mod noise;
pub mod observe;
pub mod pipeline;
pub mod quantizer;
pub mod render;
pub mod signal_source;
pub mod spectrum;
pub mod types;

// Re-export main types
pub use binary_encoder::{encode_binary, BinaryEncoder, CodeWord};
pub use config::{AppConfig, ConfigError, OutputConfig, PipelineConfig};
pub use eye_diagram::{eye_traces, eye_windows, EyeDiagram, EyeWindow};
pub use image_source::{fetch_with_retry, GrayImage, ImageSource, PgmFileSource};
pub use line_coder::{encode_nrz, DecisionThreshold, NrzEncoder, Ordinal};
pub use noise::{add_noise, GaussianNoise, NoiseParams, NoiseSource, Silent};
pub use pipeline::{run_image, run_signal, run_waveform, run_waveform_seeded, ImageReport, WaveformReport};
pub use quantizer::{quantize, QuantizedSignal, Quantizer, RoundingMode, MAX_LEVELS};
pub use render::{JsonLinesSink, MemorySink, PlotFrame, PlotSink};
pub use signal_source::{SamplingConfig, SineSource, Waveform};
pub use spectrum::{spectrum_1d, spectrum_2d, MagnitudeGrid, Spectrum1d, SpectrumAnalyzer};
pub use types::{Bipolar, PcmError, PcmResult, PipelineError, Sample, Stage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::noise::{GaussianNoise, NoiseSource, Silent};
    pub use crate::pipeline::{run_image, run_waveform};
    pub use crate::render::{PlotFrame, PlotSink};
    pub use crate::types::{PcmError, PcmResult, PipelineError, Sample};
}
