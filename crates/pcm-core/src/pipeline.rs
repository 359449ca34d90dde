//! Pipeline — the two runs of the teaching tool
//!
//! ```text
//!  waveform:  SineSource → Quantizer → BinaryEncoder → NRZ ─┬─→ eye (clean)
//!                 │            │                             └─ + AWGN → eye (noisy)
//!                 └────────────┴──────── spectra ──────────────────┘
//!
//!  image:     GrayImage → normalise → Quantizer → BinaryEncoder → NRZ
//!                 └───────────────────────┴──── 2-D spectra
//! ```
//!
//! Each stage runs inside a `tracing` span carrying its [`Stage`] and any
//! failure comes back as a [`PipelineError`] tagged with that stage. Runs
//! return plain reports; plotting is delegated to a [`PlotSink`].

use serde::Serialize;

use crate::binary_encoder::{BinaryEncoder, CodeWord};
use crate::config::PipelineConfig;
use crate::eye_diagram::{self, EyeDiagram, EyeWindow};
use crate::image_source::GrayImage;
use crate::line_coder::{self, DecisionThreshold, NrzEncoder};
use crate::noise::{self, GaussianNoise, NoiseSource};
use crate::quantizer::{self, QuantizedSignal, Quantizer, RoundingMode};
use crate::render::{render_all, PlotFrame, PlotSink};
use crate::signal_source::{SineSource, Waveform};
use crate::spectrum::{MagnitudeGrid, Spectrum1d, SpectrumAnalyzer};
use crate::types::{Bipolar, PcmResult, PipelineError, Sample, SignalStats, Stage, StageExt};

const TIME_LABEL: &str = "Time (s)";
const FREQ_LABEL: &str = "Frequency (Hz)";
const AMPLITUDE_LABEL: &str = "Amplitude";

fn in_stage<T>(stage: Stage, f: impl FnOnce() -> PcmResult<T>) -> Result<T, PipelineError> {
    let span = tracing::debug_span!("stage", stage = stage.name());
    span.in_scope(f).at(stage)
}

/// Magnitude spectra of each waveform-mode signal.
#[derive(Debug, Clone, Serialize)]
pub struct WaveformSpectra {
    pub original: Spectrum1d,
    pub quantized: Spectrum1d,
    pub clean_line: Spectrum1d,
    pub noisy_line: Spectrum1d,
}

/// Everything a waveform run produced.
#[derive(Debug, Clone)]
pub struct WaveformReport {
    pub config: PipelineConfig,
    pub waveform: Waveform,
    pub quantized: QuantizedSignal,
    pub code_words: Vec<CodeWord>,
    pub threshold: Option<DecisionThreshold>,
    pub line: Vec<Bipolar>,
    pub noisy_line: Vec<Sample>,
    pub eye_windows: Vec<EyeWindow>,
    pub clean_eye: EyeDiagram,
    pub noisy_eye: EyeDiagram,
    /// Too few periods or samples per period for a readable eye
    pub eye_degenerate: bool,
    pub spectra: WaveformSpectra,
}

/// Headline numbers of a waveform run.
#[derive(Debug, Clone, Serialize)]
pub struct WaveformSummary {
    pub num_samples: usize,
    pub sampling_rate: f64,
    pub signal: Option<SignalStats>,
    pub num_levels: usize,
    pub bits_per_word: u32,
    pub threshold: Option<f64>,
    pub transitions: usize,
    pub eye_windows: usize,
    pub eye_degenerate: bool,
    pub eye_opening: Option<f64>,
    pub sqnr_db: Option<f64>,
    pub measured_snr_db: Option<f64>,
    pub peak_frequency_hz: f64,
}

impl WaveformReport {
    pub fn bits_per_word(&self) -> u32 {
        self.code_words.first().map_or(0, CodeWord::width)
    }

    pub fn summary(&self) -> WaveformSummary {
        let clean = line_coder::to_f64(&self.line);
        WaveformSummary {
            num_samples: self.waveform.len(),
            sampling_rate: self.waveform.sampling_rate,
            signal: SignalStats::compute(&self.waveform.samples),
            num_levels: self.quantized.num_levels(),
            bits_per_word: self.bits_per_word(),
            threshold: self.threshold.map(|t| t.value),
            transitions: line_coder::transitions(&self.line),
            eye_windows: self.eye_windows.len(),
            eye_degenerate: self.eye_degenerate,
            eye_opening: self.noisy_eye.vertical_opening().map(|(o, _)| o),
            sqnr_db: quantizer::sqnr_db(&self.waveform.samples, &self.quantized.values)
                .ok()
                .filter(|v| v.is_finite()),
            measured_snr_db: noise::measured_snr_db(&clean, &self.noisy_line),
            peak_frequency_hz: self.spectra.original.peak().0.abs(),
        }
    }

    /// Plot panels: signal and spectrum for the original and quantized
    /// signals, the clean and noisy line codes, then both eye diagrams.
    pub fn frames(&self) -> Vec<PlotFrame> {
        let t = &self.waveform.time;
        let spectrum = |title: &str, s: &Spectrum1d| {
            PlotFrame::line(title, FREQ_LABEL, "Magnitude", s.freqs.clone(), s.magnitudes.clone())
        };
        let eye_title = |base: &str| {
            if self.eye_degenerate {
                format!("{base} (degenerate)")
            } else {
                base.to_string()
            }
        };

        vec![
            PlotFrame::line("Original signal", TIME_LABEL, AMPLITUDE_LABEL, t.clone(), self.waveform.samples.clone()),
            spectrum("Spectrum of original signal", &self.spectra.original),
            PlotFrame::step("Quantized signal", TIME_LABEL, "Quantization level", t.clone(), self.quantized.values.clone()),
            spectrum("Spectrum of quantized signal", &self.spectra.quantized),
            PlotFrame::line("Line code", TIME_LABEL, AMPLITUDE_LABEL, t.clone(), line_coder::to_f64(&self.line)),
            PlotFrame::line("Line code with noise", TIME_LABEL, AMPLITUDE_LABEL, t.clone(), self.noisy_line.clone()),
            PlotFrame::Eye {
                title: eye_title("Eye diagram"),
                traces: self.clean_eye.traces().to_vec(),
            },
            PlotFrame::Eye {
                title: eye_title("Eye diagram with noise"),
                traces: self.noisy_eye.traces().to_vec(),
            },
        ]
    }

    pub fn render<S: PlotSink + ?Sized>(&self, sink: &mut S) -> Result<(), PipelineError> {
        in_stage(Stage::Render, || render_all(&self.frames(), sink))
    }
}

/// Generate the configured sine and run it through every stage.
pub fn run_waveform<N: NoiseSource>(
    config: &PipelineConfig,
    noise_source: &mut N,
) -> Result<WaveformReport, PipelineError> {
    let span = tracing::info_span!("run_waveform", levels = config.num_levels, snr_db = config.snr_db);
    let _enter = span.enter();

    let waveform = in_stage(Stage::Source, || {
        SineSource::from_config(&config.sampling, config.power_db)?.generate()
    })?;
    run_signal(waveform, config, noise_source)
}

/// [`run_waveform`] with Gaussian noise seeded from `config.seed`.
pub fn run_waveform_seeded(config: &PipelineConfig) -> Result<WaveformReport, PipelineError> {
    let mut noise = GaussianNoise::from_seed_opt(config.seed);
    run_waveform(config, &mut noise)
}

/// Run an already sampled waveform through quantizer, encoder, line coder,
/// noise, eye windower and spectral analyzer.
///
/// `config.sampling` only decides whether the eye is flagged degenerate.
pub fn run_signal<N: NoiseSource>(
    waveform: Waveform,
    config: &PipelineConfig,
    noise_source: &mut N,
) -> Result<WaveformReport, PipelineError> {
    let quantizer = in_stage(Stage::Quantize, || {
        Ok(Quantizer::new(config.num_levels)?.with_rounding(config.rounding))
    })?;
    let quantized = in_stage(Stage::Quantize, || quantizer.quantize(&waveform.samples))?;

    let code_words = in_stage(Stage::Encode, || {
        BinaryEncoder::new(config.num_levels)?.encode_in_range(&quantized.values, quantized.min, quantized.max)
    })?;

    let mut nrz = NrzEncoder::new();
    let line = in_stage(Stage::LineCode, || Ok(nrz.encode(&code_words)))?;
    let clean_line = line_coder::to_f64(&line);

    let noisy_line = in_stage(Stage::Noise, || {
        noise::add_noise(&clean_line, config.noise_params(), noise_source)
    })?;

    let eye_degenerate = config.eye_degenerate();
    let (eye_windows, clean_eye, noisy_eye) = in_stage(Stage::Eye, || {
        if eye_degenerate {
            tracing::warn!(
                cycles = config.sampling.cycles,
                samples_per_period = config.sampling.samples_per_period,
                min_periods = eye_diagram::MIN_PERIODS,
                min_samples_per_period = eye_diagram::MIN_SAMPLES_PER_PERIOD,
                "eye diagram needs more periods or samples per period"
            );
        }
        let windows = eye_diagram::eye_windows(&line);
        let clean = EyeDiagram::from_windows(&clean_line, &windows);
        let noisy = EyeDiagram::from_windows(&noisy_line, &windows);
        Ok((windows, clean, noisy))
    })?;

    let spectra = in_stage(Stage::Spectrum, || {
        let mut analyzer = SpectrumAnalyzer::new();
        let fs = waveform.sampling_rate;
        Ok(WaveformSpectra {
            original: analyzer.spectrum_1d(&waveform.samples, fs)?,
            quantized: analyzer.spectrum_1d(&quantized.values, fs)?,
            clean_line: analyzer.spectrum_1d(&clean_line, fs)?,
            noisy_line: analyzer.spectrum_1d(&noisy_line, fs)?,
        })
    })?;

    tracing::info!(
        samples = waveform.len(),
        levels = quantized.num_levels(),
        eye_windows = eye_windows.len(),
        eye_degenerate,
        "waveform run complete"
    );

    Ok(WaveformReport {
        config: config.clone(),
        waveform,
        quantized,
        code_words,
        threshold: nrz.threshold(),
        line,
        noisy_line,
        eye_windows,
        clean_eye,
        noisy_eye,
        eye_degenerate,
        spectra,
    })
}

/// Everything an image run produced.
#[derive(Debug, Clone)]
pub struct ImageReport {
    /// The image as fetched, unnormalised
    pub original: GrayImage,
    /// Quantized image, normalised to `[0, 1]`
    pub quantized_image: GrayImage,
    pub quantized: QuantizedSignal,
    pub code_words: Vec<CodeWord>,
    pub line: Vec<Bipolar>,
    pub original_spectrum: MagnitudeGrid,
    pub quantized_spectrum: MagnitudeGrid,
}

impl ImageReport {
    pub fn num_levels(&self) -> usize {
        self.quantized.num_levels()
    }

    pub fn bits_per_word(&self) -> u32 {
        self.code_words.first().map_or(0, CodeWord::width)
    }

    /// The first `n` pixels as `(index, quantized value, code word)`.
    pub fn code_preview(&self, n: usize) -> Vec<(usize, Sample, CodeWord)> {
        self.quantized
            .values
            .iter()
            .zip(&self.code_words)
            .take(n)
            .enumerate()
            .map(|(i, (&v, &w))| (i, v, w))
            .collect()
    }

    pub fn frames(&self) -> Vec<PlotFrame> {
        let raster = |title: String, rows: usize, cols: usize, values: &[f64]| PlotFrame::Image {
            title,
            rows,
            cols,
            values: values.to_vec(),
        };
        let levels = self.num_levels();
        vec![
            raster(
                "Original image".into(),
                self.original.rows(),
                self.original.cols(),
                self.original.pixels(),
            ),
            raster(
                "Spectrum of original image".into(),
                self.original_spectrum.rows,
                self.original_spectrum.cols,
                &self.original_spectrum.values,
            ),
            raster(
                format!("Quantized image ({levels} levels)"),
                self.quantized_image.rows(),
                self.quantized_image.cols(),
                self.quantized_image.pixels(),
            ),
            raster(
                format!("Spectrum of quantized image ({levels} levels)"),
                self.quantized_spectrum.rows,
                self.quantized_spectrum.cols,
                &self.quantized_spectrum.values,
            ),
        ]
    }

    pub fn render<S: PlotSink + ?Sized>(&self, sink: &mut S) -> Result<(), PipelineError> {
        in_stage(Stage::Render, || render_all(&self.frames(), sink))
    }
}

/// Quantize, encode and line-code an image, with spectra before and after.
pub fn run_image(image: &GrayImage, num_levels: usize) -> Result<ImageReport, PipelineError> {
    run_image_with(image, num_levels, RoundingMode::default())
}

/// [`run_image`] with an explicit rounding rule.
pub fn run_image_with(
    image: &GrayImage,
    num_levels: usize,
    rounding: RoundingMode,
) -> Result<ImageReport, PipelineError> {
    let span = tracing::info_span!("run_image", rows = image.rows(), cols = image.cols(), levels = num_levels);
    let _enter = span.enter();

    let (quantized_image, quantized) = in_stage(Stage::Quantize, || {
        Quantizer::new(num_levels)?
            .with_rounding(rounding)
            .quantize_image(image)
    })?;

    let code_words = in_stage(Stage::Encode, || {
        BinaryEncoder::new(num_levels)?.encode_in_range(&quantized.values, quantized.min, quantized.max)
    })?;

    let line = in_stage(Stage::LineCode, || Ok(line_coder::encode_nrz(&code_words)))?;

    let (original_spectrum, quantized_spectrum) = in_stage(Stage::Spectrum, || {
        let mut analyzer = SpectrumAnalyzer::new();
        Ok((analyzer.spectrum_2d(image)?, analyzer.spectrum_2d(&quantized_image)?))
    })?;

    tracing::info!(
        pixels = quantized.values.len(),
        levels = num_levels,
        bits_per_word = code_words.first().map_or(0, CodeWord::width),
        "image run complete"
    );

    Ok(ImageReport {
        original: image.clone(),
        quantized_image,
        quantized,
        code_words,
        line,
        original_spectrum,
        quantized_spectrum,
    })
}
