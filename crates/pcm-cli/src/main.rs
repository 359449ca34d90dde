//! PCM Teaching Pipeline Command-Line Interface
//!
//! This CLI provides:
//! - `wave`: sine → quantize → binary → NRZ → noise → eye diagrams, with spectra
//! - `image`: greymap → quantize → binary → NRZ, with 2-D spectra
//! - `example-config`: print a starter `pcm.yaml`
//!
//! Plots are emitted as JSON-lines [`PlotFrame`](pcm_core::PlotFrame)
//! records for an external plotter.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pcm_core::config::AppConfig;
use pcm_core::image_source::{fetch_with_retry, PgmFileSource, DEFAULT_MAX_ATTEMPTS};
use pcm_core::observe::{init_logging, LogFormat};
use pcm_core::pipeline::{run_image_with, run_waveform, ImageReport, WaveformReport};
use pcm_core::{GaussianNoise, JsonLinesSink, PlotSink, RoundingMode};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "pcm")]
#[command(author, version, about = "PCM / NRZ line-coding teaching pipeline", long_about = None)]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: search PCM_CONFIG, ./pcm.yaml, user and system dirs)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Json,
    Pretty,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoundingArg {
    HalfAwayFromZero,
    HalfEven,
}

impl From<RoundingArg> for RoundingMode {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::HalfAwayFromZero => RoundingMode::HalfAwayFromZero,
            RoundingArg::HalfEven => RoundingMode::HalfEven,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the waveform pipeline on a generated sine
    Wave {
        /// Tone frequency in Hz
        #[arg(short, long)]
        frequency: Option<f64>,

        /// Number of periods to generate
        #[arg(long)]
        cycles: Option<f64>,

        /// Samples per period
        #[arg(short, long)]
        samples_per_period: Option<usize>,

        /// Quantization levels (>= 2)
        #[arg(short, long)]
        levels: Option<usize>,

        /// Signal-to-noise ratio in dB
        #[arg(long, allow_hyphen_values = true)]
        snr: Option<f64>,

        /// Signal power in dB
        #[arg(long, allow_hyphen_values = true)]
        power: Option<f64>,

        /// Noise seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Tie-breaking rule for the quantizer
        #[arg(long)]
        rounding: Option<RoundingArg>,

        /// Plot frames as JSON lines (`-` for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the image pipeline on a PGM greymap
    Image {
        /// Input greymap (P2 or P5)
        #[arg(short, long)]
        input: PathBuf,

        /// Quantization levels (>= 2)
        #[arg(short, long)]
        levels: Option<usize>,

        /// Load attempts before giving up
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        attempts: u32,

        /// Write the quantized image as a binary PGM
        #[arg(long)]
        save_quantized: Option<PathBuf>,

        /// Number of code words to print
        #[arg(long, default_value = "200")]
        preview: usize,

        /// Plot frames as JSON lines (`-` for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an example configuration file
    ExampleConfig,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_from(p).with_context(|| format!("loading {}", p.display()))?,
        None => AppConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

fn frames_target(flag: Option<PathBuf>, config: &AppConfig) -> Option<PathBuf> {
    flag.or_else(|| config.output.frames_path())
}

fn is_stdout(target: &Option<PathBuf>) -> bool {
    target.as_deref() == Some(Path::new("-"))
}

fn emit_frames(target: Option<&Path>, render: impl FnOnce(&mut dyn PlotSink) -> Result<()>) -> Result<()> {
    match target {
        None => Ok(()),
        Some(p) if p == Path::new("-") => {
            let stdout = io::stdout();
            let mut sink = JsonLinesSink::new(stdout.lock());
            render(&mut sink)
        }
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            let mut sink = JsonLinesSink::new(BufWriter::new(file));
            render(&mut sink)?;
            info!(path = %p.display(), frames = sink.frames_written(), "plot frames written");
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_wave(
    mut config: AppConfig,
    frequency: Option<f64>,
    cycles: Option<f64>,
    samples_per_period: Option<usize>,
    levels: Option<usize>,
    snr: Option<f64>,
    power: Option<f64>,
    seed: Option<u64>,
    rounding: Option<RoundingArg>,
    output: Option<PathBuf>,
) -> Result<()> {
    let p = &mut config.pipeline;
    if let Some(v) = frequency {
        p.sampling.frequency_hz = v;
    }
    if let Some(v) = cycles {
        p.sampling.cycles = v;
    }
    if let Some(v) = samples_per_period {
        p.sampling.samples_per_period = v;
    }
    if let Some(v) = levels {
        p.num_levels = v;
    }
    if let Some(v) = snr {
        p.snr_db = v;
    }
    if let Some(v) = power {
        p.power_db = v;
    }
    if seed.is_some() {
        p.seed = seed;
    }
    if let Some(r) = rounding {
        p.rounding = r.into();
    }
    config.validate().context("invalid pipeline parameters")?;

    let mut noise = GaussianNoise::from_seed_opt(config.pipeline.seed);
    let report = run_waveform(&config.pipeline, &mut noise)?;

    let target = frames_target(output, &config);
    emit_frames(target.as_deref(), |sink| Ok(report.render(sink)?))?;

    let mut out: Box<dyn Write> = if is_stdout(&target) {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    print_wave_summary(&mut out, &report, config.output.summary_json)
}

fn print_wave_summary(out: &mut dyn Write, report: &WaveformReport, as_json: bool) -> Result<()> {
    let summary = report.summary();
    if as_json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }

    let s = &report.config.sampling;
    writeln!(out, "=== PCM Waveform Run ===")?;
    writeln!(
        out,
        "Sine: {:.3} Hz, {} cycles, {} samples/period ({} samples @ {} Hz)",
        s.frequency_hz, s.cycles, s.samples_per_period, summary.num_samples, summary.sampling_rate
    )?;
    if let Some(stats) = &summary.signal {
        writeln!(
            out,
            "Signal: range [{:.4}, {:.4}], average power {:.4}",
            stats.min, stats.max, stats.average_power
        )?;
    }
    writeln!(
        out,
        "Quantizer: {} levels, {} bits per word",
        summary.num_levels, summary.bits_per_word
    )?;
    if let Some(sqnr) = summary.sqnr_db {
        writeln!(out, "SQNR: {:.2} dB", sqnr)?;
    }
    if let Some(t) = report.threshold {
        writeln!(
            out,
            "NRZ threshold: {} ({}), {} transitions",
            t.value,
            if t.inclusive { "inclusive" } else { "exclusive" },
            summary.transitions
        )?;
    }
    match summary.measured_snr_db {
        Some(snr) => writeln!(out, "Noise: target {:.1} dB, measured {:.2} dB", report.config.snr_db, snr)?,
        None => writeln!(out, "Noise: none added")?,
    }
    writeln!(
        out,
        "Eye: {} windows{}",
        summary.eye_windows,
        if summary.eye_degenerate { " (degenerate: need >= 2 periods and >= 4 samples/period)" } else { "" }
    )?;
    if let Some(opening) = summary.eye_opening {
        writeln!(out, "Eye opening (noisy): {:.3}", opening)?;
    }
    Ok(())
}

fn cmd_image(
    config: AppConfig,
    input: PathBuf,
    levels: Option<usize>,
    attempts: u32,
    save_quantized: Option<PathBuf>,
    preview: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let num_levels = levels.unwrap_or(config.pipeline.num_levels);
    if num_levels < 2 {
        bail!("levels must be >= 2, got {}", num_levels);
    }

    let mut source = PgmFileSource::new(&input);
    let image = fetch_with_retry(&mut source, attempts)
        .with_context(|| format!("loading image {}", input.display()))?;
    let report = run_image_with(&image, num_levels, config.pipeline.rounding)?;

    if let Some(path) = &save_quantized {
        report
            .quantized_image
            .save_pgm(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "quantized image saved");
    }

    let target = frames_target(output, &config);
    emit_frames(target.as_deref(), |sink| Ok(report.render(sink)?))?;

    let mut out: Box<dyn Write> = if is_stdout(&target) {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    print_image_summary(&mut out, &report, preview)
}

fn print_image_summary(out: &mut dyn Write, report: &ImageReport, preview: usize) -> Result<()> {
    writeln!(out, "=== PCM Image Run ===")?;
    writeln!(
        out,
        "Image: {}x{}, {} levels, {} bits per sample",
        report.original.cols(),
        report.original.rows(),
        report.num_levels(),
        report.bits_per_word()
    )?;
    writeln!(out, "Total bits: {}", report.code_words.len() as u64 * report.bits_per_word() as u64)?;
    for (i, value, word) in report.code_preview(preview) {
        writeln!(out, "{:>6}  {:.4}  {}", i, value, word)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    if let Some(format) = cli.log_format {
        log_config.format = format.into();
    }
    init_logging(&log_config);

    match cli.command {
        Commands::Wave {
            frequency,
            cycles,
            samples_per_period,
            levels,
            snr,
            power,
            seed,
            rounding,
            output,
        } => cmd_wave(
            config,
            frequency,
            cycles,
            samples_per_period,
            levels,
            snr,
            power,
            seed,
            rounding,
            output,
        ),

        Commands::Image {
            input,
            levels,
            attempts,
            save_quantized,
            preview,
            output,
        } => cmd_image(config, input, levels, attempts, save_quantized, preview, output),

        Commands::ExampleConfig => {
            print!("{}", AppConfig::example_yaml());
            Ok(())
        }
    }
}
