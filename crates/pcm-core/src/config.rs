//! # Configuration System
//!
//! YAML configuration for the PCM pipeline and the `pcm` front-end:
//!
//! - Pipeline parameters (sampling, quantizer levels, SNR, power, seed)
//! - Logging
//! - Output of plot frames
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `PCM_CONFIG` environment variable
//! 2. `./pcm.yaml` (current directory)
//! 3. `~/.config/pcm/config.yaml` (user config)
//! 4. `/etc/pcm/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! pipeline:
//!   sampling:
//!     frequency_hz: 1.0
//!     cycles: 4.0
//!     samples_per_period: 16
//!   num_levels: 8
//!   snr_db: 10.0
//!   power_db: 0.0
//!   seed: 42
//!
//! logging:
//!   level: info
//!   format: compact
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::eye_diagram;
use crate::noise::NoiseParams;
use crate::observe::LogConfig;
use crate::quantizer::{Quantizer, RoundingMode};
use crate::signal_source::SamplingConfig;
use crate::types::{PcmError, PcmResult};

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<PcmError> for ConfigError {
    fn from(e: PcmError) -> Self {
        ConfigError::ValidationError(e.to_string())
    }
}

/// Every parameter of one waveform run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling: SamplingConfig,
    /// Quantization levels (`2..=MAX_LEVELS`)
    pub num_levels: usize,
    /// Target SNR of the noisy line in dB
    pub snr_db: f64,
    /// Transmit power in dB; sets the sine amplitude and the noise floor
    pub power_db: f64,
    /// Noise seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub rounding: RoundingMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            num_levels: 8,
            snr_db: 10.0,
            power_db: 0.0,
            seed: None,
            rounding: RoundingMode::default(),
        }
    }
}

impl PipelineConfig {
    pub fn noise_params(&self) -> NoiseParams {
        NoiseParams::new(self.power_db, self.snr_db)
    }

    /// Whether the eye diagram built from this run is too short to read.
    pub fn eye_degenerate(&self) -> bool {
        eye_diagram::is_degenerate(self.sampling.cycles, self.sampling.samples_per_period)
    }

    pub fn validate(&self) -> PcmResult<()> {
        self.sampling.validate()?;
        Quantizer::new(self.num_levels)?;
        self.noise_params().validate()
    }
}

/// Where plot frames go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON-lines file for plot frames (`-` = stdout, empty = none)
    pub frames: String,
    /// Print the run summary as JSON instead of text
    pub summary_json: bool,
}

impl OutputConfig {
    pub fn frames_path(&self) -> Option<PathBuf> {
        (!self.frames.is_empty()).then(|| PathBuf::from(&self.frames))
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version
    pub version: String,
    pub pipeline: PipelineConfig,
    pub logging: LogConfig,
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            pipeline: PipelineConfig::default(),
            logging: LogConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the defaults when no file is found. A `PCM_CONFIG` pointing at
    /// a missing file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("PCM_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "PCM_CONFIG points at {}",
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths (excluding `PCM_CONFIG`).
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./pcm.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "pcm") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/pcm/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            pipeline: PipelineConfig {
                seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        };
        let body = serde_yaml::to_string(&config).unwrap_or_default();
        format!(
            "# pcm configuration\n\
             # Search order: $PCM_CONFIG, ./pcm.yaml, user config dir, /etc/pcm/config.yaml\n\
             # rounding: half_away_from_zero | half_even\n\
             # logging.format: json | pretty | compact\n\
             {body}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{LogFormat, LogLevel};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.num_levels, 8);
        assert_eq!(config.pipeline.sampling.samples_per_period, 16);
        assert!(config.pipeline.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
pipeline:
  sampling:
    frequency_hz: 50.0
    cycles: 3
    samples_per_period: 20
  num_levels: 16
  snr_db: 20.0
  seed: 7
  rounding: half_even

logging:
  level: debug
  format: json
"#;

        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.pipeline.sampling.frequency_hz, 50.0);
        assert_eq!(config.pipeline.sampling.cycles, 3.0);
        assert_eq!(config.pipeline.num_levels, 16);
        assert_eq!(config.pipeline.snr_db, 20.0);
        assert_eq!(config.pipeline.seed, Some(7));
        assert_eq!(config.pipeline.rounding, RoundingMode::HalfEven);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
pipeline:
  num_levels: 4
"#;

        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.pipeline.num_levels, 4);
        // Defaults should be applied
        assert_eq!(config.pipeline.sampling, SamplingConfig::default());
        assert_eq!(config.pipeline.power_db, 0.0);
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            AppConfig::parse("pipeline: [1, 2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.pipeline.num_levels = 1;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.pipeline.num_levels = usize::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.pipeline.num_levels = 8;
        config.pipeline.sampling.frequency_hz = -1.0;
        assert!(config.validate().is_err());

        config.pipeline.sampling.frequency_hz = 1.0;
        config.pipeline.sampling.samples_per_period = 0;
        assert!(config.validate().is_err());

        config.pipeline.sampling.samples_per_period = 16;
        config.pipeline.snr_db = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_eye_degenerate() {
        let mut p = PipelineConfig::default();
        assert!(!p.eye_degenerate());
        p.sampling.cycles = 1.5;
        assert!(p.eye_degenerate());
        p.sampling.cycles = 4.0;
        p.sampling.samples_per_period = 3;
        assert!(p.eye_degenerate());
    }

    #[test]
    fn test_example_yaml() {
        let yaml = AppConfig::example_yaml();
        assert!(yaml.contains("pipeline:"));
        assert!(yaml.contains("logging:"));
        let parsed = AppConfig::parse(&yaml).unwrap();
        assert_eq!(parsed.pipeline.seed, Some(42));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("pcm-config-{}.yaml", std::process::id()));
        let mut config = AppConfig::default();
        config.pipeline.snr_db = 3.5;
        config.output.frames = "frames.jsonl".into();
        config.save(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
        assert_eq!(loaded.output.frames_path(), Some(PathBuf::from("frames.jsonl")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load_from(Path::new("/nonexistent/pcm.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
        assert!(err.to_string().starts_with("failed to read config"));
    }

    #[test]
    fn test_config_search_paths() {
        let paths = AppConfig::config_search_paths();
        assert!(paths.len() >= 2);
        assert!(paths[0].ends_with("pcm.yaml"));
        assert_eq!(paths.last().unwrap(), &PathBuf::from("/etc/pcm/config.yaml"));
    }
}
