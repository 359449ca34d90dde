//! # Observability
//!
//! Structured logging for the pipeline via `tracing`. Each stage runs in a
//! span named after it, so a JSON log line carries the stage that emitted it.
//!
//! ```text
//! run_waveform ─┬─ span "source"     debug: samples
//!               ├─ span "quantize"   debug: levels, range
//!               ├─ span "encode"     debug: bits per word
//!               ├─ span "line_code"  debug: threshold
//!               ├─ span "noise"      debug: std_dev
//!               ├─ span "eye"        warn:  degenerate eye
//!               └─ span "spectrum"
//!                        │
//!                        ▼
//!          tracing-subscriber (json | pretty | compact) → stderr
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
