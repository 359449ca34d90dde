//! Image Source — greyscale images as 2-D signals
//!
//! Images enter the pipeline as [`GrayImage`]s: row-major intensities with
//! the source's full-scale value, normalised to `[0, 1]` before
//! quantization. Sources sit behind [`ImageSource`] so the pipeline never
//! knows whether pixels came from disk, a network fetch or a test fixture.
//!
//! The bundled decoder reads netpbm greymaps (`P2` ASCII, `P5` binary).
//! [`fetch_with_retry`] wraps any source in a bounded retry loop and
//! surfaces [`PcmError::SourceUnavailable`] once the attempts are spent.
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::image_source::parse_pgm;
//!
//! let pgm = b"P2\n3 1\n255\n0 128 255\n";
//! let img = parse_pgm(pgm).unwrap();
//! assert_eq!((img.rows(), img.cols()), (1, 3));
//! assert_eq!(img.normalized().pixels()[2], 1.0);
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::types::{PcmError, PcmResult, Sample};

/// Attempts made by [`fetch_with_retry`] when no limit is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Row-major greyscale image.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    rows: usize,
    cols: usize,
    pixels: Vec<Sample>,
    max_value: f64,
}

impl GrayImage {
    /// Create an image whose pixels range over `[0, max_value]`.
    pub fn new(rows: usize, cols: usize, pixels: Vec<Sample>, max_value: f64) -> PcmResult<Self> {
        if Some(pixels.len()) != rows.checked_mul(cols) {
            return Err(PcmError::invalid(format!(
                "{} pixels do not fill a {rows}x{cols} image",
                pixels.len()
            )));
        }
        if !(max_value > 0.0) || !max_value.is_finite() {
            return Err(PcmError::invalid(format!("max_value must be positive, got {max_value}")));
        }
        Ok(Self {
            rows,
            cols,
            pixels,
            max_value,
        })
    }

    /// Create an image already normalised to `[0, 1]`.
    pub fn from_normalized(rows: usize, cols: usize, pixels: Vec<Sample>) -> PcmResult<Self> {
        Self::new(rows, cols, pixels, 1.0)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Flattened pixels, row-major.
    pub fn pixels(&self) -> &[Sample] {
        &self.pixels
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Sample> {
        (row < self.rows && col < self.cols).then(|| self.pixels[row * self.cols + col])
    }

    /// Copy with pixels divided by the full-scale value.
    pub fn normalized(&self) -> GrayImage {
        if self.max_value == 1.0 {
            return self.clone();
        }
        GrayImage {
            rows: self.rows,
            cols: self.cols,
            pixels: self.pixels.iter().map(|p| p / self.max_value).collect(),
            max_value: 1.0,
        }
    }

    /// Encode as a binary (`P5`) 8-bit greymap.
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.cols, self.rows).into_bytes();
        out.extend(
            self.pixels
                .iter()
                .map(|p| ((p / self.max_value).clamp(0.0, 1.0) * 255.0).round() as u8),
        );
        out
    }

    /// Write as a binary greymap.
    pub fn save_pgm(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&self.to_pgm())?;
        writer.flush()
    }
}

/// A provider of greyscale images.
pub trait ImageSource {
    /// Fetch one image. May fail transiently.
    fn fetch(&mut self) -> PcmResult<GrayImage>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Reads a netpbm greymap from disk on each fetch.
#[derive(Debug, Clone)]
pub struct PgmFileSource {
    path: PathBuf,
}

impl PgmFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for PgmFileSource {
    fn fetch(&mut self) -> PcmResult<GrayImage> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;
        parse_pgm(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fetch from `source`, retrying up to `max_attempts` times in total.
pub fn fetch_with_retry<S: ImageSource + ?Sized>(source: &mut S, max_attempts: u32) -> PcmResult<GrayImage> {
    if max_attempts == 0 {
        return Err(PcmError::invalid("max_attempts must be >= 1"));
    }

    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        match source.fetch() {
            Ok(image) => {
                tracing::info!(
                    source = %source.describe(),
                    attempt,
                    rows = image.rows(),
                    cols = image.cols(),
                    "image loaded"
                );
                return Ok(image);
            }
            Err(e) => {
                tracing::warn!(source = %source.describe(), attempt, max_attempts, error = %e, "image fetch failed");
                last_error = e.to_string();
            }
        }
    }

    Err(PcmError::SourceUnavailable {
        attempts: max_attempts,
        reason: last_error,
    })
}

/// Decode a `P2` or `P5` greymap.
pub fn parse_pgm(bytes: &[u8]) -> PcmResult<GrayImage> {
    let mut header = HeaderReader { bytes, pos: 0 };

    let magic = header.token()?;
    let binary = match magic {
        b"P5" => true,
        b"P2" => false,
        other => {
            return Err(PcmError::invalid(format!(
                "unsupported image format {:?}, expected P2 or P5",
                String::from_utf8_lossy(other)
            )))
        }
    };
    let cols = header.number()?;
    let rows = header.number()?;
    let max_value = header.number()?;
    if max_value == 0 || max_value > u16::MAX as usize {
        return Err(PcmError::invalid(format!("greymap maxval {max_value} outside 1..=65535")));
    }

    let oversized = || PcmError::invalid(format!("greymap dimensions {cols}x{rows} overflow"));
    let count = rows.checked_mul(cols).ok_or_else(oversized)?;
    let pixels: Vec<f64> = if binary {
        // exactly one whitespace byte separates maxval from the raster
        let raster = bytes.get(header.pos + 1..).unwrap_or_default();
        let wide = max_value > 255;
        let needed = if wide {
            count.checked_mul(2).ok_or_else(oversized)?
        } else {
            count
        };
        if raster.len() < needed {
            return Err(PcmError::invalid(format!(
                "greymap raster truncated: {} of {needed} bytes",
                raster.len()
            )));
        }
        if wide {
            raster[..needed]
                .chunks_exact(2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as f64)
                .collect()
        } else {
            raster[..needed].iter().map(|&b| b as f64).collect()
        }
    } else {
        (0..count)
            .map(|_| header.number().map(|v| v as f64))
            .collect::<PcmResult<_>>()?
    };

    GrayImage::new(rows, cols, pixels, max_value as f64)
}

/// Whitespace/comment-aware tokenizer over a netpbm header.
struct HeaderReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn token(&mut self) -> PcmResult<&'a [u8]> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b'#') => {
                    while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(_) => break,
                None => return Err(PcmError::invalid("greymap header truncated")),
            }
        }
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'#')
        {
            self.pos += 1;
        }
        Ok(&self.bytes[start..self.pos])
    }

    fn number(&mut self) -> PcmResult<usize> {
        let tok = self.token()?;
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PcmError::invalid(format!(
                    "expected a number in greymap, found {:?}",
                    String::from_utf8_lossy(tok)
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        failures_left: u32,
        calls: u32,
    }

    impl ImageSource for Flaky {
        fn fetch(&mut self) -> PcmResult<GrayImage> {
            self.calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(PcmError::Io(io::Error::new(io::ErrorKind::TimedOut, "timed out")));
            }
            GrayImage::from_normalized(1, 2, vec![0.0, 1.0])
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    #[test]
    fn test_parse_p2_with_comment() {
        let pgm = b"P2\n# a comment\n2 2\n15\n0 5\n10 15\n";
        let img = parse_pgm(pgm).unwrap();
        assert_eq!((img.rows(), img.cols()), (2, 2));
        assert_eq!(img.max_value(), 15.0);
        assert_eq!(img.get(1, 0), Some(10.0));
        assert_eq!(img.normalized().pixels(), &[0.0, 5.0 / 15.0, 10.0 / 15.0, 1.0]);
    }

    #[test]
    fn test_parse_p5() {
        let mut pgm = b"P5\n3 2\n255\n".to_vec();
        pgm.extend([0u8, 64, 128, 192, 255, 10]);
        let img = parse_pgm(&pgm).unwrap();
        assert_eq!((img.rows(), img.cols()), (2, 3));
        assert_eq!(img.get(1, 1), Some(255.0));
    }

    #[test]
    fn test_parse_p5_16bit() {
        let mut pgm = b"P5 2 1 1000\n".to_vec();
        pgm.extend([0x03, 0xE8, 0x00, 0x01]);
        let img = parse_pgm(&pgm).unwrap();
        assert_eq!(img.pixels(), &[1000.0, 1.0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pgm(b"P6\n1 1\n255\n").is_err());
        assert!(parse_pgm(b"P5\n4 4\n255\n\x00\x01").is_err());
        assert!(parse_pgm(b"P2\n2 1\n255\n7").is_err());
        assert!(parse_pgm(b"P2\n1 1\n0\n0").is_err());
    }

    #[test]
    fn test_parse_oversized_header() {
        let huge = format!("P5\n{0} {0}\n255\n", 1u64 << 32);
        assert!(matches!(parse_pgm(huge.as_bytes()), Err(PcmError::InvalidParameter(_))));

        let wide = format!("P5\n{} 1\n65535\n", usize::MAX / 2 + 1);
        assert!(matches!(parse_pgm(wide.as_bytes()), Err(PcmError::InvalidParameter(_))));

        // header fits, raster is missing
        assert!(matches!(
            parse_pgm(b"P5\n65536 65536\n255\n"),
            Err(PcmError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_pgm_roundtrip_bytes() {
        let img = GrayImage::new(2, 2, vec![0.0, 85.0, 170.0, 255.0], 255.0).unwrap();
        let parsed = parse_pgm(&img.to_pgm()).unwrap();
        assert_eq!(parsed, img);
    }

    #[test]
    fn test_shape_validation() {
        assert!(GrayImage::new(2, 2, vec![0.0; 3], 1.0).is_err());
        assert!(GrayImage::new(1, 1, vec![0.0], 0.0).is_err());
        assert!(GrayImage::new(usize::MAX, 2, Vec::new(), 1.0).is_err());
    }

    #[test]
    fn test_retry_recovers() {
        let mut src = Flaky { failures_left: 2, calls: 0 };
        let img = fetch_with_retry(&mut src, DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(img.cols(), 2);
        assert_eq!(src.calls, 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut src = Flaky { failures_left: 10, calls: 0 };
        let err = fetch_with_retry(&mut src, 3).unwrap_err();
        assert!(matches!(err, PcmError::SourceUnavailable { attempts: 3, .. }));
        assert_eq!(src.calls, 3);
        assert!(fetch_with_retry(&mut src, 0).is_err());
    }

    #[test]
    fn test_file_source() {
        let path = std::env::temp_dir().join(format!("pcm_core_test_{}.pgm", std::process::id()));
        let img = GrayImage::new(1, 3, vec![0.0, 100.0, 255.0], 255.0).unwrap();
        img.save_pgm(&path).unwrap();
        let mut src = PgmFileSource::new(&path);
        assert_eq!(src.fetch().unwrap(), img);
        std::fs::remove_file(&path).ok();

        let mut missing = PgmFileSource::new("/nonexistent/pcm.pgm");
        assert!(matches!(missing.fetch(), Err(PcmError::Io(_))));
    }
}
