//! Spectral Analyzer — magnitude spectra for diagnostic plots
//!
//! - 1-D: DFT of a real waveform, shifted so DC sits in the middle and
//!   scaled by `2/N` so a full-scale tone reads as its amplitude.
//! - 2-D: DFT over both image axes, shifted, log-compressed as
//!   `ln(1 + |F|)` to tame the dynamic range for display.
//!
//! ```text
//!  unshifted bins:  0  1  2  3 -4 -3 -2 -1      (N = 8)
//!  shifted bins:   -4 -3 -2 -1  0  1  2  3
//!                               ^ DC at index N/2
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::spectrum::spectrum_1d;
//!
//! let tone: Vec<f64> = (0..64)
//!     .map(|i| (2.0 * std::f64::consts::PI * 4.0 * i as f64 / 64.0).cos())
//!     .collect();
//! let s = spectrum_1d(&tone, 64.0).unwrap();
//! let (f, mag) = s.peak();
//! assert!((f.abs() - 4.0).abs() < 1e-9);
//! assert!((mag - 1.0).abs() < 1e-9);
//! ```

use std::fmt;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::image_source::GrayImage;
use crate::types::{PcmError, PcmResult, Sample};

/// Shifted frequency axis and magnitudes of a 1-D spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum1d {
    /// Frequencies in Hz, ascending, DC at index `N/2`.
    pub freqs: Vec<f64>,
    /// `2/N · |X[k]|`, same order as `freqs`.
    pub magnitudes: Vec<f64>,
    pub sampling_rate: f64,
}

impl Spectrum1d {
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Frequency resolution in Hz.
    pub fn resolution(&self) -> f64 {
        self.sampling_rate / self.freqs.len() as f64
    }

    /// Frequency and magnitude of the strongest bin.
    pub fn peak(&self) -> (f64, f64) {
        let mut best = (0.0, f64::NEG_INFINITY);
        for (&f, &m) in self.freqs.iter().zip(&self.magnitudes) {
            if m > best.1 {
                best = (f, m);
            }
        }
        best
    }
}

/// Log-magnitude grid of a 2-D spectrum, row-major, DC at `(rows/2, cols/2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeGrid {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl MagnitudeGrid {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }
}

/// Move the zero-frequency bin to index `n/2` (negative frequencies first).
pub fn fft_shift<T: Clone>(spectrum: &[T]) -> Vec<T> {
    let mut shifted = spectrum.to_vec();
    shifted.rotate_right(spectrum.len() / 2);
    shifted
}

/// Unshifted DFT sample frequencies for `n` points at `sampling_rate`.
pub fn fft_freqs(n: usize, sampling_rate: f64) -> Vec<f64> {
    let half = n.div_ceil(2);
    (0..n)
        .map(|i| {
            let k = if i < half { i as f64 } else { i as f64 - n as f64 };
            k * sampling_rate / n as f64
        })
        .collect()
}

/// FFT-backed spectrum analyzer; caches plans across calls.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer").finish_non_exhaustive()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// 1-D magnitude spectrum of a real signal.
    pub fn spectrum_1d(&mut self, signal: &[Sample], sampling_rate: f64) -> PcmResult<Spectrum1d> {
        if signal.is_empty() {
            return Err(PcmError::degenerate("cannot take the spectrum of an empty signal"));
        }
        if !(sampling_rate > 0.0) || !sampling_rate.is_finite() {
            return Err(PcmError::invalid(format!(
                "sampling_rate must be positive, got {sampling_rate}"
            )));
        }

        let n = signal.len();
        let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        self.planner.plan_fft_forward(n).process(&mut buffer);

        let scale = 2.0 / n as f64;
        let magnitudes: Vec<f64> = buffer.iter().map(|c| c.norm() * scale).collect();

        Ok(Spectrum1d {
            freqs: fft_shift(&fft_freqs(n, sampling_rate)),
            magnitudes: fft_shift(&magnitudes),
            sampling_rate,
        })
    }

    /// 2-D log-magnitude spectrum of an image.
    pub fn spectrum_2d(&mut self, image: &GrayImage) -> PcmResult<MagnitudeGrid> {
        let (rows, cols) = (image.rows(), image.cols());
        if rows == 0 || cols == 0 {
            return Err(PcmError::degenerate("cannot take the spectrum of an empty image"));
        }

        let mut grid: Vec<Complex64> = image
            .pixels()
            .iter()
            .map(|&p| Complex64::new(p, 0.0))
            .collect();

        let row_fft = self.planner.plan_fft_forward(cols);
        for row in grid.chunks_exact_mut(cols) {
            row_fft.process(row);
        }

        let col_fft = self.planner.plan_fft_forward(rows);
        let mut column = vec![Complex64::new(0.0, 0.0); rows];
        for c in 0..cols {
            for r in 0..rows {
                column[r] = grid[r * cols + c];
            }
            col_fft.process(&mut column);
            for r in 0..rows {
                grid[r * cols + c] = column[r];
            }
        }

        let mut values = vec![0.0; rows * cols];
        for r in 0..rows {
            let sr = (r + rows / 2) % rows;
            for c in 0..cols {
                let sc = (c + cols / 2) % cols;
                values[sr * cols + sc] = grid[r * cols + c].norm().ln_1p();
            }
        }

        Ok(MagnitudeGrid { rows, cols, values })
    }
}

/// 1-D spectrum with a one-off analyzer.
pub fn spectrum_1d(signal: &[Sample], sampling_rate: f64) -> PcmResult<Spectrum1d> {
    SpectrumAnalyzer::new().spectrum_1d(signal, sampling_rate)
}

/// 2-D spectrum with a one-off analyzer.
pub fn spectrum_2d(image: &GrayImage) -> PcmResult<MagnitudeGrid> {
    SpectrumAnalyzer::new().spectrum_2d(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_freqs_layout() {
        assert_eq!(fft_freqs(4, 4.0), vec![0.0, 1.0, -2.0, -1.0]);
        assert_eq!(fft_freqs(5, 5.0), vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_fft_shift() {
        assert_eq!(fft_shift(&[0, 1, 2, 3]), vec![2, 3, 0, 1]);
        assert_eq!(fft_shift(&[0, 1, 2, -2, -1]), vec![-2, -1, 0, 1, 2]);
        assert!(fft_shift::<i32>(&[]).is_empty());
    }

    #[test]
    fn test_shifted_axis_ascending() {
        for n in [7, 8, 33] {
            let s = spectrum_1d(&vec![0.5; n], 100.0).unwrap();
            assert!(s.freqs.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(s.freqs[n / 2], 0.0);
        }
    }

    #[test]
    fn test_tone_amplitude() {
        let n = 128;
        let fs = 128.0;
        let signal: Vec<f64> = (0..n)
            .map(|i| 3.0 * (2.0 * PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let s = spectrum_1d(&signal, fs).unwrap();
        let (f, m) = s.peak();
        assert_relative_eq!(f.abs(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(m, 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.resolution(), 1.0);
    }

    #[test]
    fn test_real_signal_symmetric() {
        let signal: Vec<f64> = (0..8).map(|i| (2.0 * PI * i as f64 / 8.0).sin()).collect();
        let s = spectrum_1d(&signal, 8.0).unwrap();
        assert_eq!(s.len(), 8);
        for k in 1..4 {
            assert_relative_eq!(s.magnitudes[4 + k], s.magnitudes[4 - k], epsilon = 1e-12);
            assert_relative_eq!(s.freqs[4 + k], -s.freqs[4 - k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_1d_errors() {
        assert!(matches!(spectrum_1d(&[], 1.0), Err(PcmError::DegenerateInput(_))));
        assert!(matches!(spectrum_1d(&[1.0], 0.0), Err(PcmError::InvalidParameter(_))));
    }

    #[test]
    fn test_2d_dc_centered() {
        let image = GrayImage::from_normalized(4, 6, vec![0.5; 24]).unwrap();
        let grid = spectrum_2d(&image).unwrap();
        assert_eq!((grid.rows, grid.cols), (4, 6));
        let dc = grid.get(2, 3).unwrap();
        assert_relative_eq!(dc, (0.5f64 * 24.0).ln_1p(), epsilon = 1e-12);
        let others = grid.values.iter().filter(|&&v| v > 1e-9).count();
        assert_eq!(others, 1);
    }

    #[test]
    fn test_2d_horizontal_stripes() {
        // Rows alternate 0/1: energy only in column-0 frequency and row Nyquist
        let rows = 4;
        let cols = 4;
        let pixels: Vec<f64> = (0..rows * cols)
            .map(|i| if (i / cols) % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        let grid = spectrum_2d(&GrayImage::from_normalized(rows, cols, pixels).unwrap()).unwrap();
        for r in 0..rows {
            for c in 0..cols {
                let v = grid.get(r, c).unwrap();
                if c == cols / 2 && (r == rows / 2 || r == 0) {
                    assert!(v > 1.0);
                } else {
                    assert!(v < 1e-9, "unexpected energy at ({r}, {c})");
                }
            }
        }
    }
}
