//! Eye Diagram — transition-aligned windows over a line-coded signal
//!
//! Instead of folding the signal at a fixed symbol rate, the windower cuts
//! the bipolar sequence at every polarity transition so that each overlay
//! trace starts just before one transition and ends just after the next.
//! Overlaying the traces at the origin shows the eye.
//!
//! ```text
//!  line:     +1 +1 -1 -1 +1
//!  index:     0  1  2  3  4
//!  boundary:        ^     ^        (transitions at 2 and 4, closing index 4)
//!
//!  windows:  [0, 3)  [1, 5)  [3, 5)
//! ```
//!
//! Each window after the first starts one index before the previous
//! boundary and ends one index past its own boundary (clipped to the
//! sequence). A sequence with fewer than two transitions yields a single
//! window spanning everything.
//!
//! ## Example
//!
//! ```rust
//! use pcm_core::eye_diagram::{eye_windows, EyeWindow};
//!
//! let windows = eye_windows(&[1i8, 1, -1, -1, 1]);
//! assert_eq!(windows[0], EyeWindow::new(0, 3));
//! assert_eq!(windows.last(), Some(&EyeWindow::new(3, 5)));
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Sample;

/// Minimum symbol periods for a meaningful eye diagram.
pub const MIN_PERIODS: f64 = 2.0;

/// Minimum samples per symbol period for a meaningful eye diagram.
pub const MIN_SAMPLES_PER_PERIOD: usize = 4;

/// Half-open index interval `[start, end)` into a line-coded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EyeWindow {
    pub start: usize,
    pub end: usize,
}

impl EyeWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The part of `line` covered by this window, clipped to its length.
    pub fn slice<'a, T>(&self, line: &'a [T]) -> &'a [T] {
        let end = self.end.min(line.len());
        let start = self.start.min(end);
        &line[start..end]
    }
}

/// Compute the transition-aligned windows of `line`.
pub fn eye_windows<T: PartialEq>(line: &[T]) -> Vec<EyeWindow> {
    let n = line.len();
    if n == 0 {
        return Vec::new();
    }

    let mut boundaries: Vec<usize> = line
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1])
        .map(|(i, _)| i + 1)
        .collect();

    if boundaries.len() < 2 {
        return vec![EyeWindow::new(0, n)];
    }
    boundaries.push(n - 1);

    let mut windows = Vec::with_capacity(boundaries.len());
    let mut prev: Option<usize> = None;
    for &b in &boundaries {
        let start = prev.map_or(0, |p| p.saturating_sub(1));
        windows.push(EyeWindow::new(start, (b + 1).min(n)));
        prev = Some(b);
    }
    windows
}

/// Extract one overlay trace per window from `line`.
///
/// `line` may be the clean signal or a noisy copy of the same length.
pub fn eye_traces(line: &[Sample], windows: &[EyeWindow]) -> Vec<Vec<Sample>> {
    windows.iter().map(|w| w.slice(line).to_vec()).collect()
}

/// Whether an eye built from `periods` symbol periods of
/// `samples_per_period` samples is too short to be meaningful.
pub fn is_degenerate(periods: f64, samples_per_period: usize) -> bool {
    periods < MIN_PERIODS || samples_per_period < MIN_SAMPLES_PER_PERIOD
}

/// Overlaid eye traces with envelope and opening metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EyeDiagram {
    traces: Vec<Vec<Sample>>,
}

impl EyeDiagram {
    /// Build from a line and its windows.
    pub fn from_windows(line: &[Sample], windows: &[EyeWindow]) -> Self {
        Self {
            traces: eye_traces(line, windows),
        }
    }

    pub fn traces(&self) -> &[Vec<Sample>] {
        &self.traces
    }

    pub fn num_traces(&self) -> usize {
        self.traces.len()
    }

    /// Length of the longest trace (the overlay's x extent).
    pub fn span(&self) -> usize {
        self.traces.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Min/max envelope at each offset from the origin.
    ///
    /// Traces have different lengths; each offset only sees the traces
    /// that reach it.
    pub fn envelope(&self) -> (Vec<f64>, Vec<f64>) {
        let span = self.span();
        let mut lo = vec![f64::INFINITY; span];
        let mut hi = vec![f64::NEG_INFINITY; span];
        for trace in &self.traces {
            for (i, &v) in trace.iter().enumerate() {
                lo[i] = lo[i].min(v);
                hi[i] = hi[i].max(v);
            }
        }
        (lo, hi)
    }

    /// Largest vertical opening and the offset where it occurs.
    ///
    /// At each offset the opening is the gap between the lowest
    /// non-negative sample and the highest negative one. `None` when no
    /// offset has samples on both sides of zero.
    pub fn vertical_opening(&self) -> Option<(f64, usize)> {
        let mut best: Option<(f64, usize)> = None;
        for offset in 0..self.span() {
            let mut upper = f64::INFINITY;
            let mut lower = f64::NEG_INFINITY;
            for v in self.traces.iter().filter_map(|t| t.get(offset)) {
                if *v >= 0.0 {
                    upper = upper.min(*v);
                } else {
                    lower = lower.max(*v);
                }
            }
            if upper.is_finite() && lower.is_finite() {
                let opening = upper - lower;
                if best.map_or(true, |(b, _)| opening > b) {
                    best = Some((opening, offset));
                }
            }
        }
        best
    }
}
