//! Rendering collaborator interface
//!
//! The core never draws. Each run produces [`PlotFrame`] records which the
//! caller hands to whatever [`PlotSink`] it injects: an in-memory
//! collector, a JSON-lines stream read by an external plotter, or a GUI.
//!
//! ```text
//!   pipeline ──frames()──▶ [PlotFrame] ──render()──▶ PlotSink
//!                                                     ├─ MemorySink
//!                                                     └─ JsonLinesSink<W>
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::types::{PcmError, PcmResult};

/// One plot panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotFrame {
    /// Continuous line plot (waveforms, spectra).
    Line {
        title: String,
        x_label: String,
        y_label: String,
        x: Vec<f64>,
        y: Vec<f64>,
    },
    /// Staircase plot centred on each sample (quantized signals).
    Step {
        title: String,
        x_label: String,
        y_label: String,
        x: Vec<f64>,
        y: Vec<f64>,
    },
    /// Greyscale raster, row-major.
    Image {
        title: String,
        rows: usize,
        cols: usize,
        values: Vec<f64>,
    },
    /// Overlaid traces sharing an origin.
    Eye { title: String, traces: Vec<Vec<f64>> },
}

impl PlotFrame {
    pub fn title(&self) -> &str {
        match self {
            PlotFrame::Line { title, .. }
            | PlotFrame::Step { title, .. }
            | PlotFrame::Image { title, .. }
            | PlotFrame::Eye { title, .. } => title,
        }
    }

    pub(crate) fn line(title: &str, x_label: &str, y_label: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        PlotFrame::Line {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x,
            y,
        }
    }

    pub(crate) fn step(title: &str, x_label: &str, y_label: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        PlotFrame::Step {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x,
            y,
        }
    }
}

/// Consumer of plot frames.
pub trait PlotSink {
    fn render(&mut self, frame: &PlotFrame) -> PcmResult<()>;

    /// Called once after the last frame of a run.
    fn finish(&mut self) -> PcmResult<()> {
        Ok(())
    }
}

impl<S: PlotSink + ?Sized> PlotSink for &mut S {
    fn render(&mut self, frame: &PlotFrame) -> PcmResult<()> {
        (**self).render(frame)
    }

    fn finish(&mut self) -> PcmResult<()> {
        (**self).finish()
    }
}

/// Collects frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<PlotFrame>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[PlotFrame] {
        &self.frames
    }

    pub fn titles(&self) -> Vec<&str> {
        self.frames.iter().map(PlotFrame::title).collect()
    }
}

impl PlotSink for MemorySink {
    fn render(&mut self, frame: &PlotFrame) -> PcmResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Writes each frame as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    frames_written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PlotSink for JsonLinesSink<W> {
    fn render(&mut self, frame: &PlotFrame) -> PcmResult<()> {
        serde_json::to_writer(&mut self.writer, frame).map_err(|e| PcmError::Render(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> PcmResult<()> {
        self.writer.flush()?;
        tracing::debug!(frames = self.frames_written, "plot stream flushed");
        Ok(())
    }
}

/// Push every frame to `sink`, then finish it.
pub fn render_all<S: PlotSink + ?Sized>(frames: &[PlotFrame], sink: &mut S) -> PcmResult<()> {
    for frame in frames {
        sink.render(frame)?;
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<PlotFrame> {
        vec![
            PlotFrame::line("Original", "t (s)", "amplitude", vec![0.0, 1.0], vec![0.0, 1.0]),
            PlotFrame::Eye {
                title: "Eye".into(),
                traces: vec![vec![1.0, -1.0]],
            },
        ]
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        render_all(&sample_frames(), &mut sink).unwrap();
        assert_eq!(sink.titles(), vec!["Original", "Eye"]);
    }

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        render_all(&sample_frames(), &mut sink).unwrap();
        assert_eq!(sink.frames_written(), 2);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "line");
        assert_eq!(first["title"], "Original");
        let back: PlotFrame = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back, sample_frames()[1]);
    }
}
