//! Text rendering of results into a result area.

use std::fmt;
use std::io::Write;

use crate::models::{FrameResult, PredictionResult, TextClassification};

pub const PROCESSING: &str = "Processing...";
pub const PER_FRAME_HEADER: &str = "Per-frame Analysis:";
const ERROR_PREFIX: &str = "An error occurred: ";
const MISSING: &str = "n/a";

/// A region of output whose content is replaced wholesale on every update,
/// like a page element whose inner HTML is reassigned.
pub struct ResultArea<W: Write> {
    lines: Vec<String>,
    out: W,
}

impl<W: Write> ResultArea<W> {
    pub fn new(out: W) -> Self {
        Self {
            lines: Vec::new(),
            out,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn show_processing(&mut self) {
        self.replace(vec![PROCESSING.to_string()]);
    }

    pub fn show_prediction(&mut self, result: &PredictionResult) {
        self.replace(render_prediction(result));
    }

    pub fn show_classification(&mut self, result: &TextClassification) {
        self.replace(vec![format!("Prediction: {}", result.classification)]);
    }

    pub fn show_error(&mut self, message: &str) {
        self.replace(vec![format!("{ERROR_PREFIX}{message}")]);
    }

    fn replace(&mut self, lines: Vec<String>) {
        self.lines = lines;
        for line in &self.lines {
            if let Err(err) = writeln!(self.out, "{line}") {
                log::warn!("Failed to write result line: {err}");
                break;
            }
        }
        let _ = self.out.flush();
    }
}

impl<W: Write> fmt::Display for ResultArea<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Lines for a prediction: the summary fields, then one item per frame when
/// the service sent any.
pub fn render_prediction(result: &PredictionResult) -> Vec<String> {
    let mut lines = vec![
        format!("Prediction: {}", result.prediction),
        format!("Confidence: {}%", result.confidence),
        format!("Total Faces Analyzed: {}", result.total_faces_analyzed),
        format!("Processing Time: {} seconds", result.processing_time),
    ];

    if !result.details.is_empty() {
        lines.push(PER_FRAME_HEADER.to_string());
        lines.extend(result.details.iter().map(render_frame));
    }

    lines
}

/// `  - Frame 30 (Time: 1s): 62.5% confidence`
pub fn render_frame(frame: &FrameResult) -> String {
    format!(
        "  - Frame {} (Time: {}): {}% confidence",
        frame
            .frame_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        time_label(frame.timestamp),
        frame.confidence
    )
}

/// `1.5s`, or `n/a` for frames without a position (still images).
pub(crate) fn time_label(timestamp: Option<f64>) -> String {
    timestamp
        .map(|t| format!("{t}s"))
        .unwrap_or_else(|| MISSING.to_string())
}

/// Blocking notice for input the user has to fix before anything is sent.
pub fn alert(message: impl fmt::Display) {
    eprintln!("{message}");
}
