//! Submission handlers for the upload and text forms.
//!
//! Each handler validates its input before anything touches the network,
//! shows `Processing...`, issues exactly one request and renders whatever
//! comes back. Failures are displayed, never retried.

use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::api::PredictionService;
use crate::chart::{ChartRenderer, ChartSurface};
use crate::view::ResultArea;

/// Input rejected before a request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    NoFileSelected,
    EmptyText,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoFileSelected => write!(f, "Please select a file."),
            ValidationError::EmptyText => write!(f, "Please enter text to predict."),
        }
    }
}

impl std::error::Error for ValidationError {}

/// How a submitted request ended. Both outcomes have already been rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Rendered,
    Failed,
}

/// Uploads `file` to the prediction endpoint and renders the result, then
/// hands the per-frame details to the chart.
pub fn submit_upload<S, W, C>(
    service: &S,
    file: Option<&Path>,
    area: &mut ResultArea<W>,
    chart: &mut ChartRenderer<C>,
) -> Result<Submission, ValidationError>
where
    S: PredictionService + ?Sized,
    W: Write,
    C: ChartSurface,
{
    let file = file.ok_or(ValidationError::NoFileSelected)?;

    area.show_processing();
    match service.predict(file) {
        Ok(result) => {
            area.show_prediction(&result);
            chart.plot(&result.details);
            Ok(Submission::Rendered)
        }
        Err(err) => {
            log::warn!("Prediction request for {} failed: {err}", file.display());
            area.show_error(&err.display_message());
            Ok(Submission::Failed)
        }
    }
}

/// Sends `text` to the text classifier and renders the label.
pub fn submit_text<S, W>(
    service: &S,
    text: &str,
    area: &mut ResultArea<W>,
) -> Result<Submission, ValidationError>
where
    S: PredictionService + ?Sized,
    W: Write,
{
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }

    area.show_processing();
    match service.classify_text(text) {
        Ok(result) => {
            area.show_classification(&result);
            Ok(Submission::Rendered)
        }
        Err(err) => {
            log::warn!("Text classification request failed: {err}");
            area.show_error(&err.display_message());
            Ok(Submission::Failed)
        }
    }
}
