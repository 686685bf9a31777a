//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

/// Per-face entry of a prediction. Position fields are `null` for images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetail {
    pub frame_number: Option<u64>,
    pub timestamp: Option<f64>,
    /// Fake probability in percent, 2 decimals
    pub confidence: f64,
}

/// Body of a successful `/predict`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    /// `Real` or `Fake`
    pub prediction: String,
    pub confidence: f64,
    pub total_faces_analyzed: u64,
    pub processing_time: f64,
    pub details: Vec<FrameDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextClassificationResponse {
    pub classification: String,
}
