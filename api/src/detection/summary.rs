use std::time::Duration;

use super::FaceScore;
use crate::constants::FAKE_THRESHOLD;
use crate::models::{FrameDetail, PredictionResponse};

pub const LABEL_REAL: &str = "Real";
pub const LABEL_FAKE: &str = "Fake";

/// Rounds half away from zero to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregates face scores into the `/predict` body. The verdict uses the
/// mean probability: `Real` below the threshold, `Fake` otherwise.
pub fn summarize(scores: &[FaceScore], elapsed: Duration) -> PredictionResponse {
    let mean = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| f64::from(s.probability)).sum::<f64>() / scores.len() as f64
    };

    let prediction = if mean < f64::from(FAKE_THRESHOLD) {
        LABEL_REAL
    } else {
        LABEL_FAKE
    };

    PredictionResponse {
        prediction: prediction.to_string(),
        confidence: round2(mean * 100.0),
        total_faces_analyzed: scores.len() as u64,
        processing_time: round2(elapsed.as_secs_f64()),
        details: scores
            .iter()
            .map(|s| FrameDetail {
                frame_number: s.frame_number,
                timestamp: s.timestamp,
                confidence: round2(f64::from(s.probability) * 100.0),
            })
            .collect(),
    }
}
