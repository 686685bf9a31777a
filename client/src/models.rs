//! Response payloads returned by the detection service.
//!
//! These are transient: rendered once and dropped. No client-side mutation.

use serde::{Deserialize, Serialize};

/// Result of the `/predict` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// `Real` or `Fake`
    pub prediction: String,
    /// Average fake probability as a percentage (0-100)
    pub confidence: f64,
    pub total_faces_analyzed: u64,
    /// Server-side wall clock in seconds
    pub processing_time: f64,
    #[serde(default)]
    pub details: Vec<FrameResult>,
}

/// Score for one analyzed face.
///
/// `frame_number` and `timestamp` are only known for video uploads; the
/// service sends `null` for still images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_number: Option<u64>,
    pub timestamp: Option<f64>,
    pub confidence: f64,
}

/// Result of the `/text` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextClassification {
    pub classification: String,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Request payload for `/text`.
#[derive(Debug, Serialize)]
pub struct TextRequest<'a> {
    pub text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_accepts_null_frame_fields() {
        let json = r#"{
            "prediction": "Fake",
            "confidence": 71.25,
            "total_faces_analyzed": 2,
            "processing_time": 0.42,
            "details": [
                {"frame_number": null, "timestamp": null, "confidence": 80.5},
                {"frame_number": 30, "timestamp": 1.0, "confidence": 62.0}
            ]
        }"#;
        let result: PredictionResult = serde_json::from_str(json).expect("parse prediction");
        assert_eq!(result.prediction, "Fake");
        assert_eq!(result.details.len(), 2);
        assert_eq!(result.details[0].frame_number, None);
        assert_eq!(result.details[1].timestamp, Some(1.0));
    }

    #[test]
    fn prediction_without_details_defaults_to_empty() {
        let json = r#"{
            "prediction": "Real",
            "confidence": 3.1,
            "total_faces_analyzed": 1,
            "processing_time": 0.1
        }"#;
        let result: PredictionResult = serde_json::from_str(json).expect("parse prediction");
        assert!(result.details.is_empty());
    }

    #[test]
    fn text_request_serializes_text_field() {
        let json = serde_json::to_string(&TextRequest { text: "hello" }).expect("serialize");
        assert_eq!(json, r#"{"text":"hello"}"#);
    }
}
