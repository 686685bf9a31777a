//! Service settings from the environment

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::text::ModelSource;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_FACE_MODEL: &str = "model/seeta_fd_frontal_v1.0.bin";
const DEFAULT_DEEPFAKE_WEIGHTS: &str = "model/xception_deepfake_image.safetensors";
const DEFAULT_TEXT_MODEL_DIR: &str = "model_text";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub face_model: PathBuf,
    pub deepfake_weights: PathBuf,
    pub text_model: ModelSource,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        // A local directory wins over a hub repo.
        let text_model = match (get("TEXT_MODEL_DIR"), get("TEXT_MODEL_REPO")) {
            (Some(dir), _) => ModelSource::Dir(PathBuf::from(dir)),
            (None, Some(repo)) => ModelSource::Hub(repo),
            (None, None) => ModelSource::Dir(PathBuf::from(DEFAULT_TEXT_MODEL_DIR)),
        };

        Ok(Self {
            port,
            face_model: get("FACE_DETECTOR_MODEL")
                .unwrap_or_else(|| DEFAULT_FACE_MODEL.to_string())
                .into(),
            deepfake_weights: get("DEEPFAKE_WEIGHTS")
                .unwrap_or_else(|| DEFAULT_DEEPFAKE_WEIGHTS.to_string())
                .into(),
            text_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.face_model, PathBuf::from(DEFAULT_FACE_MODEL));
        assert_eq!(config.text_model, ModelSource::Dir(PathBuf::from("model_text")));
    }

    #[test]
    fn overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DEEPFAKE_WEIGHTS", "/w/xception.safetensors"),
            ("TEXT_MODEL_REPO", "someone/ai-text-detector"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.deepfake_weights, PathBuf::from("/w/xception.safetensors"));
        assert_eq!(
            config.text_model,
            ModelSource::Hub("someone/ai-text-detector".into())
        );
    }

    #[test]
    fn dir_beats_repo() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TEXT_MODEL_DIR", "/models/text"),
            ("TEXT_MODEL_REPO", "someone/ai-text-detector"),
        ]))
        .unwrap();
        assert_eq!(config.text_model, ModelSource::Dir("/models/text".into()));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
