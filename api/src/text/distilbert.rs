use anyhow::{Context, Result, anyhow};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::distilbert::{self, DistilBertModel};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokenizers::{Tokenizer, TruncationParams};

use super::{TextClassifier, TextLabel, argmax};
use crate::constants::TEXT_MAX_TOKENS;

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Where the classifier's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Directory holding config.json, model.safetensors and tokenizer.json
    Dir(PathBuf),
    /// Hugging Face model repo id
    Hub(String),
}

impl ModelSource {
    fn fetch(&self) -> Result<(PathBuf, PathBuf, PathBuf)> {
        match self {
            ModelSource::Dir(dir) => Ok((
                dir.join(CONFIG_FILE),
                dir.join(WEIGHTS_FILE),
                dir.join(TOKENIZER_FILE),
            )),
            ModelSource::Hub(id) => {
                let api = Api::new()?;
                let repo = api.repo(Repo::new(id.clone(), RepoType::Model));
                Ok((
                    repo.get(CONFIG_FILE)?,
                    repo.get(WEIGHTS_FILE)?,
                    repo.get(TOKENIZER_FILE)?,
                ))
            }
        }
    }
}

/// Head parameters not exposed by the backbone config.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    dim: usize,
    #[serde(default)]
    id2label: HashMap<String, String>,
}

impl HeadConfig {
    fn num_labels(&self) -> usize {
        self.id2label.len().max(2)
    }
}

/// DistilBERT with a sequence classification head
/// (`DistilBertForSequenceClassification` weights).
pub struct DistilBertClassifier {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl DistilBertClassifier {
    pub fn load(source: &ModelSource) -> Result<Self> {
        #[cfg(feature = "metal")]
        let device = Device::new_metal(0).unwrap_or(Device::Cpu);
        #[cfg(not(feature = "metal"))]
        let device = Device::Cpu;

        log::info!("Loading text model from {:?} on {:?}", source, device);
        let (config_path, weights_path, tokenizer_path) = source.fetch()?;

        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: distilbert::Config = serde_json::from_str(&raw_config)?;
        let head: HeadConfig = serde_json::from_str(&raw_config)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow!(e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: TEXT_MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!(e))?;
        tokenizer.with_padding(None);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], distilbert::DTYPE, &device)?
        };
        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = candle_nn::linear(head.dim, head.dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(head.dim, head.num_labels(), vb.pp("classifier"))?;

        log::info!("Text model loaded ({} labels)", head.num_labels());
        Ok(Self {
            model,
            pre_classifier,
            classifier,
            tokenizer,
            device,
        })
    }

    fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| anyhow!(e))?;
        let ids = encoding.get_ids();
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        // Nothing is padded, so no position is masked.
        let mask = Tensor::zeros((1, ids.len()), DType::U8, &self.device)?;

        let hidden = self.model.forward(&input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let logits = self
            .classifier
            .forward(&self.pre_classifier.forward(&cls)?.relu()?)?;
        let probs = candle_nn::ops::softmax(&logits, 1)?;
        Ok(probs.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?)
    }
}

impl TextClassifier for DistilBertClassifier {
    fn classify(&self, text: &str) -> Result<TextLabel> {
        let probs = self.probabilities(text)?;
        let class = argmax(&probs).ok_or_else(|| anyhow!("Classifier returned no scores"))?;
        log::debug!("Text class {class} ({:?})", probs);
        Ok(TextLabel::from_class_index(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_config_defaults_to_binary() {
        let head: HeadConfig = serde_json::from_str(r#"{"dim": 768}"#).unwrap();
        assert_eq!(head.num_labels(), 2);

        let head: HeadConfig = serde_json::from_str(
            r#"{"dim": 768, "id2label": {"0": "human", "1": "ai", "2": "mixed"}}"#,
        )
        .unwrap();
        assert_eq!(head.num_labels(), 3);
    }

    #[test]
    fn dir_source_resolves_files() {
        let (config, weights, tokenizer) = ModelSource::Dir(PathBuf::from("/models/text"))
            .fetch()
            .unwrap();
        assert_eq!(config, PathBuf::from("/models/text/config.json"));
        assert_eq!(weights, PathBuf::from("/models/text/model.safetensors"));
        assert_eq!(tokenizer, PathBuf::from("/models/text/tokenizer.json"));
    }

    #[test]
    fn missing_dir_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DistilBertClassifier::load(&ModelSource::Dir(dir.path().to_path_buf())).is_err());
    }
}
