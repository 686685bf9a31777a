//! AI-generated text detection.

use anyhow::Result;

mod distilbert;

pub use distilbert::{DistilBertClassifier, ModelSource};

/// Verdict for a text snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLabel {
    StudentWritten,
    AiGenerated,
}

impl TextLabel {
    /// Class 0 is human writing; every other class index is AI output.
    pub fn from_class_index(index: usize) -> Self {
        if index == 0 {
            TextLabel::StudentWritten
        } else {
            TextLabel::AiGenerated
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextLabel::StudentWritten => "Student-Written",
            TextLabel::AiGenerated => "AI-Generated",
        }
    }
}

/// Pluggable text classification backend.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<TextLabel>;
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(TextLabel::from_class_index(0).as_str(), "Student-Written");
        assert_eq!(TextLabel::from_class_index(1).as_str(), "AI-Generated");
    }

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.8]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
