use std::path::Path;

use crate::preprocess::NormalizedTensor;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier backend error: {0}")]
    Backend(String),
    #[error("Unsupported input: {0}")]
    Input(String),
}

/// A loaded sequence model. Returns one score per action label.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError>;
}

/// Turns a weight artifact on disk into a ready [`Classifier`].
pub trait ClassifierLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>, ClassifierError>;
}
