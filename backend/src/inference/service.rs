use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use shared::ActionLabel;

use super::classifier::{Classifier, ClassifierError, ClassifierLoader};
use crate::preprocess::NormalizedTensor;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error(
        "Model file '{}' not found. Please ensure the model file is in the models/ directory.",
        .0.display()
    )]
    ModelNotFound(PathBuf),
    #[error("Error loading model: {0}")]
    ModelLoad(#[source] ClassifierError),
    #[error("Model is not loaded")]
    NotReady,
    #[error("Classifier returned {actual} scores for {expected} labels")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Classifier returned an invalid probability {0}")]
    InvalidDistribution(f32),
    #[error("Inference failed: {0}")]
    Classifier(#[source] ClassifierError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub label: ActionLabel,
    pub confidence: f32,
}

/// Owns the classifier. Starts unloaded, becomes ready after one successful
/// [`load`](Self::load) and stays ready for the life of the process.
pub struct InferenceService {
    model_path: PathBuf,
    loader: Box<dyn ClassifierLoader>,
    model: OnceLock<Box<dyn Classifier>>,
    load_lock: Mutex<()>,
}

impl InferenceService {
    pub fn new(model_path: impl Into<PathBuf>, loader: Box<dyn ClassifierLoader>) -> Self {
        Self {
            model_path: model_path.into(),
            loader,
            model: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Loads the model. A second call on a ready service does nothing.
    /// Concurrent callers are serialized so the loader runs at most once
    /// successfully.
    pub fn load(&self) -> Result<(), InferenceError> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.model.get().is_some() {
            log::debug!("Model already loaded from {}", self.model_path.display());
            return Ok(());
        }

        if !self.model_path.is_file() {
            return Err(InferenceError::ModelNotFound(self.model_path.clone()));
        }

        let model = self
            .loader
            .load(&self.model_path)
            .map_err(InferenceError::ModelLoad)?;
        let _ = self.model.set(model);
        log::info!("Model loaded successfully from {}", self.model_path.display());
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn predict(&self, input: &NormalizedTensor) -> Result<PredictionResult, InferenceError> {
        let model = self.model.get().ok_or(InferenceError::NotReady)?;
        let scores = model.forward(input).map_err(InferenceError::Classifier)?;
        select_label(&scores)
    }
}

/// Picks the first highest score and its label. Every score must be a
/// probability in `[0, 1]`.
pub fn select_label(scores: &[f32]) -> Result<PredictionResult, InferenceError> {
    let mismatch = InferenceError::ShapeMismatch {
        expected: ActionLabel::COUNT,
        actual: scores.len(),
    };
    if scores.len() != ActionLabel::COUNT {
        return Err(mismatch);
    }
    if let Some(&bad) = scores.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(InferenceError::InvalidDistribution(bad));
    }

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }

    let confidence = scores[best];
    let label = ActionLabel::from_index(best).ok_or(mismatch)?;
    Ok(PredictionResult { label, confidence })
}
