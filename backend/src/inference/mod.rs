pub mod classifier;
pub mod service;
#[cfg(feature = "torch")]
pub mod torch;

pub use classifier::{Classifier, ClassifierError, ClassifierLoader};
pub use service::{InferenceError, InferenceService, PredictionResult};
