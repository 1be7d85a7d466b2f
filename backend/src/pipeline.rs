use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use crate::inference::{InferenceError, InferenceService, PredictionResult};
use crate::preprocess::FramePreprocessor;
use crate::video::{FrameSampler, VideoError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Requested {requested} frames, but at most {max} may be sampled")]
    FrameLimit { requested: usize, max: usize },
}

/// Sampler, preprocessor and inference service wired together for one video.
#[derive(Clone)]
pub struct ActionPipeline {
    sampler: FrameSampler,
    preprocessor: FramePreprocessor,
    service: Arc<InferenceService>,
    default_frames: NonZeroUsize,
    max_frames: NonZeroUsize,
}

impl ActionPipeline {
    pub fn new(
        sampler: FrameSampler,
        preprocessor: FramePreprocessor,
        service: Arc<InferenceService>,
        default_frames: NonZeroUsize,
        max_frames: NonZeroUsize,
    ) -> Self {
        Self {
            sampler,
            preprocessor,
            service,
            default_frames,
            max_frames: max_frames.max(default_frames),
        }
    }

    pub fn service(&self) -> &InferenceService {
        &self.service
    }

    pub fn default_frames(&self) -> NonZeroUsize {
        self.default_frames
    }

    pub fn max_frames(&self) -> NonZeroUsize {
        self.max_frames
    }

    /// Resolves a per-request override against the default and the cap.
    pub fn frame_count(&self, requested: Option<NonZeroUsize>) -> Result<NonZeroUsize, PipelineError> {
        let count = requested.unwrap_or(self.default_frames);
        if count > self.max_frames {
            return Err(PipelineError::FrameLimit {
                requested: count.get(),
                max: self.max_frames.get(),
            });
        }
        Ok(count)
    }

    pub fn recognize(&self, video: &Path, num_frames: NonZeroUsize) -> Result<PredictionResult, PipelineError> {
        let num_frames = self.frame_count(Some(num_frames))?;
        if !self.service.is_ready() {
            return Err(InferenceError::NotReady.into());
        }

        let frames = self.sampler.sample(video, num_frames)?;
        let tensor = self.preprocessor.preprocess(&frames);
        log::debug!("Prepared input tensor {:?}", tensor.shape());

        let result = self.service.predict(&tensor)?;
        log::info!(
            "Predicted {} ({:.4}) for {}",
            result.label,
            result.confidence,
            video.display()
        );
        Ok(result)
    }
}
