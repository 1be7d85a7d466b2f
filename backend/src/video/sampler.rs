use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::decoder::{RawFrame, VideoDecoder};

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Cannot open video file {}: {reason}", .path.display())]
    InvalidVideo { path: PathBuf, reason: String },
    #[error(
        "Video too short: has {total} frames, but {required} frames required. Please upload a longer video."
    )]
    TooShort { total: usize, required: usize },
    #[error("Invalid video: cannot determine frame rate (reported {0})")]
    UnreadableFrameRate(f64),
    #[error("Failed to read frame at index {index}: {reason}")]
    FrameRead { index: usize, reason: String },
}

/// Evenly spaced frame positions across a whole video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameIndexSet(Vec<usize>);

impl FrameIndexSet {
    /// Spreads `count` positions over `[0, total_frames - 1]`, truncating
    /// intermediate positions toward zero. The first position is always 0 and,
    /// for more than one position, the last is always `total_frames - 1`.
    pub fn evenly_spaced(total_frames: usize, count: NonZeroUsize) -> Result<Self, VideoError> {
        let count = count.get();
        if total_frames < count {
            return Err(VideoError::TooShort {
                total: total_frames,
                required: count,
            });
        }
        if count == 1 {
            return Ok(Self(vec![0]));
        }

        let last = total_frames - 1;
        let steps = count - 1;
        Ok(Self((0..count).map(|i| i * last / steps).collect()))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decoded frames in temporal order. Only built once every requested frame
/// has been read.
#[derive(Debug, Clone)]
pub struct RawFrameBatch {
    frames: Vec<RawFrame>,
}

impl RawFrameBatch {
    pub(crate) fn new(frames: Vec<RawFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[derive(Clone)]
pub struct FrameSampler {
    decoder: Arc<dyn VideoDecoder>,
}

impl FrameSampler {
    pub fn new(decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { decoder }
    }

    /// Decodes `count` evenly spaced frames from the video at `path`.
    ///
    /// The opened source is dropped before this returns, on success and on
    /// every error path.
    pub fn sample(&self, path: &Path, count: NonZeroUsize) -> Result<RawFrameBatch, VideoError> {
        if !path.is_file() {
            return Err(VideoError::InvalidVideo {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let mut source = self
            .decoder
            .open(path)
            .map_err(|e| VideoError::InvalidVideo {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let total_frames = source.frame_count();
        let frame_rate = source.frame_rate();
        log::debug!(
            "Opened {}: {} frames at {:.3} fps",
            path.display(),
            total_frames,
            frame_rate
        );

        let indices = FrameIndexSet::evenly_spaced(total_frames, count)?;
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(VideoError::UnreadableFrameRate(frame_rate));
        }
        log::debug!("Sampling frame indices {:?}", indices.as_slice());

        let mut frames = Vec::with_capacity(indices.len());
        for &index in indices.as_slice() {
            let frame = source
                .read_frame(index)
                .map_err(|e| VideoError::FrameRead {
                    index,
                    reason: e.to_string(),
                })?;
            frames.push(frame);
        }

        Ok(RawFrameBatch::new(frames))
    }
}
