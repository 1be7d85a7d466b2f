#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use action_backend::inference::{Classifier, ClassifierError, ClassifierLoader};
use action_backend::preprocess::NormalizedTensor;
use action_backend::video::{ChannelOrder, DecodeError, RawFrame, VideoDecoder, VideoSource};

pub const JUMPING_SCORES: [f32; 7] = [0.1, 0.05, 0.6, 0.05, 0.05, 0.1, 0.05];

/// Records what the synthetic decoder was asked to do.
#[derive(Default)]
pub struct DecoderCalls {
    pub opened: Mutex<Vec<PathBuf>>,
    pub reads: Mutex<Vec<usize>>,
    pub released: AtomicUsize,
}

impl DecoderCalls {
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> Vec<usize> {
        self.reads.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

/// In-memory decoder. Ignores file contents and serves solid frames whose red
/// channel holds the frame index.
#[derive(Clone)]
pub struct SyntheticDecoder {
    pub frame_count: usize,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub broken_frame: Option<usize>,
    pub fail_open: bool,
    pub calls: Arc<DecoderCalls>,
}

impl SyntheticDecoder {
    pub fn new(frame_count: usize, frame_rate: f64) -> Self {
        Self {
            frame_count,
            frame_rate,
            width: 32,
            height: 24,
            order: ChannelOrder::Bgr,
            broken_frame: None,
            fail_open: false,
            calls: Arc::new(DecoderCalls::default()),
        }
    }

    pub fn with_broken_frame(mut self, index: usize) -> Self {
        self.broken_frame = Some(index);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
        self.calls.opened.lock().unwrap().push(path.to_path_buf());
        if self.fail_open {
            return Err(DecodeError::Probe("moov atom not found".to_string()));
        }
        Ok(Box::new(SyntheticSource {
            decoder: self.clone(),
        }))
    }
}

struct SyntheticSource {
    decoder: SyntheticDecoder,
}

impl VideoSource for SyntheticSource {
    fn frame_count(&self) -> usize {
        self.decoder.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.decoder.frame_rate
    }

    fn read_frame(&mut self, index: usize) -> Result<RawFrame, DecodeError> {
        self.decoder.calls.reads.lock().unwrap().push(index);
        if self.decoder.broken_frame == Some(index) {
            return Err(DecodeError::Frame("truncated packet".to_string()));
        }
        let value = (index % 256) as u8;
        let pixel = match self.decoder.order {
            ChannelOrder::Rgb => [value, 0, 0],
            ChannelOrder::Bgr => [0, 0, value],
        };
        let len = (self.decoder.width * self.decoder.height) as usize;
        let data = pixel.iter().copied().cycle().take(len * 3).collect();
        Ok(RawFrame::from_raw(self.decoder.width, self.decoder.height, self.decoder.order, data).unwrap())
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.decoder.calls.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Classifier that returns the same scores for any input.
pub struct FixedScores {
    pub scores: Vec<f32>,
    pub calls: Arc<AtomicUsize>,
}

impl Classifier for FixedScores {
    fn forward(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

#[derive(Clone)]
pub struct StubLoader {
    pub scores: Vec<f32>,
    pub fail: bool,
    pub loads: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl StubLoader {
    pub fn returning(scores: &[f32]) -> Self {
        Self {
            scores: scores.to_vec(),
            fail: false,
            loads: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(&JUMPING_SCORES)
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ClassifierLoader for StubLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn Classifier>, ClassifierError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClassifierError::Backend("unsupported file format".to_string()));
        }
        Ok(Box::new(FixedScores {
            scores: self.scores.clone(),
            calls: self.calls.clone(),
        }))
    }
}

/// A file on disk removed on drop. Stands in for model weights and uploaded
/// videos.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(suffix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("action-test-{}{}", uuid::Uuid::new_v4(), suffix));
        std::fs::write(&path, b"placeholder").unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn missing_path() -> PathBuf {
    std::env::temp_dir().join(format!("action-test-missing-{}", uuid::Uuid::new_v4()))
}
