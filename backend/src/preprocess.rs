use image::imageops::{self, FilterType};
use ndarray::{Array5, ArrayView5};
use std::num::NonZeroU32;

use crate::video::{ChannelOrder, RawFrameBatch};

/// Classifier input of shape `(1, frames, height, width, 3)`, RGB, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array5<f32>,
}

impl NormalizedTensor {
    /// Accepts an array with a single leading batch entry and three trailing
    /// channels.
    pub fn from_array(data: Array5<f32>) -> Option<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[4] != 3 {
            return None;
        }
        Some(Self { data })
    }

    pub fn shape(&self) -> [usize; 5] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3], s[4]]
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn view(&self) -> ArrayView5<'_, f32> {
        self.data.view()
    }

    /// Contiguous row-major values, when the layout allows it.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }
}

#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    target_height: NonZeroU32,
    target_width: NonZeroU32,
    filter: FilterType,
}

impl FramePreprocessor {
    pub fn new(target_height: NonZeroU32, target_width: NonZeroU32) -> Self {
        Self {
            target_height,
            target_width,
            filter: FilterType::Triangle,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_height.get(), self.target_width.get())
    }

    /// Resizes every frame, reorders channels to RGB and scales to `[0, 1]`.
    pub fn preprocess(&self, batch: &RawFrameBatch) -> NormalizedTensor {
        let (height, width) = self.target_size();
        let mut data = Array5::<f32>::zeros((1, batch.len(), height as usize, width as usize, 3));

        for (i, frame) in batch.frames().iter().enumerate() {
            let resized = imageops::resize(frame.pixels(), width, height, self.filter);
            for (x, y, pixel) in resized.enumerate_pixels() {
                let [a, b, c] = pixel.0;
                let rgb = match frame.order() {
                    ChannelOrder::Rgb => [a, b, c],
                    ChannelOrder::Bgr => [c, b, a],
                };
                for (channel, value) in rgb.into_iter().enumerate() {
                    data[[0, i, y as usize, x as usize, channel]] = f32::from(value) / 255.0;
                }
            }
        }

        NormalizedTensor { data }
    }
}
