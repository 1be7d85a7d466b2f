use image::RgbImage;
use std::path::Path;

/// Byte order of the three interleaved channels in a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A single decoded frame in the decoder's native channel order.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl RawFrame {
    /// Wraps an interleaved 8-bit buffer. Returns `None` for a zero-sized
    /// frame or a buffer whose length is not `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        if data.len() != expected {
            return None;
        }
        let pixels = RgbImage::from_raw(width, height, data)?;
        Some(Self { pixels, order })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("Probe failed: {0}")]
    Probe(String),
    #[error("Decode failed: {0}")]
    Frame(String),
}

/// Opens video files for frame-accurate reads.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError>;
}

/// An opened video. Dropping it releases whatever the decoder holds.
pub trait VideoSource {
    fn frame_count(&self) -> usize;

    fn frame_rate(&self) -> f64;

    /// Seeks to `index` and decodes that frame.
    fn read_frame(&mut self, index: usize) -> Result<RawFrame, DecodeError>;
}
