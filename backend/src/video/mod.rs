pub mod decoder;
pub mod ffmpeg;
pub mod sampler;

pub use decoder::{ChannelOrder, DecodeError, RawFrame, VideoDecoder, VideoSource};
pub use ffmpeg::FfmpegDecoder;
pub use sampler::{FrameIndexSet, FrameSampler, RawFrameBatch, VideoError};
