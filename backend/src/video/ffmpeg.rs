use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::decoder::{ChannelOrder, DecodeError, RawFrame, VideoDecoder, VideoSource};

/// Decoder backed by the system `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub frame_rate: f64,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn probe(&self, path: &Path) -> Result<StreamInfo, DecodeError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-count_packets", "-show_entries"])
            .arg("stream=width,height,nb_frames,nb_read_packets,avg_frame_rate,r_frame_rate")
            .args(["-of", "json"])
            .arg(path)
            .output()
            .map_err(|source| DecodeError::Spawn {
                tool: self.ffprobe.display().to_string(),
                source,
            })?;
        check_status(&output, DecodeError::Probe)?;
        parse_probe(&output.stdout)
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
        let info = self.probe(path)?;
        Ok(Box::new(FfmpegSource {
            ffmpeg: self.ffmpeg.clone(),
            path: path.to_path_buf(),
            info,
        }))
    }
}

struct FfmpegSource {
    ffmpeg: PathBuf,
    path: PathBuf,
    info: StreamInfo,
}

impl VideoSource for FfmpegSource {
    fn frame_count(&self) -> usize {
        self.info.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn read_frame(&mut self, index: usize) -> Result<RawFrame, DecodeError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-noautorotate", "-i"])
            .arg(&self.path)
            .arg("-vf")
            .arg(format!("select=eq(n\\,{index})"))
            .args(["-fps_mode", "passthrough", "-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .output()
            .map_err(|source| DecodeError::Spawn {
                tool: self.ffmpeg.display().to_string(),
                source,
            })?;
        check_status(&output, DecodeError::Frame)?;

        let got = output.stdout.len();
        RawFrame::from_raw(self.info.width, self.info.height, ChannelOrder::Rgb, output.stdout).ok_or_else(|| {
            DecodeError::Frame(format!(
                "expected a {}x{} rgb24 frame, got {} bytes",
                self.info.width, self.info.height, got
            ))
        })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        log::debug!("Released video source {}", self.path.display());
    }
}

fn check_status(output: &Output, err: fn(String) -> DecodeError) -> Result<(), DecodeError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(err(format!("{} ({})", stderr.trim(), output.status)))
}

pub fn parse_probe(stdout: &[u8]) -> Result<StreamInfo, DecodeError> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| DecodeError::Probe(format!("unreadable ffprobe output: {e}")))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::Probe("no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::Probe("missing frame dimensions".to_string())),
    };

    let frame_count = [stream.nb_frames, stream.nb_read_packets]
        .into_iter()
        .flatten()
        .find_map(|count| count.trim().parse::<usize>().ok().filter(|&c| c > 0))
        .unwrap_or(0);

    let frame_rate = [stream.avg_frame_rate, stream.r_frame_rate]
        .into_iter()
        .flatten()
        .map(|rate| parse_rate(&rate))
        .find(|&rate| rate > 0.0)
        .unwrap_or(0.0);

    Ok(StreamInfo {
        width,
        height,
        frame_count,
        frame_rate,
    })
}

/// Parses ffprobe rationals like `30000/1001`. Undefined rates read as 0.
pub fn parse_rate(rate: &str) -> f64 {
    let parsed = match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => num / den,
            _ => 0.0,
        },
        None => rate.trim().parse().unwrap_or(0.0),
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_rates() {
        assert_eq!(parse_rate("30/1"), 30.0);
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("25"), 25.0);
        assert_eq!(parse_rate("garbage"), 0.0);
    }

    #[test]
    fn stream_info_prefers_container_frame_count() {
        let json = br#"{"streams":[{"width":320,"height":240,"nb_frames":"30","nb_read_packets":"31","avg_frame_rate":"30/1","r_frame_rate":"30/1"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(
            info,
            StreamInfo {
                width: 320,
                height: 240,
                frame_count: 30,
                frame_rate: 30.0
            }
        );
    }

    #[test]
    fn stream_info_falls_back_to_packet_count_and_real_rate() {
        let json = br#"{"streams":[{"width":64,"height":48,"nb_read_packets":"90","avg_frame_rate":"0/0","r_frame_rate":"25/1"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.frame_count, 90);
        assert_eq!(info.frame_rate, 25.0);
    }

    #[test]
    fn missing_video_stream_fails() {
        assert!(matches!(parse_probe(br#"{"streams":[]}"#), Err(DecodeError::Probe(_))));
        assert!(matches!(parse_probe(b"not json"), Err(DecodeError::Probe(_))));
    }

    #[test]
    fn missing_rate_reports_zero() {
        let json = br#"{"streams":[{"width":64,"height":48,"nb_frames":"10","avg_frame_rate":"0/0","r_frame_rate":"0/0"}]}"#;
        assert_eq!(parse_probe(json).unwrap().frame_rate, 0.0);
    }
}
