use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/service.yaml";

const DEFAULT_NUM_FRAMES: NonZeroUsize = NonZeroUsize::new(5).unwrap();
const DEFAULT_MAX_FRAMES: NonZeroUsize = NonZeroUsize::new(32).unwrap();
const DEFAULT_TARGET_SIDE: NonZeroU32 = NonZeroU32::new(224).unwrap();

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub sampling: SamplingConfig,
    pub model: ModelConfig,
    pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Parent of the per-request upload directories. System temp dir when unset.
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 200 * 1024 * 1024,
            upload_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn upload_root(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Frame count and resize target. Both must match what the loaded network
/// was trained on. `max_frames` caps the per-request override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub num_frames: NonZeroUsize,
    pub max_frames: NonZeroUsize,
    pub target_height: NonZeroU32,
    pub target_width: NonZeroU32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            num_frames: DEFAULT_NUM_FRAMES,
            max_frames: DEFAULT_MAX_FRAMES,
            target_height: DEFAULT_TARGET_SIDE,
            target_width: DEFAULT_TARGET_SIDE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub apply_softmax: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/cnn_lstm_action.pt"),
            apply_softmax: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ServiceConfig {
    /// Reads `ACTION_CONFIG` (or the default path) and applies environment
    /// overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ACTION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&config_str).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(config_str)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_override("PORT", port)?;
        }
        if let Some(frames) = lookup("NUM_FRAMES") {
            self.sampling.num_frames = parse_override("NUM_FRAMES", frames)?;
        }
        if let Some(frames) = lookup("MAX_FRAMES") {
            self.sampling.max_frames = parse_override("MAX_FRAMES", frames)?;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.server.upload_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.decoder.ffmpeg = PathBuf::from(path);
        }
        if let Some(path) = lookup("FFPROBE_PATH") {
            self.decoder.ffprobe = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.num_frames > self.sampling.max_frames {
            return Err(ConfigError::Invalid(format!(
                "sampling.num_frames ({}) exceeds sampling.max_frames ({})",
                self.sampling.num_frames, self.sampling.max_frames
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_trained_network() {
        let config = ServiceConfig::default();
        assert_eq!(config.sampling.num_frames.get(), 5);
        assert_eq!(config.sampling.max_frames.get(), 32);
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling.target_height.get(), 224);
        assert_eq!(config.sampling.target_width.get(), 224);
        assert_eq!(config.model.path, PathBuf::from("models/cnn_lstm_action.pt"));
        assert!(!config.model.apply_softmax);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = ServiceConfig::from_yaml(
            "sampling:\n  num_frames: 8\nmodel:\n  path: /opt/models/action.pt\n",
        )
        .unwrap();
        assert_eq!(config.sampling.num_frames.get(), 8);
        assert_eq!(config.sampling.target_width.get(), 224);
        assert_eq!(config.model.path, PathBuf::from("/opt/models/action.pt"));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn zero_frames_rejected() {
        assert!(ServiceConfig::from_yaml("sampling:\n  num_frames: 0\n").is_err());
        assert!(ServiceConfig::from_yaml("sampling:\n  target_height: 0\n").is_err());
    }

    #[test]
    fn frame_count_above_cap_is_invalid() {
        let config = ServiceConfig::from_yaml("sampling:\n  num_frames: 40\n  max_frames: 16\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn upload_root_defaults_to_temp_dir() {
        let mut config = ServiceConfig::default();
        assert_eq!(config.server.upload_root(), std::env::temp_dir());
        config
            .apply_overrides(|key| (key == "UPLOAD_DIR").then(|| "/srv/uploads".to_string()))
            .unwrap();
        assert_eq!(config.server.upload_root(), PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = ServiceConfig::load_from(Path::new("/nonexistent/service.yaml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [("PORT", "9090"), ("NUM_FRAMES", "12"), ("MODEL_PATH", "m.pt")]
            .into_iter()
            .collect();
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.sampling.num_frames.get(), 12);
        assert_eq!(config.model.path, PathBuf::from("m.pt"));
        assert_eq!(config.bind_address(), "0.0.0.0:9090");
    }

    #[test]
    fn bad_override_reports_key() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_overrides(|key| (key == "NUM_FRAMES").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("NUM_FRAMES"));
    }
}
