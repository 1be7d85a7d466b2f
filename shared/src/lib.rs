use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Action classes in the order the network was trained on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
pub enum ActionLabel {
    Walking,
    Running,
    Jumping,
    Boxing,
    Handclapping,
    Handwaving,
    Jogging,
}

impl ActionLabel {
    pub const ALL: [ActionLabel; 7] = [
        ActionLabel::Walking,
        ActionLabel::Running,
        ActionLabel::Jumping,
        ActionLabel::Boxing,
        ActionLabel::Handclapping,
        ActionLabel::Handwaving,
        ActionLabel::Jogging,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Maps a classifier output index to its label, `None` past the end.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn caption(self) -> String {
        format!("A person is {}", self)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub status: String,
    pub action: ActionLabel,
    pub caption: String,
    pub confidence: f64,
}

impl PredictionResponse {
    pub fn complete(action: ActionLabel, confidence: f32) -> Self {
        Self {
            status: "complete".to_string(),
            action,
            caption: action.caption(),
            confidence: round_confidence(confidence),
        }
    }
}

/// Rounds to four decimal places for display.
pub fn round_confidence(confidence: f32) -> f64 {
    (f64::from(confidence) * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            kind: kind.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
}
