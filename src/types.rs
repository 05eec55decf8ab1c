// Strong typing over strings. Newtypes for wall-clock millis, session ids, and frame sequence numbers.
// See DESIGN.md: Types & Configuration

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Wall-clock timestamp in milliseconds since the Unix epoch (`Date.now()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Millis(u64);

impl Millis {
    pub fn from_millis(ms: u64) -> Self {
        Millis(ms)
    }

    /// Convert a JS `Date.now()` value. Negative and non-finite inputs clamp to zero.
    pub fn from_js(ms: f64) -> Self {
        if ms.is_finite() && ms > 0.0 {
            Millis(ms.floor() as u64)
        } else {
            Millis(0)
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`; zero if the clock stepped backwards.
    pub fn since(&self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn plus(&self, ms: u64) -> Millis {
        Millis(self.0.saturating_add(ms))
    }

    pub fn minus(&self, ms: u64) -> Millis {
        Millis(self.0.saturating_sub(ms))
    }
}

/// Server-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub fn new(id: i64) -> Self {
        SessionId(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number stamped on each frame request of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FrameSeq(u64);

impl FrameSeq {
    pub fn new(seq: u64) -> Self {
        FrameSeq(seq)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> FrameSeq {
        FrameSeq(self.0 + 1)
    }
}

/// Classifier-derived attention state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FocusState {
    #[default]
    Unknown,
    Focused,
    Unfocused,
}

impl FocusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusState::Unknown => "unknown",
            FocusState::Focused => "focused",
            FocusState::Unfocused => "unfocused",
        }
    }

    /// Status line shown under the video.
    pub fn status_text(&self) -> String {
        format!("Focus state: {}", self.as_str())
    }
}

/// How an alert is delivered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// Visual notice (`window.alert`).
    #[default]
    Popup,
    /// Audible cue.
    Sound,
    Both,
}

impl AlertMode {
    /// Parse the wire value. Unrecognized modes fall back to `Popup`.
    pub fn parse(value: &str) -> AlertMode {
        match value.trim().to_ascii_lowercase().as_str() {
            "sound" => AlertMode::Sound,
            "both" => AlertMode::Both,
            _ => AlertMode::Popup,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Popup => "popup",
            AlertMode::Sound => "sound",
            AlertMode::Both => "both",
        }
    }

    pub fn shows_notice(&self) -> bool {
        matches!(self, AlertMode::Popup | AlertMode::Both)
    }

    pub fn plays_sound(&self) -> bool {
        matches!(self, AlertMode::Sound | AlertMode::Both)
    }
}

pub const ALERT_MESSAGE: &str = "You looked away longer than your alert threshold.";

/// Engine configuration passed from JS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capture/classify cadence.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u32,
    #[serde(default = "default_countdown_interval")]
    pub countdown_interval_ms: u32,
    /// Used when the start-session response carries no threshold of its own.
    #[serde(default = "default_alert_threshold")]
    pub default_alert_threshold_ms: u64,
    #[serde(default)]
    pub default_alert_mode: AlertMode,
    #[serde(default)]
    pub frame_capture: FrameCapture,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            frame_interval_ms: default_frame_interval(),
            countdown_interval_ms: default_countdown_interval(),
            default_alert_threshold_ms: default_alert_threshold(),
            default_alert_mode: AlertMode::Popup,
            frame_capture: FrameCapture::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.frame_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "frame_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.countdown_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "countdown_interval_ms must be greater than zero".to_string(),
            ));
        }
        let q = self.frame_capture.jpeg_quality;
        if !(q > 0.0 && q <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "jpeg_quality must be in (0, 1], got {}",
                q
            )));
        }
        Ok(())
    }
}

fn default_frame_interval() -> u32 {
    500
}

fn default_countdown_interval() -> u32 {
    1000
}

fn default_alert_threshold() -> u64 {
    2500
}

/// Canvas capture settings for the frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCapture {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_quality")]
    pub jpeg_quality: f32,
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

impl Default for FrameCapture {
    fn default() -> Self {
        FrameCapture {
            width: default_width(),
            height: default_height(),
            jpeg_quality: default_quality(),
            file_name: default_file_name(),
        }
    }
}

fn default_width() -> u32 {
    320
}

fn default_height() -> u32 {
    240
}

fn default_quality() -> f32 {
    0.6
}

fn default_file_name() -> String {
    "frame.jpg".to_string()
}

/// Round half away from zero, matching `Math.round` for non-negative inputs.
pub(crate) fn round_to_u64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}
