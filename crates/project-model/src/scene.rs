//! Scene-level types: motion, transitions, and voice selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Duration applied to scenes whose `duration_sec` is unset.
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 6.0;

/// Default transition length in seconds.
pub const DEFAULT_TRANSITION_SECS: f64 = 0.6;

/// One narrated beat of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 1-based identifier, equal to the scene's position in playback order.
    pub scene_id: u32,

    /// Source narration.
    pub paragraph_text: String,

    /// Resolved still image. Required before rendering.
    #[serde(default)]
    pub image_path: Option<PathBuf>,

    /// Prompt used to generate the image.
    #[serde(default)]
    pub image_prompt: Option<String>,

    /// Optional voice-over audio file.
    #[serde(default)]
    pub voiceover_path: Option<PathBuf>,

    /// Voice used to synthesize the voice-over.
    #[serde(default)]
    pub voice: Option<VoiceSpec>,

    /// Scene length in seconds. Renders as 6.0s when unset.
    ///
    /// Not reconciled with the voice-over length: longer audio is truncated.
    #[serde(default)]
    pub duration_sec: Option<f64>,

    /// Ken Burns pan/zoom parameters.
    #[serde(default)]
    pub motion: ImageMotion,

    #[serde(default)]
    pub transition_in: Transition,

    #[serde(default)]
    pub transition_out: Transition,

    /// Caption lines. Not consumed by the renderer.
    #[serde(default)]
    pub captions: Option<Vec<String>>,
}

impl Scene {
    /// Create a scene with default motion and transitions.
    pub fn new(scene_id: u32, paragraph_text: impl Into<String>) -> Self {
        Self {
            scene_id,
            paragraph_text: paragraph_text.into(),
            image_path: None,
            image_prompt: None,
            voiceover_path: None,
            voice: None,
            duration_sec: None,
            motion: ImageMotion::default(),
            transition_in: Transition::default(),
            transition_out: Transition::default(),
            captions: None,
        }
    }

    /// The duration the renderer will use for this scene.
    pub fn effective_duration(&self) -> f64 {
        self.duration_sec.unwrap_or(DEFAULT_SCENE_DURATION_SECS)
    }

    /// Asset file stem used for generated images and voice-overs (`scene_03`).
    pub fn asset_stem(&self) -> String {
        format!("scene_{:02}", self.scene_id)
    }
}

/// Ken Burns motion: linear pan and zoom across the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMotion {
    /// Horizontal pan at the start, in `[-1.0, 1.0]` (0 = centered).
    pub pan_start: f64,
    /// Horizontal pan at the end, in `[-1.0, 1.0]`.
    pub pan_end: f64,
    /// Zoom multiplier at the start (1.0 = no zoom).
    pub zoom_start: f64,
    /// Zoom multiplier at the end.
    pub zoom_end: f64,
}

impl Default for ImageMotion {
    /// No pan, slow zoom-in.
    fn default() -> Self {
        Self {
            pan_start: 0.0,
            pan_end: 0.0,
            zoom_start: 1.0,
            zoom_end: 1.05,
        }
    }
}

impl ImageMotion {
    /// A motion that keeps the image still.
    pub const STILL: ImageMotion = ImageMotion {
        pan_start: 0.0,
        pan_end: 0.0,
        zoom_start: 1.0,
        zoom_end: 1.0,
    };

    /// Interpolated zoom at animation progress `alpha` in `[0, 1]`.
    pub fn zoom_at(&self, alpha: f64) -> f64 {
        self.zoom_start + (self.zoom_end - self.zoom_start) * alpha
    }

    /// Check the motion against its domain. Returns human-readable issues.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = vec![];
        for (label, pan) in [("pan_start", self.pan_start), ("pan_end", self.pan_end)] {
            if !pan.is_finite() || !(-1.0..=1.0).contains(&pan) {
                issues.push(format!("{label} {pan} outside [-1.0, 1.0]"));
            }
        }
        for (label, zoom) in [("zoom_start", self.zoom_start), ("zoom_end", self.zoom_end)] {
            if !zoom.is_finite() || zoom <= 0.0 {
                issues.push(format!("{label} {zoom} must be a positive number"));
            }
        }
        issues
    }
}

/// Transition applied at a scene boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(rename = "type", default)]
    pub kind: TransitionKind,

    #[serde(default = "default_transition_secs")]
    pub duration_sec: f64,
}

fn default_transition_secs() -> f64 {
    DEFAULT_TRANSITION_SECS
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Crossfade,
            duration_sec: DEFAULT_TRANSITION_SECS,
        }
    }
}

impl Transition {
    /// A transition that applies no fade.
    pub const NONE: Transition = Transition {
        kind: TransitionKind::None,
        duration_sec: 0.0,
    };

    /// Fade length in seconds, or `None` when this transition does not fade.
    pub fn fade_secs(&self) -> Option<f64> {
        match self.kind {
            TransitionKind::None => None,
            TransitionKind::Crossfade | TransitionKind::Fade => {
                if self.duration_sec.is_finite() && self.duration_sec > 0.0 {
                    Some(self.duration_sec)
                } else {
                    None
                }
            }
        }
    }
}

/// Transition kind.
///
/// `Crossfade` and `Fade` are both rendered as opacity fades; adjacent
/// scenes fading out and in produce the cross-fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Crossfade,
    Fade,
    None,
}

/// Voice selection and prosody hints for the speech synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoiceSpec {
    #[serde(default)]
    pub provider: VoiceProvider,

    /// Provider-specific voice name or identifier.
    #[serde(default)]
    pub voice_name_or_id: String,

    #[serde(default)]
    pub style: Option<String>,

    /// Speaking rate, e.g. `+5%`.
    #[serde(default)]
    pub rate: Option<String>,

    /// Pitch shift, e.g. `-1st`.
    #[serde(default)]
    pub pitch: Option<String>,

    #[serde(default)]
    pub emotion: Option<String>,
}

impl VoiceSpec {
    /// A spec that disables voice-over.
    pub fn none() -> Self {
        Self {
            provider: VoiceProvider::None,
            ..Self::default()
        }
    }
}

/// Speech synthesis provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProvider {
    #[default]
    Azure,
    ElevenLabs,
    None,
}

/// Image generation provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    #[default]
    Stability,
    /// Offline deterministic placeholder canvas.
    Placeholder,
}

impl VoiceProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            VoiceProvider::Azure => "azure",
            VoiceProvider::ElevenLabs => "elevenlabs",
            VoiceProvider::None => "none",
        }
    }
}

impl ImageProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageProvider::Stability => "stability",
            ImageProvider::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for VoiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{value}', expected one of: {expected}")]
pub struct UnknownProvider {
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for VoiceProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(VoiceProvider::Azure),
            "elevenlabs" => Ok(VoiceProvider::ElevenLabs),
            "none" => Ok(VoiceProvider::None),
            _ => Err(UnknownProvider {
                value: s.to_string(),
                expected: "azure, elevenlabs, none",
            }),
        }
    }
}

impl FromStr for ImageProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stability" => Ok(ImageProvider::Stability),
            "placeholder" => Ok(ImageProvider::Placeholder),
            _ => Err(UnknownProvider {
                value: s.to_string(),
                expected: "stability, placeholder",
            }),
        }
    }
}
