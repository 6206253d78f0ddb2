//! Application configuration.
//!
//! Built once at process entry and passed explicitly to every component
//! that needs it. There is no global configuration state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{StoryreelError, StoryreelResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// API credentials and model identifiers for external services.
    pub credentials: ProviderCredentials,

    /// Default voice selection.
    pub voice: VoiceDefaults,

    /// Defaults for project generation.
    pub generation: GenerationDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Credentials and model identifiers for external generation services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub google_api_key: Option<String>,
    pub google_text_model: String,
    pub stability_api_key: Option<String>,
    pub stability_engine: String,
    pub azure_speech_key: Option<String>,
    pub azure_speech_region: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
}

/// Default voice parameters applied to newly generated scenes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceDefaults {
    /// Preferred voice provider (`azure`, `elevenlabs`, `none`). When unset the
    /// provider is picked from the configured credentials.
    pub provider: Option<String>,

    /// Azure neural voice name.
    pub azure_voice: String,

    /// Azure speaking style (`mstts:express-as`).
    pub voice_style: String,
}

/// Defaults for project generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Canvas size as `WIDTHxHEIGHT`.
    pub image_size: String,

    /// Number of paragraphs requested from the story generator.
    pub paragraphs: usize,

    /// Timeout applied to every external generation request.
    pub request_timeout_secs: u64,

    /// How strongly image-to-image generation follows the reference image.
    pub reference_strength: f32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_text_model: "gemini-1.5-pro".to_string(),
            stability_api_key: None,
            stability_engine: "stable-diffusion-xl-1024-v1-0".to_string(),
            azure_speech_key: None,
            azure_speech_region: None,
            elevenlabs_api_key: None,
            elevenlabs_voice_id: None,
        }
    }
}

impl Default for VoiceDefaults {
    fn default() -> Self {
        Self {
            provider: None,
            azure_voice: "en-US-JennyNeural".to_string(),
            voice_style: "narration-professional".to_string(),
        }
    }
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            image_size: "1024x1024".to_string(),
            paragraphs: 6,
            request_timeout_secs: 120,
            reference_strength: 0.35,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ProviderCredentials {
    /// Whether Stability credentials are present.
    pub fn has_stability(&self) -> bool {
        non_empty(&self.stability_api_key)
    }

    /// Whether both Azure key and region are present.
    pub fn has_azure_speech(&self) -> bool {
        non_empty(&self.azure_speech_key) && non_empty(&self.azure_speech_region)
    }

    /// Whether an ElevenLabs key is present.
    pub fn has_elevenlabs(&self) -> bool {
        non_empty(&self.elevenlabs_api_key)
    }

    /// Whether a Google API key is present.
    pub fn has_google(&self) -> bool {
        non_empty(&self.google_api_key)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults,
    /// then overlay credentials and defaults from the process environment.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn load_file_or_default() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Overlay values from an environment lookup.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// clobber a configured credential.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let creds = &mut self.credentials;

        if let Some(v) = get("GOOGLE_API_KEY") {
            creds.google_api_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_TEXT_MODEL") {
            creds.google_text_model = v;
        }
        if let Some(v) = get("STABILITY_API_KEY") {
            creds.stability_api_key = Some(v);
        }
        if let Some(v) = get("STABILITY_ENGINE") {
            creds.stability_engine = v;
        }
        if let Some(v) = get("AZURE_SPEECH_KEY") {
            creds.azure_speech_key = Some(v);
        }
        if let Some(v) = get("AZURE_SPEECH_REGION") {
            creds.azure_speech_region = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            creds.elevenlabs_api_key = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_VOICE_ID") {
            creds.elevenlabs_voice_id = Some(v);
        }
        if let Some(v) = get("DEFAULT_VOICE_PROVIDER") {
            self.voice.provider = Some(v);
        }
        if let Some(v) = get("DEFAULT_AZURE_VOICE") {
            self.voice.azure_voice = v;
        }
        if let Some(v) = get("DEFAULT_VOICE_STYLE") {
            self.voice.voice_style = v;
        }
        if let Some(v) = get("DEFAULT_IMAGE_SIZE") {
            self.generation.image_size = v;
        }
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Parse a `WIDTHxHEIGHT` size string (case-insensitive `x`).
pub fn parse_size(s: &str) -> StoryreelResult<(u32, u32)> {
    let lower = s.trim().to_ascii_lowercase();
    let (w, h) = lower
        .split_once('x')
        .ok_or_else(|| StoryreelError::config(format!("Invalid size '{s}', expected WxH")))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| StoryreelError::config(format!("Invalid width in size '{s}'")))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| StoryreelError::config(format!("Invalid height in size '{s}'")))?;
    if width == 0 || height == 0 {
        return Err(StoryreelError::config(format!(
            "Size '{s}' must have non-zero width and height"
        )));
    }
    Ok((width, height))
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.voice.azure_voice, "en-US-JennyNeural");
        assert_eq!(config.generation.image_size, "1024x1024");
        assert_eq!(config.generation.paragraphs, 6);
        assert!(!config.credentials.has_stability());
        assert!(!config.credentials.has_azure_speech());
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("STABILITY_API_KEY", "sk-test"),
            ("AZURE_SPEECH_KEY", "az"),
            ("AZURE_SPEECH_REGION", "westeurope"),
            ("DEFAULT_IMAGE_SIZE", "1280x720"),
            ("ELEVENLABS_API_KEY", "   "),
            ("DEFAULT_VOICE_PROVIDER", "elevenlabs"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert!(config.credentials.has_stability());
        assert!(config.credentials.has_azure_speech());
        assert!(!config.credentials.has_elevenlabs());
        assert_eq!(config.generation.image_size, "1280x720");
        assert_eq!(config.voice.provider.as_deref(), Some("elevenlabs"));
    }

    #[test]
    fn test_azure_requires_region() {
        let mut config = AppConfig::default();
        config.credentials.azure_speech_key = Some("key".to_string());
        assert!(!config.credentials.has_azure_speech());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_size("640X360").unwrap(), (640, 360));
        assert!(parse_size("1920").is_err());
        assert!(parse_size("0x100").is_err());
        assert!(parse_size("axb").unwrap_err().is_config());
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"logging":{"level":"debug"}}"#).unwrap();
        assert_eq!(parsed.logging.level, "debug");
        assert!(!parsed.logging.json);
        assert_eq!(parsed.credentials.stability_engine, "stable-diffusion-xl-1024-v1-0");
    }
}
