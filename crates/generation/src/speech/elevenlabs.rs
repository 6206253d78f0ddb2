//! ElevenLabs text-to-speech.

use std::path::{Path, PathBuf};

use serde::Serialize;

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::scene::VoiceSpec;

use super::{write_audio, SpeechSynthesizer};

pub struct ElevenLabsSpeechSynthesizer {
    api_key: String,
    default_voice_id: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl ElevenLabsSpeechSynthesizer {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.elevenlabs.io/v1";

    pub fn new(
        api_key: impl Into<String>,
        default_voice_id: Option<String>,
    ) -> StoryreelResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StoryreelError::config("ELEVENLABS_API_KEY not configured"));
        }
        Ok(Self {
            api_key,
            default_voice_id: default_voice_id.filter(|v| !v.trim().is_empty()),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &AppConfig) -> StoryreelResult<Self> {
        let creds = &config.credentials;
        let key = creds
            .elevenlabs_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StoryreelError::config("ELEVENLABS_API_KEY not configured"))?;
        Self::new(key, creds.elevenlabs_voice_id.clone())
    }

    /// Voice id from the scene voice, else the configured default.
    fn voice_id<'a>(&'a self, voice: &'a VoiceSpec) -> StoryreelResult<&'a str> {
        if !voice.voice_name_or_id.trim().is_empty() {
            return Ok(voice.voice_name_or_id.as_str());
        }
        self.default_voice_id
            .as_deref()
            .ok_or_else(|| StoryreelError::config("No ElevenLabs voice id provided"))
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSpec,
        output: &Path,
    ) -> StoryreelResult<PathBuf> {
        let voice_id = self.voice_id(voice)?;
        tracing::info!(voice_id, output = %output.display(), "Synthesizing with ElevenLabs");

        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await
            .map_err(|e| {
                StoryreelError::generation(format!("ElevenLabs request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoryreelError::generation(format!(
                "ElevenLabs error ({status}): {}",
                body.trim()
            )));
        }
        let bytes = response.bytes().await.map_err(|e| {
            StoryreelError::generation(format!("Failed to read ElevenLabs audio: {e}"))
        })?;
        write_audio(output, &bytes).await
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_project_model::scene::VoiceProvider;

    fn spec(id: &str) -> VoiceSpec {
        VoiceSpec {
            provider: VoiceProvider::ElevenLabs,
            voice_name_or_id: id.to_string(),
            ..VoiceSpec::default()
        }
    }

    #[test]
    fn test_voice_id_prefers_spec() {
        let synth =
            ElevenLabsSpeechSynthesizer::new("key", Some("fallback".to_string())).unwrap();
        assert_eq!(synth.voice_id(&spec("abc")).unwrap(), "abc");
        assert_eq!(synth.voice_id(&spec("")).unwrap(), "fallback");
    }

    #[test]
    fn test_missing_voice_id_is_config_error() {
        let synth = ElevenLabsSpeechSynthesizer::new("key", None).unwrap();
        assert!(synth.voice_id(&spec(" ")).unwrap_err().is_config());
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(SpeechRequest {
            text: "Sleep well.",
            voice_settings: VoiceSettings::default(),
        })
        .unwrap();
        assert_eq!(body["text"], "Sleep well.");
        assert_eq!(body["voice_settings"]["stability"], 0.5);
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
    }
}
