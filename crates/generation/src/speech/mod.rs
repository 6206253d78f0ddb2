//! Speech synthesis capability and provider selection.

use std::path::{Path, PathBuf};

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::scene::{VoiceProvider, VoiceSpec};

pub mod azure;
pub mod elevenlabs;

pub use azure::AzureSpeechSynthesizer;
pub use elevenlabs::ElevenLabsSpeechSynthesizer;

/// Text to an audio file.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` into `output` and return the written path.
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSpec,
        output: &Path,
    ) -> StoryreelResult<PathBuf>;

    fn name(&self) -> &str;
}

/// Build the synthesizer for `provider`; `None` for [`VoiceProvider::None`].
///
/// Missing credentials fail here, before any request is made.
pub fn speech_synthesizer(
    provider: VoiceProvider,
    config: &AppConfig,
) -> StoryreelResult<Option<Box<dyn SpeechSynthesizer>>> {
    let synthesizer: Box<dyn SpeechSynthesizer> = match provider {
        VoiceProvider::Azure => Box::new(AzureSpeechSynthesizer::from_config(config)?),
        VoiceProvider::ElevenLabs => Box::new(ElevenLabsSpeechSynthesizer::from_config(config)?),
        VoiceProvider::None => return Ok(None),
    };
    Ok(Some(synthesizer))
}

/// Provider used when none is requested.
///
/// A configured preference wins when it names a known provider; otherwise
/// Azure if key and region are configured.
pub fn default_voice_provider(config: &AppConfig) -> VoiceProvider {
    if let Some(preferred) = config.voice.provider.as_deref() {
        match preferred.parse::<VoiceProvider>() {
            Ok(provider) => return provider,
            Err(_) => tracing::warn!(preferred, "Ignoring unknown default voice provider"),
        }
    }
    if config.credentials.has_azure_speech() {
        VoiceProvider::Azure
    } else {
        VoiceProvider::None
    }
}

/// Write synthesized audio, creating the parent directory.
pub(crate) async fn write_audio(output: &Path, bytes: &[u8]) -> StoryreelResult<PathBuf> {
    if bytes.is_empty() {
        return Err(StoryreelError::generation(
            "Speech service returned empty audio",
        ));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(output, bytes).await?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_provider_has_no_synthesizer() {
        let config = AppConfig::default();
        assert!(speech_synthesizer(VoiceProvider::None, &config)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let config = AppConfig::default();
        let azure = speech_synthesizer(VoiceProvider::Azure, &config).err().unwrap();
        assert!(azure.is_config());
        let eleven = speech_synthesizer(VoiceProvider::ElevenLabs, &config)
            .err()
            .unwrap();
        assert!(eleven.is_config());
    }

    #[test]
    fn test_default_provider_needs_region() {
        let mut config = AppConfig::default();
        config.credentials.azure_speech_key = Some("k".to_string());
        assert_eq!(default_voice_provider(&config), VoiceProvider::None);
        config.credentials.azure_speech_region = Some("eastus".to_string());
        assert_eq!(default_voice_provider(&config), VoiceProvider::Azure);
    }

    #[test]
    fn test_default_provider_honors_preference() {
        let mut config = AppConfig::default();
        config.voice.provider = Some("elevenlabs".to_string());
        assert_eq!(default_voice_provider(&config), VoiceProvider::ElevenLabs);
        config.voice.provider = Some("bogus".to_string());
        assert_eq!(default_voice_provider(&config), VoiceProvider::None);
    }

    #[tokio::test]
    async fn test_write_audio_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("assets").join("scene_01.mp3");
        let written = write_audio(&out, b"ID3").await.unwrap();
        assert_eq!(written, out);
        assert!(write_audio(&out, b"").await.is_err());
    }
}
