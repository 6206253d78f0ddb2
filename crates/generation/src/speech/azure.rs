//! Azure Cognitive Services text-to-speech.

use std::path::{Path, PathBuf};

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::scene::VoiceSpec;

use super::{write_audio, SpeechSynthesizer};

const OUTPUT_FORMAT: &str = "audio-24khz-96kbitrate-mono-mp3";

pub struct AzureSpeechSynthesizer {
    key: String,
    endpoint: String,
    default_voice: String,
    client: reqwest::Client,
}

impl AzureSpeechSynthesizer {
    pub fn new(
        key: impl Into<String>,
        region: &str,
        default_voice: impl Into<String>,
    ) -> StoryreelResult<Self> {
        let key = key.into();
        if key.trim().is_empty() || region.trim().is_empty() {
            return Err(StoryreelError::config(
                "Azure Speech requires AZURE_SPEECH_KEY and AZURE_SPEECH_REGION",
            ));
        }
        Ok(Self {
            key,
            endpoint: format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                region.trim()
            ),
            default_voice: default_voice.into(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &AppConfig) -> StoryreelResult<Self> {
        let creds = &config.credentials;
        if !creds.has_azure_speech() {
            return Err(StoryreelError::config(
                "Azure Speech requires AZURE_SPEECH_KEY and AZURE_SPEECH_REGION",
            ));
        }
        Self::new(
            creds.azure_speech_key.clone().unwrap_or_default(),
            creds.azure_speech_region.as_deref().unwrap_or_default(),
            config.voice.azure_voice.clone(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for AzureSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSpec,
        output: &Path,
    ) -> StoryreelResult<PathBuf> {
        let voice_name = if voice.voice_name_or_id.trim().is_empty() {
            self.default_voice.as_str()
        } else {
            voice.voice_name_or_id.as_str()
        };
        let ssml = build_ssml(
            text,
            voice_name,
            voice.style.as_deref(),
            voice.rate.as_deref(),
            voice.pitch.as_deref(),
        );
        tracing::info!(voice = voice_name, output = %output.display(), "Synthesizing with Azure");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "storyreel")
            .body(ssml)
            .send()
            .await
            .map_err(|e| StoryreelError::generation(format!("Azure TTS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoryreelError::generation(format!(
                "Azure TTS error ({status}): {}",
                body.trim()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoryreelError::generation(format!("Failed to read Azure audio: {e}")))?;
        write_audio(output, &bytes).await
    }

    fn name(&self) -> &str {
        "azure"
    }
}

/// SSML document for one utterance. Text and attribute values are escaped.
pub fn build_ssml(
    text: &str,
    voice_name: &str,
    style: Option<&str>,
    rate: Option<&str>,
    pitch: Option<&str>,
) -> String {
    let mut prosody = String::new();
    if let Some(rate) = rate.filter(|r| !r.trim().is_empty()) {
        prosody.push_str(&format!(" rate=\"{}\"", xml_escape(rate)));
    }
    if let Some(pitch) = pitch.filter(|p| !p.trim().is_empty()) {
        prosody.push_str(&format!(" pitch=\"{}\"", xml_escape(pitch)));
    }

    let body = match style.filter(|s| !s.trim().is_empty()) {
        Some(style) => format!(
            "<mstts:express-as style=\"{}\">{}</mstts:express-as>",
            xml_escape(style),
            xml_escape(text)
        ),
        None => xml_escape(text),
    };

    format!(
        "<speak version='1.0' xml:lang='en-US' xmlns:mstts='http://www.w3.org/2001/mstts' \
         xmlns='http://www.w3.org/2001/10/synthesis'>\
         <voice name='{}'><prosody{prosody}>{body}</prosody></voice></speak>",
        xml_escape(voice_name)
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
