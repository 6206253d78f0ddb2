//! Google Gemini story generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};

use crate::story::{build_story_prompt, parse_story_response, Story, StoryGenerator, StoryRequest};

/// Story generator backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiStoryGenerator {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiStoryGenerator {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> StoryreelResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StoryreelError::config("GOOGLE_API_KEY not configured"));
        }
        Ok(Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &AppConfig) -> StoryreelResult<Self> {
        let creds = &config.credentials;
        let key = creds
            .google_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StoryreelError::config("GOOGLE_API_KEY not configured"))?;
        Self::new(key, creds.google_text_model.clone())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete(&self, prompt: String) -> StoryreelResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
        };

        // API key goes in a header so it never appears in logged URLs.
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StoryreelError::generation(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            StoryreelError::generation(format!("Failed to read Gemini response: {e}"))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(StoryreelError::generation(format!(
                "Gemini API error ({status}): {message}"
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            StoryreelError::generation(format!("Failed to parse Gemini response: {e}"))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(StoryreelError::generation(format!(
                "Content blocked by Gemini safety filters: {reason}"
            )));
        }

        Ok(response_text(parsed.candidates.unwrap_or_default()))
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(candidates: Vec<Candidate>) -> String {
    candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl StoryGenerator for GeminiStoryGenerator {
    async fn generate(&self, request: &StoryRequest) -> StoryreelResult<Story> {
        tracing::info!(
            model = %self.model,
            title = %request.title,
            paragraphs = request.paragraphs,
            "Requesting story"
        );
        let raw = self.complete(build_story_prompt(request)).await?;
        let story = parse_story_response(&raw, request.paragraphs, &request.title)?;
        tracing::debug!(paragraphs = story.paragraphs.len(), "Story parsed");
        Ok(story)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = AppConfig::default();
        let err = GeminiStoryGenerator::from_config(&config).err().unwrap();
        assert!(err.is_config());
        assert!(GeminiStoryGenerator::new("  ", "gemini-1.5-pro").is_err());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"paragraphs\":"},{"text":"[\"a\"]}"}]}}]}"#,
        )
        .unwrap();
        let text = response_text(parsed.candidates.unwrap());
        assert_eq!(text, "{\"paragraphs\":[\"a\"]}");
    }

    #[test]
    fn test_empty_candidates_yield_empty_text() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response_text(parsed.candidates.unwrap_or_default()), "");
    }
}
