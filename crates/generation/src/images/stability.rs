//! Stability AI image generation (text-to-image and image-to-image).

use std::path::Path;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use image::DynamicImage;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};

use super::{fit_to_size, ImageGenerator, ImageRequest};

const CFG_SCALE: u32 = 7;

pub struct StabilityImageGenerator {
    api_key: String,
    engine: String,
    base_url: String,
    client: reqwest::Client,
}

impl StabilityImageGenerator {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stability.ai";

    pub fn new(api_key: impl Into<String>, engine: impl Into<String>) -> StoryreelResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StoryreelError::config("STABILITY_API_KEY not configured"));
        }
        Ok(Self {
            api_key,
            engine: engine.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &AppConfig) -> StoryreelResult<Self> {
        let creds = &config.credentials;
        let key = creds
            .stability_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StoryreelError::config("STABILITY_API_KEY not configured"))?;
        Self::new(key, creds.stability_engine.clone())
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/generation/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.engine,
            operation
        )
    }

    async fn text_to_image(&self, request: &ImageRequest) -> StoryreelResult<DynamicImage> {
        let payload = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: request.prompt.clone(),
                weight: 1.0,
            }],
            width: request.width,
            height: request.height,
            cfg_scale: CFG_SCALE,
            samples: 1,
        };
        let response = self
            .client
            .post(self.endpoint("text-to-image"))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoryreelError::generation(format!("Stability request failed: {e}")))?;
        decode_response(response).await
    }

    async fn image_to_image(
        &self,
        request: &ImageRequest,
        reference: &Path,
    ) -> StoryreelResult<DynamicImage> {
        let bytes = tokio::fs::read(reference).await.map_err(|e| {
            StoryreelError::generation(format!(
                "Failed to read reference image {}: {e}",
                reference.display()
            ))
        })?;
        let file_name = reference
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("reference.jpg")
            .to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| StoryreelError::generation(format!("Invalid multipart part: {e}")))?;

        let form = multipart::Form::new()
            .part("init_image", part)
            .text("text_prompts[0][text]", request.prompt.clone())
            .text("image_strength", request.reference_strength.to_string())
            .text("cfg_scale", CFG_SCALE.to_string())
            .text("samples", "1");

        let response = self
            .client
            .post(self.endpoint("image-to-image"))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                StoryreelError::generation(format!("Stability img2img request failed: {e}"))
            })?;
        decode_response(response).await
    }
}

#[async_trait::async_trait]
impl ImageGenerator for StabilityImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> StoryreelResult<DynamicImage> {
        tracing::info!(
            engine = %self.engine,
            width = request.width,
            height = request.height,
            reference = request.reference.is_some(),
            "Requesting Stability image"
        );
        let image = match &request.reference {
            Some(reference) => self.image_to_image(request, reference).await?,
            None => self.text_to_image(request).await?,
        };
        Ok(fit_to_size(image, request.width, request.height))
    }

    fn name(&self) -> &str {
        "stability"
    }
}

async fn decode_response(response: reqwest::Response) -> StoryreelResult<DynamicImage> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        StoryreelError::generation(format!("Failed to read Stability response: {e}"))
    })?;
    if !status.is_success() {
        return Err(StoryreelError::generation(format!(
            "Stability API error ({status}): {}",
            body.trim()
        )));
    }
    let parsed: GenerationResponse = serde_json::from_str(&body).map_err(|e| {
        StoryreelError::generation(format!("Failed to parse Stability response: {e}"))
    })?;
    decode_first_artifact(parsed)
}

fn decode_first_artifact(response: GenerationResponse) -> StoryreelResult<DynamicImage> {
    let artifact = response
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| StoryreelError::generation("No artifacts returned from Stability"))?;
    let bytes = BASE64_STANDARD
        .decode(artifact.base64.as_bytes())
        .map_err(|e| StoryreelError::generation(format!("Invalid artifact encoding: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| StoryreelError::generation(format!("Undecodable Stability image: {e}")))?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

#[derive(Serialize)]
struct TextToImageRequest {
    text_prompts: Vec<TextPrompt>,
    width: u32,
    height: u32,
    cfg_scale: u32,
    samples: u32,
}

#[derive(Serialize)]
struct TextPrompt {
    text: String,
    weight: f32,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_endpoint_layout() {
        let gen = StabilityImageGenerator::new("sk", "stable-diffusion-xl-1024-v1-0").unwrap();
        assert_eq!(
            gen.endpoint("text-to-image"),
            "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image"
        );
    }

    #[test]
    fn test_payload_shape() {
        let payload = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: "a quiet pier".to_string(),
                weight: 1.0,
            }],
            width: 1024,
            height: 1024,
            cfg_scale: CFG_SCALE,
            samples: 1,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["text_prompts"][0]["text"], "a quiet pier");
        assert_eq!(json["cfg_scale"], 7);
        assert_eq!(json["samples"], 1);
    }

    #[test]
    fn test_decode_first_artifact() {
        let mut png = Vec::new();
        RgbImage::from_pixel(4, 3, Rgb([9, 8, 7]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let response = GenerationResponse {
            artifacts: vec![Artifact {
                base64: BASE64_STANDARD.encode(&png),
            }],
        };
        let image = decode_first_artifact(response).unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[test]
    fn test_empty_artifacts_is_generation_error() {
        let err = decode_first_artifact(GenerationResponse { artifacts: vec![] }).unwrap_err();
        assert!(matches!(err, StoryreelError::Generation { .. }));
    }
}
