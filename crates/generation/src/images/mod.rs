//! Image generation capability and provider selection.

use std::path::PathBuf;

use image::imageops::FilterType;
use image::DynamicImage;

use storyreel_common::config::AppConfig;
use storyreel_common::error::StoryreelResult;
use storyreel_project_model::scene::ImageProvider;

pub mod placeholder;
pub mod stability;

pub use placeholder::PlaceholderImageGenerator;
pub use stability::StabilityImageGenerator;

/// One image to generate.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,

    /// Reference image for image-to-image generation, if supported.
    pub reference: Option<PathBuf>,

    /// How strongly the output follows `reference` (0..1).
    pub reference_strength: f32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            prompt: prompt.into(),
            width,
            height,
            reference: None,
            reference_strength: 0.35,
        }
    }
}

/// Text (and optionally image) to image.
///
/// Implementations return an image of exactly `width x height`.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> StoryreelResult<DynamicImage>;

    fn name(&self) -> &str;
}

/// Build the generator for `provider`.
///
/// Missing credentials fail here, before any request is made.
pub fn image_generator(
    provider: ImageProvider,
    config: &AppConfig,
) -> StoryreelResult<Box<dyn ImageGenerator>> {
    let generator: Box<dyn ImageGenerator> = match provider {
        ImageProvider::Stability => Box::new(StabilityImageGenerator::from_config(config)?),
        ImageProvider::Placeholder => Box::new(PlaceholderImageGenerator::new()),
    };
    Ok(generator)
}

/// Provider used when none is requested: Stability if configured.
pub fn default_image_provider(config: &AppConfig) -> ImageProvider {
    if config.credentials.has_stability() {
        ImageProvider::Stability
    } else {
        ImageProvider::Placeholder
    }
}

/// Resize to exactly `width x height` when the provider returned another size.
pub fn fit_to_size(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }
}
