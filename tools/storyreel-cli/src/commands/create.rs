//! Generate a new story project.

use std::path::PathBuf;

use clap::Args;

use storyreel_common::config::{parse_size, AppConfig};
use storyreel_generation::{
    default_image_provider, default_voice_provider, image_generator, speech_synthesizer,
    CreateRequest, GeminiStoryGenerator, Orchestrator,
};
use storyreel_project_model::scene::{ImageProvider, VoiceProvider, VoiceSpec};
use storyreel_project_model::slugify;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Story title or premise
    #[arg(long)]
    pub title: String,

    /// Number of paragraphs (one scene each)
    #[arg(long)]
    pub paragraphs: Option<usize>,

    /// Visual style appended to every image prompt
    #[arg(long)]
    pub style_prompt: Option<String>,

    /// Reference image for image-to-image generation
    #[arg(long)]
    pub reference_image: Option<PathBuf>,

    /// Project directory (default: ./outputs/<slug>)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Image and canvas size as WIDTHxHEIGHT
    #[arg(long)]
    pub image_size: Option<String>,

    /// Article or page the story is based on
    #[arg(long)]
    pub source_url: Option<String>,

    /// Image provider: stability|placeholder
    #[arg(long)]
    pub image_provider: Option<ImageProvider>,

    /// Voice provider: azure|elevenlabs|none
    #[arg(long)]
    pub voice_provider: Option<VoiceProvider>,

    /// Azure neural voice name
    #[arg(long)]
    pub azure_voice: Option<String>,

    /// ElevenLabs voice id
    #[arg(long)]
    pub elevenlabs_voice_id: Option<String>,

    /// Azure speaking style
    #[arg(long)]
    pub voice_style: Option<String>,

    /// Azure prosody rate (e.g. "-5%")
    #[arg(long, allow_hyphen_values = true)]
    pub voice_rate: Option<String>,

    /// Azure prosody pitch (e.g. "+1st")
    #[arg(long, allow_hyphen_values = true)]
    pub voice_pitch: Option<String>,

    /// Render the video once the project is created
    #[arg(long)]
    pub render: bool,
}

pub async fn run(args: CreateArgs, config: &AppConfig) -> anyhow::Result<()> {
    let request = build_request(&args, config)?;
    let out_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("outputs").join(slugify(&args.title)));

    tracing::debug!(?request, out_dir = %out_dir.display(), "Resolved create request");

    println!("Creating project: {}", request.title);
    println!("  Directory: {}", out_dir.display());
    println!("  Paragraphs: {}", request.paragraphs);
    println!("  Canvas: {}x{}", request.width, request.height);
    println!("  Image provider: {}", request.image_provider);
    println!("  Voice provider: {}", request.voice_provider);

    let orchestrator = Orchestrator::new(
        Box::new(GeminiStoryGenerator::from_config(config)?),
        image_generator(request.image_provider, config)?,
        speech_synthesizer(request.voice_provider, config)?,
    )
    .with_config(config);

    let loaded = orchestrator.create_project(&request, &out_dir).await?;
    println!(
        "\nProject created: {} ({} scenes, {:.1}s)",
        loaded.project_file().display(),
        loaded.project.scenes.len(),
        loaded.project.total_duration()
    );

    if args.render {
        super::render_loaded(&loaded, None).await?;
    }
    Ok(())
}

/// Resolve flags against configured defaults.
fn build_request(args: &CreateArgs, config: &AppConfig) -> anyhow::Result<CreateRequest> {
    let size = args
        .image_size
        .as_deref()
        .unwrap_or(&config.generation.image_size);
    let (width, height) = parse_size(size)?;

    let reference_image = args
        .reference_image
        .as_deref()
        .map(super::existing_absolute)
        .transpose()?;

    let image_provider = args
        .image_provider
        .unwrap_or_else(|| default_image_provider(config));
    let voice_provider = args
        .voice_provider
        .unwrap_or_else(|| default_voice_provider(config));

    Ok(CreateRequest {
        title: args.title.clone(),
        paragraphs: args.paragraphs.unwrap_or(config.generation.paragraphs),
        style_prompt: args.style_prompt.clone(),
        reference_image,
        source_url: args.source_url.clone(),
        width,
        height,
        image_provider,
        voice_provider,
        voice: voice_spec(args, voice_provider, config),
    })
}

fn voice_spec(args: &CreateArgs, provider: VoiceProvider, config: &AppConfig) -> VoiceSpec {
    match provider {
        VoiceProvider::None => VoiceSpec::none(),
        VoiceProvider::Azure => VoiceSpec {
            provider,
            voice_name_or_id: args
                .azure_voice
                .clone()
                .unwrap_or_else(|| config.voice.azure_voice.clone()),
            style: args
                .voice_style
                .clone()
                .or_else(|| Some(config.voice.voice_style.clone())),
            rate: args.voice_rate.clone(),
            pitch: args.voice_pitch.clone(),
            emotion: None,
        },
        VoiceProvider::ElevenLabs => VoiceSpec {
            provider,
            voice_name_or_id: args
                .elevenlabs_voice_id
                .clone()
                .or_else(|| config.credentials.elevenlabs_voice_id.clone())
                .unwrap_or_default(),
            ..VoiceSpec::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CreateArgs,
    }

    fn parse(argv: &[&str]) -> CreateArgs {
        let mut full = vec!["storyreel"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_defaults_come_from_config() {
        let args = parse(&["--title", "The Lighthouse"]);
        let config = AppConfig::default();
        let request = build_request(&args, &config).unwrap();

        assert_eq!(request.paragraphs, 6);
        assert_eq!((request.width, request.height), (1024, 1024));
        assert_eq!(request.image_provider, ImageProvider::Placeholder);
        assert_eq!(request.voice_provider, VoiceProvider::None);
        assert_eq!(request.voice.provider, VoiceProvider::None);
    }

    #[test]
    fn test_azure_voice_flags() {
        let args = parse(&[
            "--title",
            "Night Train",
            "--voice-provider",
            "azure",
            "--voice-rate",
            "-5%",
            "--image-size",
            "640x360",
        ]);
        let config = AppConfig::default();
        let request = build_request(&args, &config).unwrap();

        assert_eq!((request.width, request.height), (640, 360));
        assert_eq!(request.voice.provider, VoiceProvider::Azure);
        assert_eq!(request.voice.voice_name_or_id, "en-US-JennyNeural");
        assert_eq!(request.voice.style.as_deref(), Some("narration-professional"));
        assert_eq!(request.voice.rate.as_deref(), Some("-5%"));
    }

    #[test]
    fn test_elevenlabs_voice_falls_back_to_config() {
        let args = parse(&["--title", "T", "--voice-provider", "elevenlabs"]);
        let mut config = AppConfig::default();
        config.credentials.elevenlabs_voice_id = Some("voice-123".to_string());
        let request = build_request(&args, &config).unwrap();
        assert_eq!(request.voice.voice_name_or_id, "voice-123");
    }

    #[test]
    fn test_bad_size_and_missing_reference() {
        let config = AppConfig::default();
        let args = parse(&["--title", "T", "--image-size", "wide"]);
        assert!(build_request(&args, &config).is_err());

        let args = parse(&["--title", "T", "--reference-image", "/nonexistent/ref.png"]);
        assert!(build_request(&args, &config).is_err());
    }
}
