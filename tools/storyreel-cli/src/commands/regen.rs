//! Regenerate one scene's image and/or voice-over.

use std::path::PathBuf;

use storyreel_common::config::AppConfig;
use storyreel_generation::{image_generator, speech_synthesizer, Orchestrator, RegenTargets};
use storyreel_project_model::scene::{ImageProvider, VoiceProvider};

pub async fn run(
    path: PathBuf,
    scene: u32,
    what: String,
    style_prompt: Option<String>,
    reference_image: Option<PathBuf>,
    render: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let targets: RegenTargets = what.parse()?;
    let mut loaded = super::load_project(&path)?;
    if loaded.project.scene(scene).is_none() {
        anyhow::bail!("Scene {scene} not found in {}", path.display());
    }
    let reference_image = reference_image
        .as_deref()
        .map(super::existing_absolute)
        .transpose()?;

    // Only build the collaborators that will be called, so regenerating a
    // voice-over does not demand image credentials and vice versa.
    let image_provider = if targets.image {
        loaded.project.meta.image_provider
    } else {
        ImageProvider::Placeholder
    };
    let voice_provider = if targets.voice {
        loaded.project.meta.tts_provider
    } else {
        VoiceProvider::None
    };

    println!("Regenerating scene {scene} ({targets}) in {}", loaded.root.display());
    let orchestrator = Orchestrator::for_assets(
        image_generator(image_provider, config)?,
        speech_synthesizer(voice_provider, config)?,
    )
    .with_config(config);

    orchestrator
        .regenerate(
            &mut loaded,
            scene,
            targets,
            style_prompt.as_deref(),
            reference_image.as_deref(),
        )
        .await?;
    println!("Scene {scene} updated: {}", loaded.project_file().display());

    if render {
        super::render_loaded(&loaded, None).await?;
    }
    Ok(())
}
