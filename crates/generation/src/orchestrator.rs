//! Project creation and per-scene regeneration.
//!
//! Every external call runs under the configured timeout. A failed or timed
//! out call fails the whole operation; nothing is substituted.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use storyreel_common::config::AppConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::project::{LoadedProject, ProjectMeta, VideoProject};
use storyreel_project_model::scene::{
    ImageMotion, ImageProvider, Scene, VoiceProvider, VoiceSpec, DEFAULT_SCENE_DURATION_SECS,
};

use crate::images::{fit_to_size, ImageGenerator, ImageRequest};
use crate::speech::SpeechSynthesizer;
use crate::story::{image_prompt_for_paragraph, pad_by_repetition, StoryGenerator, StoryRequest};

/// Directory (relative to the project root) holding generated assets.
pub const ASSETS_DIR: &str = "assets";

/// Everything needed to create a new project.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub title: String,
    pub paragraphs: usize,
    pub style_prompt: Option<String>,
    pub reference_image: Option<PathBuf>,
    pub source_url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub image_provider: ImageProvider,
    pub voice_provider: VoiceProvider,
    /// Voice applied to every scene; provider-specific.
    pub voice: VoiceSpec,
}

/// Which assets of a scene to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenTargets {
    pub image: bool,
    pub voice: bool,
}

impl RegenTargets {
    pub const BOTH: RegenTargets = RegenTargets {
        image: true,
        voice: true,
    };
}

impl FromStr for RegenTargets {
    type Err = StoryreelError;

    /// Comma-separated `image`, `voice`, or `both`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut targets = RegenTargets {
            image: false,
            voice: false,
        };
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "image" => targets.image = true,
                "voice" => targets.voice = true,
                "both" => targets = RegenTargets::BOTH,
                other => {
                    return Err(StoryreelError::config(format!(
                        "Unknown regeneration target '{other}' (expected image, voice or both)"
                    )))
                }
            }
        }
        if !targets.image && !targets.voice {
            return Err(StoryreelError::config("Nothing to regenerate"));
        }
        Ok(targets)
    }
}

impl fmt::Display for RegenTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.image, self.voice) {
            (true, true) => f.write_str("both"),
            (true, false) => f.write_str("image"),
            (false, true) => f.write_str("voice"),
            (false, false) => f.write_str("nothing"),
        }
    }
}

/// Drives the generation collaborators to build and update projects.
pub struct Orchestrator {
    story: Option<Box<dyn StoryGenerator>>,
    images: Box<dyn ImageGenerator>,
    speech: Option<Box<dyn SpeechSynthesizer>>,
    timeout: Duration,
    reference_strength: f32,
}

impl Orchestrator {
    pub fn new(
        story: Box<dyn StoryGenerator>,
        images: Box<dyn ImageGenerator>,
        speech: Option<Box<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            story: Some(story),
            images,
            speech,
            timeout: Duration::from_secs(120),
            reference_strength: 0.35,
        }
    }

    /// An orchestrator that can only regenerate assets of existing projects.
    pub fn for_assets(
        images: Box<dyn ImageGenerator>,
        speech: Option<Box<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            story: None,
            images,
            speech,
            timeout: Duration::from_secs(120),
            reference_strength: 0.35,
        }
    }

    /// Apply timeout and reference strength from the configuration.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.timeout = Duration::from_secs(config.generation.request_timeout_secs.max(1));
        self.reference_strength = config.generation.reference_strength;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a story, its assets, and `project.json` under `out_dir`.
    pub async fn create_project(
        &self,
        request: &CreateRequest,
        out_dir: &Path,
    ) -> StoryreelResult<LoadedProject> {
        if request.paragraphs == 0 {
            return Err(StoryreelError::config("Paragraph count must be at least 1"));
        }
        let story_generator = self
            .story
            .as_ref()
            .ok_or_else(|| StoryreelError::config("No story generator configured"))?;
        if request.voice_provider != VoiceProvider::None && self.speech.is_none() {
            return Err(StoryreelError::config(format!(
                "Voice provider '{}' selected but no synthesizer is configured",
                request.voice_provider
            )));
        }
        tracing::info!(
            title = %request.title,
            paragraphs = request.paragraphs,
            images = self.images.name(),
            voice = %request.voice_provider,
            "Creating project"
        );

        let assets_dir = out_dir.join(ASSETS_DIR);
        tokio::fs::create_dir_all(&assets_dir).await?;

        let story_request = StoryRequest {
            title: request.title.clone(),
            paragraphs: request.paragraphs,
            style_prompt: request.style_prompt.clone(),
            source_url: request.source_url.clone(),
            ..StoryRequest::new(request.title.clone(), request.paragraphs)
        };
        let story = self
            .call("story generation", story_generator.generate(&story_request))
            .await?;
        if story.paragraphs.is_empty() {
            return Err(StoryreelError::generation(
                "Story generator returned no paragraphs",
            ));
        }

        let mut meta = ProjectMeta::new(request.title.clone());
        meta.style_prompt = request.style_prompt.clone();
        meta.reference_image = request.reference_image.clone();
        meta.image_provider = request.image_provider;
        meta.tts_provider = request.voice_provider;

        let mut project = VideoProject::new(meta, ASSETS_DIR, request.width, request.height);
        project.output_video_path = Some(PathBuf::from(format!("{}.mp4", project.meta.slug)));
        // One scene per requested paragraph, whatever the generator returned.
        let mut paragraphs = story.paragraphs;
        if paragraphs.len() < request.paragraphs {
            tracing::warn!(
                returned = paragraphs.len(),
                requested = request.paragraphs,
                "Story came back short, repeating the last paragraph"
            );
            pad_by_repetition(&mut paragraphs, request.paragraphs);
        }
        paragraphs.truncate(request.paragraphs);

        project.scenes = paragraphs
            .iter()
            .enumerate()
            .map(|(i, paragraph)| {
                let mut scene = Scene::new(i as u32 + 1, paragraph.clone());
                scene.image_prompt = Some(image_prompt_for_paragraph(
                    paragraph,
                    request.style_prompt.as_deref(),
                ));
                scene.duration_sec = Some(DEFAULT_SCENE_DURATION_SECS);
                scene.motion = ImageMotion::default();
                scene.voice = Some(voice_for(request.voice_provider, &request.voice));
                scene
            })
            .collect();

        let mut loaded = LoadedProject::new(out_dir, project);
        let scene_ids: Vec<u32> = loaded.project.scenes.iter().map(|s| s.scene_id).collect();
        for scene_id in scene_ids {
            self.generate_image(&mut loaded, scene_id, request.reference_image.as_deref())
                .await?;
            if request.voice_provider != VoiceProvider::None {
                self.generate_voice(&mut loaded, scene_id).await?;
            }
        }

        loaded
            .save()
            .map_err(|e| StoryreelError::project(e.to_string()))?;
        tracing::info!(path = %loaded.project_file().display(), "Project created");
        Ok(loaded)
    }

    /// Regenerate one scene's image and/or voice-over, then save the project.
    ///
    /// The image prompt is rebuilt from the paragraph with `style_prompt`, or
    /// the project's style when `None`. Voice regeneration is skipped when
    /// the project has no voice provider.
    pub async fn regenerate(
        &self,
        loaded: &mut LoadedProject,
        scene_id: u32,
        targets: RegenTargets,
        style_prompt: Option<&str>,
        reference_image: Option<&Path>,
    ) -> StoryreelResult<()> {
        let paragraph = loaded
            .project
            .scene(scene_id)
            .map(|s| s.paragraph_text.clone())
            .ok_or_else(|| StoryreelError::project(format!("Scene {scene_id} not found")))?;
        tracing::info!(scene_id, targets = %targets, "Regenerating scene");

        if targets.image {
            let style = style_prompt
                .map(str::to_string)
                .or_else(|| loaded.project.meta.style_prompt.clone());
            let prompt = image_prompt_for_paragraph(&paragraph, style.as_deref());
            if let Some(scene) = loaded.project.scene_mut(scene_id) {
                scene.image_prompt = Some(prompt);
            }
            let reference = reference_image
                .map(Path::to_path_buf)
                .or_else(|| loaded.project.meta.reference_image.clone());
            self.generate_image(loaded, scene_id, reference.as_deref())
                .await?;
        }

        if targets.voice && loaded.project.meta.tts_provider != VoiceProvider::None {
            self.generate_voice(loaded, scene_id).await?;
        }

        loaded
            .save()
            .map_err(|e| StoryreelError::project(e.to_string()))?;
        Ok(())
    }

    async fn generate_image(
        &self,
        loaded: &mut LoadedProject,
        scene_id: u32,
        reference: Option<&Path>,
    ) -> StoryreelResult<()> {
        let (width, height) = (loaded.project.width, loaded.project.height);
        let scene = scene_ref(loaded, scene_id)?;
        let prompt = scene
            .image_prompt
            .clone()
            .unwrap_or_else(|| scene.paragraph_text.clone());
        let relative = PathBuf::from(ASSETS_DIR).join(format!("{}.jpg", scene.asset_stem()));

        let mut request = ImageRequest::new(prompt, width, height);
        request.reference = reference.map(|r| loaded.resolve(r));
        request.reference_strength = self.reference_strength;

        let image = self
            .call("image generation", self.images.generate(&request))
            .await?;
        let image = fit_to_size(image, width, height);

        let absolute = loaded.resolve(&relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        image.to_rgb8().save(&absolute)?;
        tracing::debug!(scene_id, path = %absolute.display(), "Image written");

        if let Some(scene) = loaded.project.scene_mut(scene_id) {
            scene.image_path = Some(relative);
        }
        Ok(())
    }

    async fn generate_voice(&self, loaded: &mut LoadedProject, scene_id: u32) -> StoryreelResult<()> {
        let synthesizer = self.speech.as_ref().ok_or_else(|| {
            StoryreelError::config(format!(
                "Project uses voice provider '{}' but no synthesizer is configured",
                loaded.project.meta.tts_provider
            ))
        })?;
        let scene = scene_ref(loaded, scene_id)?;
        let text = scene.paragraph_text.clone();
        let voice = scene.voice.clone().unwrap_or_default();
        let relative = PathBuf::from(ASSETS_DIR).join(format!("{}.mp3", scene.asset_stem()));
        let absolute = loaded.resolve(&relative);

        self.call(
            "speech synthesis",
            synthesizer.synthesize(&text, &voice, &absolute),
        )
        .await?;
        tracing::debug!(scene_id, path = %absolute.display(), "Voice-over written");

        if let Some(scene) = loaded.project.scene_mut(scene_id) {
            scene.voiceover_path = Some(relative);
        }
        Ok(())
    }

    async fn call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = StoryreelResult<T>>,
    ) -> StoryreelResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoryreelError::generation(format!(
                "{what} timed out after {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

fn scene_ref(loaded: &LoadedProject, scene_id: u32) -> StoryreelResult<&Scene> {
    loaded
        .project
        .scene(scene_id)
        .ok_or_else(|| StoryreelError::project(format!("Scene {scene_id} not found")))
}

/// Per-scene voice spec for `provider`, based on the requested voice.
fn voice_for(provider: VoiceProvider, requested: &VoiceSpec) -> VoiceSpec {
    match provider {
        VoiceProvider::None => VoiceSpec::none(),
        VoiceProvider::Azure => VoiceSpec {
            provider,
            ..requested.clone()
        },
        VoiceProvider::ElevenLabs => VoiceSpec {
            provider,
            voice_name_or_id: requested.voice_name_or_id.clone(),
            ..VoiceSpec::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::PlaceholderImageGenerator;
    use crate::story::Story;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedStory(Vec<&'static str>);

    #[async_trait]
    impl StoryGenerator for FixedStory {
        async fn generate(&self, request: &StoryRequest) -> StoryreelResult<Story> {
            Ok(Story {
                hook: request.title.clone(),
                paragraphs: self.0.iter().map(|p| p.to_string()).collect(),
                ..Story::default()
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowStory;

    #[async_trait]
    impl StoryGenerator for SlowStory {
        async fn generate(&self, _request: &StoryRequest) -> StoryreelResult<Story> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Story::default())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Writes a few bytes and records the text it was asked to speak.
    #[derive(Default, Clone)]
    struct RecordingSpeech(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl SpeechSynthesizer for RecordingSpeech {
        async fn synthesize(
            &self,
            text: &str,
            _voice: &VoiceSpec,
            output: &Path,
        ) -> StoryreelResult<PathBuf> {
            self.0.lock().unwrap().push(text.to_string());
            crate::speech::write_audio(output, b"ID3fake").await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn request(voice_provider: VoiceProvider) -> CreateRequest {
        CreateRequest {
            title: "Test".to_string(),
            paragraphs: 2,
            style_prompt: Some("soft pastel".to_string()),
            reference_image: None,
            source_url: None,
            width: 64,
            height: 36,
            image_provider: ImageProvider::Placeholder,
            voice_provider,
            voice: VoiceSpec::none(),
        }
    }

    fn orchestrator(speech: Option<Box<dyn SpeechSynthesizer>>) -> Orchestrator {
        Orchestrator::new(
            Box::new(FixedStory(vec!["The tide goes out.", "The stars come in."])),
            Box::new(PlaceholderImageGenerator::new()),
            speech,
        )
    }

    #[tokio::test]
    async fn test_create_with_placeholder_and_no_voice() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = orchestrator(None)
            .create_project(&request(VoiceProvider::None), dir.path())
            .await
            .unwrap();

        let reloaded = LoadedProject::load(dir.path()).unwrap();
        assert_eq!(reloaded.project, loaded.project);
        let project = reloaded.project;
        assert_eq!(project.scenes.len(), 2);
        for (i, scene) in project.scenes.iter().enumerate() {
            assert_eq!(scene.scene_id, i as u32 + 1);
            assert_eq!(scene.duration_sec, Some(6.0));
            assert!(scene.voiceover_path.is_none());
            let image = scene.image_path.as_ref().unwrap();
            assert_eq!(image, &PathBuf::from(format!("assets/scene_{:02}.jpg", i + 1)));
            let decoded = image::open(dir.path().join(image)).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (64, 36));
            assert!(scene
                .image_prompt
                .as_deref()
                .unwrap()
                .contains("Style: soft pastel."));
        }
        assert_eq!(project.meta.slug, "test");
        assert_eq!(project.output_video_path, Some(PathBuf::from("test.mp4")));
        assert_eq!(project.total_duration(), 12.0);
    }

    #[tokio::test]
    async fn test_short_story_is_padded_to_requested_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(
            Box::new(FixedStory(vec!["Only one paragraph came back."])),
            Box::new(PlaceholderImageGenerator::new()),
            None,
        );
        let mut req = request(VoiceProvider::None);
        req.paragraphs = 3;

        let loaded = orch.create_project(&req, dir.path()).await.unwrap();
        let scenes = &loaded.project.scenes;
        assert_eq!(scenes.len(), 3);
        assert_eq!(
            scenes.iter().map(|s| s.scene_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(scenes
            .iter()
            .all(|s| s.paragraph_text == "Only one paragraph came back."));
        assert!(scenes.iter().all(|s| s.image_path.is_some()));
    }

    #[tokio::test]
    async fn test_long_story_is_truncated_to_requested_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(VoiceProvider::None);
        req.paragraphs = 1;

        let loaded = orchestrator(None).create_project(&req, dir.path()).await.unwrap();
        assert_eq!(loaded.project.scenes.len(), 1);
        assert_eq!(loaded.project.scenes[0].paragraph_text, "The tide goes out.");
    }

    #[tokio::test]
    async fn test_create_with_voice_writes_mp3_per_scene() {
        let dir = tempfile::tempdir().unwrap();
        let speech = RecordingSpeech::default();
        let spoken = speech.0.clone();
        let mut req = request(VoiceProvider::Azure);
        req.voice = VoiceSpec {
            provider: VoiceProvider::Azure,
            voice_name_or_id: "en-US-JennyNeural".to_string(),
            style: Some("calm".to_string()),
            ..VoiceSpec::default()
        };

        let loaded = orchestrator(Some(Box::new(speech)))
            .create_project(&req, dir.path())
            .await
            .unwrap();

        assert_eq!(
            *spoken.lock().unwrap(),
            vec!["The tide goes out.", "The stars come in."]
        );
        let scene = &loaded.project.scenes[1];
        assert_eq!(
            scene.voiceover_path,
            Some(PathBuf::from("assets/scene_02.mp3"))
        );
        assert!(dir.path().join("assets/scene_02.mp3").is_file());
        assert_eq!(scene.voice.as_ref().unwrap().style.as_deref(), Some("calm"));
    }

    #[tokio::test]
    async fn test_voice_provider_without_synthesizer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(None)
            .create_project(&request(VoiceProvider::ElevenLabs), dir.path())
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert!(!dir.path().join("project.json").exists());
    }

    #[tokio::test]
    async fn test_story_timeout_is_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(
            Box::new(SlowStory),
            Box::new(PlaceholderImageGenerator::new()),
            None,
        )
        .with_timeout(Duration::from_millis(20));
        let err = orch
            .create_project(&request(VoiceProvider::None), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryreelError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_regenerate_image_updates_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(None);
        orch.create_project(&request(VoiceProvider::None), dir.path())
            .await
            .unwrap();

        let mut loaded = LoadedProject::load(dir.path()).unwrap();
        orch.regenerate(&mut loaded, 2, RegenTargets::BOTH, Some("charcoal"), None)
            .await
            .unwrap();

        let reloaded = LoadedProject::load(dir.path()).unwrap();
        let scene = reloaded.project.scene(2).unwrap();
        assert!(scene
            .image_prompt
            .as_deref()
            .unwrap()
            .contains("Style: charcoal."));
        assert!(scene.voiceover_path.is_none());
        let untouched = reloaded.project.scene(1).unwrap();
        assert!(untouched
            .image_prompt
            .as_deref()
            .unwrap()
            .contains("Style: soft pastel."));
    }

    #[tokio::test]
    async fn test_asset_only_orchestrator_cannot_create() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::for_assets(Box::new(PlaceholderImageGenerator::new()), None);
        let err = orch
            .create_project(&request(VoiceProvider::None), dir.path())
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_regenerate_unknown_scene() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(None);
        let mut loaded = orch
            .create_project(&request(VoiceProvider::None), dir.path())
            .await
            .unwrap();
        assert!(orch
            .regenerate(&mut loaded, 9, RegenTargets::BOTH, None, None)
            .await
            .is_err());
    }

    #[test]
    fn test_regen_targets_parse() {
        assert_eq!("both".parse::<RegenTargets>().unwrap(), RegenTargets::BOTH);
        assert_eq!(
            "image".parse::<RegenTargets>().unwrap(),
            RegenTargets {
                image: true,
                voice: false
            }
        );
        assert_eq!(
            " voice , image ".parse::<RegenTargets>().unwrap(),
            RegenTargets::BOTH
        );
        assert!("music".parse::<RegenTargets>().is_err());
        assert!("".parse::<RegenTargets>().is_err());
    }

    #[test]
    fn test_voice_for_provider() {
        let requested = VoiceSpec {
            provider: VoiceProvider::Azure,
            voice_name_or_id: "voice".to_string(),
            style: Some("cheerful".to_string()),
            ..VoiceSpec::default()
        };
        assert_eq!(voice_for(VoiceProvider::None, &requested), VoiceSpec::none());
        let eleven = voice_for(VoiceProvider::ElevenLabs, &requested);
        assert_eq!(eleven.provider, VoiceProvider::ElevenLabs);
        assert_eq!(eleven.voice_name_or_id, "voice");
        assert!(eleven.style.is_none());
        assert_eq!(
            voice_for(VoiceProvider::Azure, &requested).style.as_deref(),
            Some("cheerful")
        );
    }
}
