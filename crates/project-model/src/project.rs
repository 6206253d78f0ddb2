//! Project metadata, validation, and persistence.
//!
//! A project is the top-level container that ties together the story
//! metadata, the output canvas, and the ordered scenes. It is written to
//! `project.json` next to the `assets/` directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::{ImageProvider, Scene, VoiceProvider};

/// File name of the persisted project document.
pub const PROJECT_FILE_NAME: &str = "project.json";

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProject {
    /// Story metadata.
    pub meta: ProjectMeta,

    /// Scenes in playback order.
    pub scenes: Vec<Scene>,

    /// Directory holding generated images and voice-overs.
    pub assets_dir: PathBuf,

    /// Where the rendered video is written.
    #[serde(default)]
    pub output_video_path: Option<PathBuf>,

    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Output canvas size in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,

    /// Background music track. Persisted, not mixed by the renderer.
    #[serde(default)]
    pub bg_music_path: Option<PathBuf>,

    /// Named sound effects. Persisted, not mixed by the renderer.
    #[serde(default)]
    pub sfx: Option<BTreeMap<String, PathBuf>>,
}

fn default_fps() -> u32 {
    30
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

/// Story metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub title: String,

    /// Filesystem-friendly form of the title.
    pub slug: String,

    #[serde(default)]
    pub style_prompt: Option<String>,

    /// Image used to steer image-to-image generation.
    #[serde(default)]
    pub reference_image: Option<PathBuf>,

    #[serde(default)]
    pub image_provider: ImageProvider,

    #[serde(default)]
    pub tts_provider: VoiceProvider,

    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ProjectMeta {
    /// Metadata for a new project titled `title`.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            slug: slugify(&title),
            title,
            style_prompt: None,
            reference_image: None,
            image_provider: ImageProvider::default(),
            tts_provider: VoiceProvider::default(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl VideoProject {
    /// Create an empty project with the default frame rate.
    pub fn new(meta: ProjectMeta, assets_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            meta,
            scenes: vec![],
            assets_dir: assets_dir.into(),
            output_video_path: None,
            fps: default_fps(),
            width,
            height,
            bg_music_path: None,
            sfx: None,
        }
    }

    /// Sum of the per-scene render durations.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(Scene::effective_duration).sum()
    }

    /// Look up a scene by its identifier.
    pub fn scene(&self, scene_id: u32) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }

    /// Look up a scene by its identifier for mutation.
    pub fn scene_mut(&mut self, scene_id: u32) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.scene_id == scene_id)
    }

    /// Check structural invariants. Returns human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = vec![];

        if self.width == 0 || self.height == 0 {
            issues.push(format!(
                "Canvas size must be non-zero (got {}x{})",
                self.width, self.height
            ));
        }
        if self.fps == 0 {
            issues.push("Frame rate must be at least 1".to_string());
        }

        for (index, scene) in self.scenes.iter().enumerate() {
            let expected = index as u32 + 1;
            if scene.scene_id != expected {
                issues.push(format!(
                    "Scene at position {expected} has id {} (ids must be 1-based and in playback order)",
                    scene.scene_id
                ));
            }
            if let Some(d) = scene.duration_sec {
                if !d.is_finite() || d <= 0.0 {
                    issues.push(format!("Scene {}: duration {d} must be positive", scene.scene_id));
                }
            }
            for issue in scene.motion.issues() {
                issues.push(format!("Scene {}: {issue}", scene.scene_id));
            }
            for (label, transition) in [
                ("transition_in", &scene.transition_in),
                ("transition_out", &scene.transition_out),
            ] {
                if !transition.duration_sec.is_finite() || transition.duration_sec < 0.0 {
                    issues.push(format!(
                        "Scene {}: {label} duration {} must be non-negative",
                        scene.scene_id, transition.duration_sec
                    ));
                }
            }
        }

        issues
    }

    /// Like [`VideoProject::validate`], but fails on the first batch of issues.
    pub fn ensure_valid(&self) -> Result<(), ProjectError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ProjectError::ValidationError {
                message: issues.join("; "),
            })
        }
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Directory containing `project.json`. Relative asset paths resolve here.
    pub root: PathBuf,

    /// Project document.
    pub project: VideoProject,
}

impl LoadedProject {
    /// Wrap an in-memory project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, project: VideoProject) -> Self {
        Self {
            root: root.into(),
            project,
        }
    }

    /// Load a project from its directory or from the `project.json` path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let (root, project_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(PROJECT_FILE_NAME))
        } else {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, path.to_path_buf())
        };

        let project_json =
            std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
                path: project_path.clone(),
                source: e,
            })?;

        let project: VideoProject =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;

        Ok(Self { root, project })
    }

    /// Path of the persisted project document.
    pub fn project_file(&self) -> PathBuf {
        self.root.join(PROJECT_FILE_NAME)
    }

    /// Save the project document to `project.json` under the root.
    pub fn save(&self) -> Result<(), ProjectError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ProjectError::IoError {
            path: self.root.clone(),
            source: e,
        })?;

        let project_path = self.project_file();
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, project_json).map_err(|e| ProjectError::IoError {
            path: project_path,
            source: e,
        })?;

        Ok(())
    }

    /// Resolve a project-relative path against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute location of the assets directory.
    pub fn assets_dir(&self) -> PathBuf {
        self.resolve(&self.project.assets_dir)
    }

    /// Output video path, defaulting to `<slug>.mp4` in the project root.
    pub fn output_path(&self) -> PathBuf {
        match &self.project.output_video_path {
            Some(path) => self.resolve(path),
            None => self.root.join(format!("{}.mp4", self.project.meta.slug)),
        }
    }

    /// Validate that all referenced asset files exist.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        for scene in &self.project.scenes {
            match &scene.image_path {
                Some(image) => {
                    if !self.resolve(image).exists() {
                        errors.push(format!(
                            "Scene {} image missing: {}",
                            scene.scene_id,
                            image.display()
                        ));
                    }
                }
                None => errors.push(format!("Scene {} has no image", scene.scene_id)),
            }
            if let Some(voice) = &scene.voiceover_path {
                if !self.resolve(voice).exists() {
                    errors.push(format!(
                        "Scene {} voice-over missing: {}",
                        scene.scene_id,
                        voice.display()
                    ));
                }
            }
        }

        if let Some(music) = &self.project.bg_music_path {
            if !self.resolve(music).exists() {
                errors.push(format!("Background music missing: {}", music.display()));
            }
        }

        errors
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

/// Lowercase alphanumerics, every other character becomes `-`, outer dashes trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ImageMotion, Transition, TransitionKind, VoiceSpec};

    fn sample_project() -> VideoProject {
        let mut project = VideoProject::new(ProjectMeta::new("The Quiet Lighthouse"), "assets", 1920, 1080);
        for i in 1..=3 {
            let mut scene = Scene::new(i, format!("Paragraph {i}"));
            scene.duration_sec = Some(5.0);
            project.scenes.push(scene);
        }
        project
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Quiet Lighthouse!"), "the-quiet-lighthouse");
        assert_eq!(slugify("  Test  "), "test");
        assert_eq!(slugify("a/b c"), "a-b-c");
    }

    #[test]
    fn test_slugify_keeps_multi_char_lowercase() {
        assert_eq!(slugify("İstanbul Nights"), "i\u{307}stanbul-nights");
    }

    #[test]
    fn test_project_creation() {
        let project = sample_project();
        assert_eq!(project.meta.slug, "the-quiet-lighthouse");
        assert_eq!(project.fps, 30);
        assert!((project.total_duration() - 15.0).abs() < 1e-9);
        assert!(project.validate().is_empty());
    }

    #[test]
    fn test_total_duration_uses_default_for_unset_scenes() {
        let mut project = sample_project();
        project.scenes[1].duration_sec = None;
        assert!((project.total_duration() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_preserves_optional_fields() {
        let mut project = sample_project();
        project.output_video_path = Some(PathBuf::from("out/video.mp4"));
        project.bg_music_path = None;
        project.sfx = Some(BTreeMap::from([
            ("whoosh".to_string(), PathBuf::from("assets/whoosh.wav")),
            ("bell".to_string(), PathBuf::from("assets/bell.wav")),
        ]));
        project.meta.style_prompt = Some("watercolor".to_string());

        let scene = &mut project.scenes[0];
        scene.image_path = Some(PathBuf::from("assets/scene_01.jpg"));
        scene.image_prompt = Some("a lighthouse at dusk".to_string());
        scene.voiceover_path = Some(PathBuf::from("assets/scene_01.mp3"));
        scene.voice = Some(VoiceSpec {
            rate: Some("+5%".to_string()),
            ..VoiceSpec::default()
        });
        scene.captions = Some(vec![]);
        scene.transition_out = Transition::NONE;

        let json = serde_json::to_string_pretty(&project).unwrap();
        let parsed: VideoProject = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, project);
        assert_eq!(parsed.scenes[0].captions, Some(vec![]));
        assert_eq!(parsed.scenes[1].captions, None);
    }

    #[test]
    fn test_deserialization_applies_defaults() {
        let json = r#"{
            "meta": {"title": "Test", "slug": "test"},
            "scenes": [{"scene_id": 1, "paragraph_text": "Hi"}],
            "assets_dir": "assets"
        }"#;
        let parsed: VideoProject = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.fps, 30);
        assert_eq!((parsed.width, parsed.height), (1920, 1080));
        assert_eq!(parsed.meta.image_provider, ImageProvider::Stability);
        assert_eq!(parsed.meta.tts_provider, VoiceProvider::Azure);
        assert!(parsed.output_video_path.is_none());
    }

    #[test]
    fn test_validate_reports_out_of_order_ids_and_bad_canvas() {
        let mut project = sample_project();
        project.scenes.swap(0, 1);
        project.fps = 0;
        project.width = 0;

        let issues = project.validate();
        assert!(issues.iter().any(|i| i.contains("Frame rate")));
        assert!(issues.iter().any(|i| i.contains("Canvas size")));
        assert!(issues.iter().any(|i| i.contains("position 1 has id 2")));
        assert!(matches!(
            project.ensure_valid(),
            Err(ProjectError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_loaded_project_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = LoadedProject::new(dir.path(), sample_project());
        loaded.save().unwrap();

        let from_dir = LoadedProject::load(dir.path()).unwrap();
        assert_eq!(from_dir.project, loaded.project);

        let from_file = LoadedProject::load(dir.path().join(PROJECT_FILE_NAME)).unwrap();
        assert_eq!(from_file.root, dir.path());
        assert_eq!(from_file.project.scenes.len(), 3);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadedProject::load(dir.path()).unwrap_err();
        assert!(matches!(err, ProjectError::IoError { .. }));
    }

    #[test]
    fn test_resolve_and_output_path() {
        let loaded = LoadedProject::new("/tmp/story", sample_project());
        assert_eq!(
            loaded.resolve("assets/scene_01.jpg"),
            PathBuf::from("/tmp/story/assets/scene_01.jpg")
        );
        assert_eq!(loaded.resolve("/abs/x.jpg"), PathBuf::from("/abs/x.jpg"));
        assert_eq!(loaded.assets_dir(), PathBuf::from("/tmp/story/assets"));
        assert_eq!(
            loaded.output_path(),
            PathBuf::from("/tmp/story/the-quiet-lighthouse.mp4")
        );
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut loaded = LoadedProject::new(dir.path(), sample_project());
        loaded.project.scenes[0].image_path = Some(PathBuf::from("assets/scene_01.jpg"));
        loaded.project.scenes[0].voiceover_path = Some(PathBuf::from("assets/scene_01.mp3"));

        let errors = loaded.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Scene 1 image missing")));
        assert!(errors.iter().any(|e| e.contains("Scene 1 voice-over missing")));
        assert!(errors.iter().any(|e| e.contains("Scene 2 has no image")));
    }

    fn finite_f64() -> impl proptest::strategy::Strategy<Value = f64> {
        proptest::num::f64::NORMAL | proptest::num::f64::SUBNORMAL | proptest::num::f64::ZERO
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip_preserves_floats(
            pan in (finite_f64(), finite_f64()),
            zoom in (finite_f64(), finite_f64()),
            duration in proptest::option::of(finite_f64()),
            fade_in in finite_f64(),
            fade_out in finite_f64(),
        ) {
            let mut project = sample_project();
            let scene = &mut project.scenes[1];
            scene.motion = ImageMotion {
                pan_start: pan.0,
                pan_end: pan.1,
                zoom_start: zoom.0,
                zoom_end: zoom.1,
            };
            scene.duration_sec = duration;
            scene.transition_in = Transition {
                kind: TransitionKind::Fade,
                duration_sec: fade_in,
            };
            scene.transition_out = Transition {
                kind: TransitionKind::Crossfade,
                duration_sec: fade_out,
            };

            let json = serde_json::to_string_pretty(&project).unwrap();
            let parsed: VideoProject = serde_json::from_str(&json).unwrap();
            proptest::prop_assert_eq!(parsed, project);
        }

        #[test]
        fn prop_slug_is_trimmed_lowercase(title in ".{0,40}") {
            let slug = slugify(&title);
            proptest::prop_assert!(!slug.starts_with('-'));
            proptest::prop_assert!(!slug.ends_with('-'));
            proptest::prop_assert!(!slug.chars().any(char::is_whitespace));
            proptest::prop_assert!(!slug.chars().any(char::is_uppercase));
        }
    }
}
