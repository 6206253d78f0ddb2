//! Scene clip construction.
//!
//! A [`SceneClip`] pairs a Ken Burns sampler with the scene's duration,
//! fades, and optional voice-over.

use std::path::{Path, PathBuf};

use image::RgbImage;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::scene::Scene;

use crate::motion::KenBurns;

/// Voice-over attached to a clip.
///
/// `duration_secs` always equals the clip duration: longer audio is
/// truncated and shorter audio is padded with silence at encode time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipAudio {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub fade_in_secs: Option<f64>,
    pub fade_out_secs: Option<f64>,
}

/// Audio side of a clip, resolved without decoding the still.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    pub scene_id: u32,
    pub duration_secs: f64,
    pub fade_in_secs: Option<f64>,
    pub fade_out_secs: Option<f64>,
    pub image_path: PathBuf,
    pub audio: Option<ClipAudio>,
}

impl ClipSpec {
    /// Resolve a scene's clip parameters. Relative paths resolve under `root`.
    ///
    /// Fails when the scene has no image, or when a referenced file is missing.
    pub fn from_scene(scene: &Scene, root: &Path) -> StoryreelResult<Self> {
        let image = scene.image_path.as_ref().ok_or_else(|| {
            StoryreelError::render(format!(
                "Scene {} has no image; generate or set image_path before rendering",
                scene.scene_id
            ))
        })?;
        let image_path = resolve(root, image);
        if !image_path.is_file() {
            return Err(StoryreelError::FileNotFound { path: image_path });
        }

        let duration_secs = scene.effective_duration();
        let fade_in_secs = scene.transition_in.fade_secs();
        let fade_out_secs = scene.transition_out.fade_secs();

        let audio = match &scene.voiceover_path {
            Some(voice) => {
                let path = resolve(root, voice);
                if !path.is_file() {
                    return Err(StoryreelError::FileNotFound { path });
                }
                Some(ClipAudio {
                    path,
                    duration_secs,
                    fade_in_secs,
                    fade_out_secs,
                })
            }
            None => None,
        };

        Ok(Self {
            scene_id: scene.scene_id,
            duration_secs,
            fade_in_secs,
            fade_out_secs,
            image_path,
            audio,
        })
    }
}

/// A renderable scene: motion, timing, fades and voice-over.
#[derive(Debug, Clone)]
pub struct SceneClip {
    spec: ClipSpec,
    motion: KenBurns,
}

impl SceneClip {
    /// Build a clip for `scene` on a `canvas_width x canvas_height` canvas.
    pub fn build(
        scene: &Scene,
        root: &Path,
        canvas_width: u32,
        canvas_height: u32,
    ) -> StoryreelResult<Self> {
        let spec = ClipSpec::from_scene(scene, root)?;
        Self::from_spec(spec, scene, canvas_width, canvas_height)
    }

    /// Decode the still for an already-resolved spec.
    pub fn from_spec(
        spec: ClipSpec,
        scene: &Scene,
        canvas_width: u32,
        canvas_height: u32,
    ) -> StoryreelResult<Self> {
        let still = image::open(&spec.image_path)?;
        let motion = KenBurns::new(&still, canvas_width, canvas_height, scene.motion)?;
        tracing::debug!(
            scene_id = spec.scene_id,
            duration_secs = spec.duration_secs,
            scaled = ?motion.scaled_size(),
            "Scene clip ready"
        );
        Ok(Self { spec, motion })
    }

    pub fn scene_id(&self) -> u32 {
        self.spec.scene_id
    }

    pub fn duration_secs(&self) -> f64 {
        self.spec.duration_secs
    }

    pub fn audio(&self) -> Option<&ClipAudio> {
        self.spec.audio.as_ref()
    }

    pub fn spec(&self) -> &ClipSpec {
        &self.spec
    }

    /// Opacity at `t` seconds into the clip.
    pub fn opacity_at(&self, t: f64) -> f32 {
        fade_opacity(
            t,
            self.spec.duration_secs,
            self.spec.fade_in_secs,
            self.spec.fade_out_secs,
        )
    }

    /// Render the frame at `t` seconds into the clip, faded toward black.
    pub fn frame_at(&self, t: f64) -> RgbImage {
        let mut frame = self.motion.frame_at(t, self.spec.duration_secs);
        let opacity = self.opacity_at(t);
        if opacity < 1.0 {
            for pixel in frame.pixels_mut() {
                pixel.0 = pixel.0.map(|c| (c as f32 * opacity).round() as u8);
            }
        }
        frame
    }
}

/// Product of the fade-in ramp and the fade-out ramp, in `[0, 1]`.
pub fn fade_opacity(t: f64, duration: f64, fade_in: Option<f64>, fade_out: Option<f64>) -> f32 {
    let mut opacity = 1.0f64;
    if let Some(fade) = fade_in {
        opacity *= (t / fade).clamp(0.0, 1.0);
    }
    if let Some(fade) = fade_out {
        opacity *= ((duration - t) / fade).clamp(0.0, 1.0);
    }
    if opacity.is_nan() {
        return 1.0;
    }
    opacity as f32
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use storyreel_project_model::scene::Transition;

    fn write_still(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(64, 36, Rgb(color)).save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_image_path_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let scene = Scene::new(1, "No picture yet");
        let err = SceneClip::build(&scene, dir.path(), 32, 18).unwrap_err();
        assert!(matches!(err, StoryreelError::Render { .. }));
    }

    #[test]
    fn test_missing_voiceover_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_still(dir.path(), "a.png", [10, 20, 30]);
        let mut scene = Scene::new(1, "Quiet");
        scene.image_path = Some(PathBuf::from("a.png"));
        scene.voiceover_path = Some(PathBuf::from("missing.mp3"));
        let err = ClipSpec::from_scene(&scene, dir.path()).unwrap_err();
        assert!(matches!(err, StoryreelError::FileNotFound { .. }));
    }

    #[test]
    fn test_default_scene_clip() {
        let dir = tempfile::tempdir().unwrap();
        write_still(dir.path(), "a.png", [200, 100, 50]);
        let mut scene = Scene::new(1, "A lighthouse at dusk");
        scene.image_path = Some(PathBuf::from("a.png"));

        let clip = SceneClip::build(&scene, dir.path(), 32, 18).unwrap();
        assert_eq!(clip.duration_secs(), 6.0);
        assert!(clip.audio().is_none());
        assert_eq!(clip.frame_at(3.0).dimensions(), (32, 18));
    }

    #[test]
    fn test_audio_follows_clip_duration() {
        let dir = tempfile::tempdir().unwrap();
        write_still(dir.path(), "a.png", [1, 2, 3]);
        std::fs::write(dir.path().join("voice.mp3"), b"not really audio").unwrap();
        let mut scene = Scene::new(2, "Narrated");
        scene.image_path = Some(PathBuf::from("a.png"));
        scene.voiceover_path = Some(PathBuf::from("voice.mp3"));
        scene.duration_sec = Some(4.5);

        let spec = ClipSpec::from_scene(&scene, dir.path()).unwrap();
        let audio = spec.audio.unwrap();
        assert_eq!(audio.duration_secs, 4.5);
        assert_eq!(audio.fade_in_secs, Some(0.6));
        assert_eq!(audio.path, dir.path().join("voice.mp3"));
    }

    #[test]
    fn test_fades_dim_clip_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_still(dir.path(), "a.png", [200, 200, 200]);
        let mut scene = Scene::new(1, "Fades");
        scene.image_path = Some(PathBuf::from("a.png"));

        let clip = SceneClip::build(&scene, dir.path(), 32, 18).unwrap();
        assert_eq!(clip.opacity_at(0.0), 0.0);
        assert!((clip.opacity_at(0.3) - 0.5).abs() < 1e-6);
        assert_eq!(clip.opacity_at(3.0), 1.0);
        assert_eq!(clip.opacity_at(6.0), 0.0);

        let black = clip.frame_at(0.0);
        assert!(black.pixels().all(|p| p.0 == [0, 0, 0]));
        let mid = clip.frame_at(3.0);
        assert!(mid.pixels().all(|p| p.0[0] > 150));
    }

    #[test]
    fn test_no_transition_keeps_full_opacity() {
        let dir = tempfile::tempdir().unwrap();
        write_still(dir.path(), "a.png", [90, 90, 90]);
        let mut scene = Scene::new(1, "Hard cut");
        scene.image_path = Some(PathBuf::from("a.png"));
        scene.transition_in = Transition::NONE;
        scene.transition_out = Transition::NONE;

        let clip = SceneClip::build(&scene, dir.path(), 32, 18).unwrap();
        assert_eq!(clip.opacity_at(0.0), 1.0);
        assert_eq!(clip.opacity_at(6.0), 1.0);
    }

    #[test]
    fn test_fade_opacity_short_clip() {
        // Fades longer than half the clip overlap; opacity never exceeds the smaller ramp.
        let o = fade_opacity(0.5, 1.0, Some(0.6), Some(0.6));
        assert!(o < 0.84 && o > 0.0);
    }
}
