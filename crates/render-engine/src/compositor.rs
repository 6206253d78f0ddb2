//! Timeline composition.
//!
//! Scenes are laid end to end in document order. Each scene owns the frame
//! range `[round(start * fps), round(end * fps))`, so ranges never overlap
//! and the last frame index is `round(total * fps) - 1`.

use std::path::Path;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::project::VideoProject;

use crate::clip::ClipSpec;

/// One scene's slot on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Index into `VideoProject::scenes`.
    pub scene_index: usize,
    pub scene_id: u32,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// First frame owned by this scene.
    pub start_frame: u64,
    /// One past the last frame owned by this scene.
    pub end_frame: u64,
}

impl TimelineEntry {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame
    }

    /// Seconds into the scene for a global frame index.
    pub fn local_time(&self, frame: u64, fps: u32) -> f64 {
        let t = frame as f64 / fps as f64 - self.start_secs;
        t.clamp(0.0, self.duration_secs)
    }
}

/// Ordered concatenation of scene clips.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub fps: u32,
    pub entries: Vec<TimelineEntry>,
    pub total_secs: f64,
    pub total_frames: u64,
}

impl Timeline {
    pub fn from_project(project: &VideoProject) -> StoryreelResult<Self> {
        Self::from_durations(
            project.fps,
            project
                .scenes
                .iter()
                .map(|s| (s.scene_id, s.effective_duration())),
        )
    }

    /// Build from `(scene_id, duration)` pairs in playback order.
    pub fn from_durations(
        fps: u32,
        durations: impl IntoIterator<Item = (u32, f64)>,
    ) -> StoryreelResult<Self> {
        if fps == 0 {
            return Err(StoryreelError::render("fps must be positive"));
        }

        let mut entries = Vec::new();
        let mut cursor = 0.0f64;
        for (scene_index, (scene_id, duration_secs)) in durations.into_iter().enumerate() {
            if !(duration_secs.is_finite() && duration_secs > 0.0) {
                return Err(StoryreelError::render(format!(
                    "Scene {scene_id} has invalid duration {duration_secs}"
                )));
            }
            let start_secs = cursor;
            cursor += duration_secs;
            entries.push(TimelineEntry {
                scene_index,
                scene_id,
                start_secs,
                duration_secs,
                start_frame: frame_index(start_secs, fps),
                end_frame: frame_index(cursor, fps),
            });
        }

        if entries.is_empty() {
            return Err(StoryreelError::render("Project has no scenes to render"));
        }

        Ok(Self {
            fps,
            total_frames: frame_index(cursor, fps),
            total_secs: cursor,
            entries,
        })
    }

    /// Entry owning a global frame index.
    pub fn entry_for_frame(&self, frame: u64) -> Option<&TimelineEntry> {
        self.entries
            .iter()
            .find(|e| frame >= e.start_frame && frame < e.end_frame)
    }
}

fn frame_index(secs: f64, fps: u32) -> u64 {
    (secs * fps as f64).round() as u64
}

/// Resolve every scene's clip inputs without decoding media.
///
/// Run before any output file is created so a missing image or voice-over
/// fails the render up front.
pub fn resolve_clip_specs(project: &VideoProject, root: &Path) -> StoryreelResult<Vec<ClipSpec>> {
    project
        .scenes
        .iter()
        .map(|scene| ClipSpec::from_scene(scene, root))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_project_model::project::ProjectMeta;
    use storyreel_project_model::scene::Scene;

    #[test]
    fn test_three_five_second_scenes() {
        let timeline = Timeline::from_durations(30, [(1, 5.0), (2, 5.0), (3, 5.0)]).unwrap();
        assert_eq!(timeline.total_secs, 15.0);
        assert_eq!(timeline.total_frames, 450);
        let ranges: Vec<_> = timeline
            .entries
            .iter()
            .map(|e| (e.start_frame, e.end_frame))
            .collect();
        assert_eq!(ranges, vec![(0, 150), (150, 300), (300, 450)]);
    }

    #[test]
    fn test_frame_ranges_tile_without_gaps() {
        let timeline =
            Timeline::from_durations(24, [(1, 1.01), (2, 2.333), (3, 0.5), (4, 4.2)]).unwrap();
        let mut expected_start = 0;
        for entry in &timeline.entries {
            assert_eq!(entry.start_frame, expected_start);
            expected_start = entry.end_frame;
        }
        assert_eq!(expected_start, timeline.total_frames);
    }

    #[test]
    fn test_entry_lookup_and_local_time() {
        let timeline = Timeline::from_durations(10, [(1, 2.0), (2, 3.0)]).unwrap();
        let entry = timeline.entry_for_frame(25).unwrap();
        assert_eq!(entry.scene_id, 2);
        assert_eq!((entry.start_secs, entry.end_secs()), (2.0, 5.0));
        assert!((entry.local_time(25, 10) - 0.5).abs() < 1e-9);
        assert!(timeline.entry_for_frame(50).is_none());
    }

    #[test]
    fn test_project_defaults_to_six_seconds_per_scene() {
        let mut project = VideoProject::new(ProjectMeta::new("Night"), "assets", 640, 360);
        project.scenes = vec![Scene::new(1, "a"), Scene::new(2, "b")];
        let timeline = Timeline::from_project(&project).unwrap();
        assert_eq!(timeline.total_secs, 12.0);
        assert_eq!(timeline.total_frames, 360);
    }

    #[test]
    fn test_rejects_empty_and_bad_input() {
        assert!(Timeline::from_durations(30, []).is_err());
        assert!(Timeline::from_durations(0, [(1, 1.0)]).is_err());
        assert!(Timeline::from_durations(30, [(1, 0.0)]).is_err());
    }
}
