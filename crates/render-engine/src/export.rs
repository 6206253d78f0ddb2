//! Render jobs and the ffmpeg export backend.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use rayon::prelude::*;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_project_model::project::{LoadedProject, VideoProject};

use crate::clip::{ClipAudio, ClipSpec, SceneClip};
use crate::compositor::{resolve_clip_specs, Timeline};

/// Frames sampled in parallel before being piped to the encoder in order.
const FRAME_BATCH: usize = 16;

/// Sample rate of the mixed narration track.
const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// A render job ready to be executed.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Directory relative asset paths resolve against.
    pub project_root: PathBuf,

    pub project: VideoProject,

    /// Destination video file.
    pub output_path: PathBuf,
}

impl RenderJob {
    /// Job for a loaded project, writing to `output` or the project's default.
    pub fn from_loaded(loaded: &LoadedProject, output: Option<PathBuf>) -> Self {
        Self {
            project_root: loaded.root.clone(),
            output_path: output.unwrap_or_else(|| loaded.output_path()),
            project: loaded.project.clone(),
        }
    }
}

/// Progress callback for rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,
    pub frames_rendered: u64,
    pub total_frames: u64,
    pub stage: RenderStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
}

/// Everything a backend needs, resolved and validated up front.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub timeline: Timeline,
    pub clips: Vec<ClipSpec>,
    pub width: u32,
    pub height: u32,
}

/// Trait for render backends.
pub trait RenderBackend: Send {
    /// Encode `plan` into `output`.
    fn render(
        &mut self,
        job: &RenderJob,
        plan: &RenderPlan,
        output: &Path,
        progress: Option<&ProgressCallback>,
    ) -> StoryreelResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Validate a job and build its plan. Touches nothing on disk.
pub fn plan_render(job: &RenderJob) -> StoryreelResult<RenderPlan> {
    let project = &job.project;
    if project.scenes.is_empty() {
        return Err(StoryreelError::render("Project has no scenes to render"));
    }
    project
        .ensure_valid()
        .map_err(|e| StoryreelError::render(e.to_string()))?;
    if project.width % 2 != 0 || project.height % 2 != 0 {
        return Err(StoryreelError::render(format!(
            "Canvas {}x{} must have even dimensions for yuv420p output",
            project.width, project.height
        )));
    }

    let clips = resolve_clip_specs(project, &job.project_root)?;
    let timeline = Timeline::from_project(project)?;

    Ok(RenderPlan {
        timeline,
        clips,
        width: project.width,
        height: project.height,
    })
}

/// Render the project to `job.output_path` and return that path.
///
/// Preconditions are checked before anything is written. Encoding goes to a
/// sibling temporary file that is renamed into place only on success.
pub fn render_project(
    job: &RenderJob,
    progress: Option<ProgressCallback>,
) -> StoryreelResult<PathBuf> {
    tracing::info!(
        output = %job.output_path.display(),
        scenes = job.project.scenes.len(),
        width = job.project.width,
        height = job.project.height,
        fps = job.project.fps,
        "Starting render"
    );

    let plan = plan_render(job)?;

    let mut backend: Box<dyn RenderBackend> = Box::new(FfmpegBackend::new());
    if !backend.is_available() {
        return Err(StoryreelError::unsupported(
            "No supported render backend found (expected ffmpeg in PATH)",
        ));
    }
    tracing::info!(backend = backend.name(), "Using render backend");

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let partial = partial_output_path(&job.output_path);
    match backend.render(job, &plan, &partial, progress.as_ref()) {
        Ok(()) => {
            std::fs::rename(&partial, &job.output_path)?;
        }
        Err(err) => {
            if partial.exists() {
                if let Err(cleanup) = std::fs::remove_file(&partial) {
                    tracing::warn!(
                        path = %partial.display(),
                        error = %cleanup,
                        "Failed to remove partial output"
                    );
                }
            }
            return Err(err);
        }
    }

    if let Some(cb) = &progress {
        cb(RenderProgress {
            progress: 1.0,
            frames_rendered: plan.timeline.total_frames,
            total_frames: plan.timeline.total_frames,
            stage: RenderStage::Complete,
        });
    }

    tracing::info!(output = %job.output_path.display(), "Render complete");
    Ok(job.output_path.clone())
}

/// Async entry point; rendering runs on the blocking pool.
pub async fn export_project(
    job: RenderJob,
    progress: Option<ProgressCallback>,
) -> StoryreelResult<PathBuf> {
    tokio::task::spawn_blocking(move || render_project(&job, progress))
        .await
        .map_err(|e| StoryreelError::render(format!("Render task failed: {e}")))?
}

/// `dir/.name.partial.ext`, keeping the extension so ffmpeg picks the muxer.
fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    output.with_file_name(name)
}

/// Renders frames in-process and pipes raw RGB into an ffmpeg subprocess.
struct FfmpegBackend;

impl FfmpegBackend {
    fn new() -> Self {
        Self
    }

    fn spawn(&self, args: &[String]) -> StoryreelResult<(Child, ChildStdin)> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StoryreelError::render(format!("Failed to start ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoryreelError::render("Failed to open ffmpeg stdin"))?;
        Ok((child, stdin))
    }

    fn write_frames(
        &self,
        job: &RenderJob,
        plan: &RenderPlan,
        stdin: &mut ChildStdin,
        progress: Option<&ProgressCallback>,
    ) -> StoryreelResult<()> {
        let fps = plan.timeline.fps;
        let total_frames = plan.timeline.total_frames;
        let mut frames_rendered = 0u64;

        for entry in &plan.timeline.entries {
            let scene = &job.project.scenes[entry.scene_index];
            let spec = plan.clips[entry.scene_index].clone();
            let clip = SceneClip::from_spec(spec, scene, plan.width, plan.height)?;

            let frames: Vec<u64> = (entry.start_frame..entry.end_frame).collect();
            for batch in frames.chunks(FRAME_BATCH) {
                let rendered: Vec<_> = batch
                    .par_iter()
                    .map(|&frame| clip.frame_at(entry.local_time(frame, fps)))
                    .collect();
                for frame in &rendered {
                    stdin.write_all(frame.as_raw()).map_err(|e| {
                        StoryreelError::render(format!("Failed to write frame to ffmpeg: {e}"))
                    })?;
                }

                frames_rendered += batch.len() as u64;
                if let Some(cb) = progress {
                    cb(RenderProgress {
                        progress: frames_rendered as f64 / total_frames.max(1) as f64,
                        frames_rendered,
                        total_frames,
                        stage: RenderStage::Rendering,
                    });
                }
            }
            tracing::debug!(
                scene_id = entry.scene_id,
                frames = entry.frame_count(),
                start_secs = entry.start_secs,
                end_secs = entry.end_secs(),
                "Scene frames written"
            );
        }
        Ok(())
    }
}

impl RenderBackend for FfmpegBackend {
    fn render(
        &mut self,
        job: &RenderJob,
        plan: &RenderPlan,
        output: &Path,
        progress: Option<&ProgressCallback>,
    ) -> StoryreelResult<()> {
        let started = std::time::Instant::now();
        if let Some(cb) = progress {
            cb(RenderProgress {
                progress: 0.0,
                frames_rendered: 0,
                total_frames: plan.timeline.total_frames,
                stage: RenderStage::Preparing,
            });
        }

        let args = ffmpeg_args(plan, output);
        let (mut child, mut stdin) = self.spawn(&args)?;
        tracing::info!(
            pid = child.id(),
            total_frames = plan.timeline.total_frames,
            duration_secs = plan.timeline.total_secs,
            "ffmpeg process started"
        );

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StoryreelError::render("Failed to capture ffmpeg stderr"))?;
        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let written = self.write_frames(job, plan, &mut stdin, progress);
        drop(stdin);

        if let Some(cb) = progress {
            cb(RenderProgress {
                progress: 1.0,
                frames_rendered: plan.timeline.total_frames,
                total_frames: plan.timeline.total_frames,
                stage: RenderStage::Finalizing,
            });
        }

        if written.is_err() {
            // The encoder may still be waiting on input that will never arrive.
            let _ = child.kill();
        }
        let status = child
            .wait()
            .map_err(|e| StoryreelError::render(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if let Err(err) = written {
            let detail = stderr_output.trim();
            if detail.is_empty() {
                return Err(err);
            }
            return Err(StoryreelError::render(format!("{err}; ffmpeg: {detail}")));
        }
        if !status.success() {
            return Err(StoryreelError::render(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Encoding finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Full ffmpeg argument list: raw frames on stdin, one input per voice-over.
fn ffmpeg_args(plan: &RenderPlan, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", plan.width, plan.height));
    args.push("-framerate".to_string());
    args.push(plan.timeline.fps.to_string());
    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    let audio: Vec<Option<&ClipAudio>> = plan.clips.iter().map(|c| c.audio.as_ref()).collect();
    for clip in audio.iter().flatten() {
        args.push("-i".to_string());
        args.push(clip.path.to_string_lossy().into_owned());
    }

    match narration_filter(&plan.timeline, &audio) {
        Some(graph) => {
            args.extend([
                "-filter_complex".to_string(),
                graph,
                "-map".to_string(),
                "0:v".to_string(),
                "-map".to_string(),
                "[aout]".to_string(),
            ]);
        }
        None => args.push("-an".to_string()),
    }

    args.extend(codec_args(plan.timeline.fps));
    args.push("-t".to_string());
    args.push(format!("{:.3}", plan.timeline.total_secs));
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Audio graph concatenating one segment per scene.
///
/// Voiced scenes are trimmed or padded to the scene duration and faded with
/// the scene's transitions; silent scenes get generated silence. Returns
/// `None` when no scene has a voice-over.
fn narration_filter(timeline: &Timeline, audio: &[Option<&ClipAudio>]) -> Option<String> {
    if audio.iter().all(Option::is_none) {
        return None;
    }

    let mut parts = Vec::with_capacity(timeline.entries.len() + 1);
    let mut labels = String::new();
    let mut input_index = 1usize;

    for (k, entry) in timeline.entries.iter().enumerate() {
        let d = entry.duration_secs;
        let segment = match audio.get(entry.scene_index).copied().flatten() {
            Some(clip) => {
                let mut chain = format!(
                    "[{input_index}:a]aresample={AUDIO_SAMPLE_RATE},\
                     aformat=sample_fmts=fltp:channel_layouts=stereo,\
                     atrim=end={d:.3},asetpts=PTS-STARTPTS,apad=whole_dur={d:.3}"
                );
                input_index += 1;
                if let Some(fade) = clip.fade_in_secs {
                    chain.push_str(&format!(",afade=t=in:st=0:d={fade:.3}"));
                }
                if let Some(fade) = clip.fade_out_secs {
                    let start = (d - fade).max(0.0);
                    chain.push_str(&format!(",afade=t=out:st={start:.3}:d={fade:.3}"));
                }
                chain
            }
            None => format!(
                "anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo,atrim=duration={d:.3},\
                 aformat=sample_fmts=fltp:channel_layouts=stereo"
            ),
        };
        parts.push(format!("{segment}[a{k}]"));
        labels.push_str(&format!("[a{k}]"));
    }

    parts.push(format!(
        "{labels}concat=n={}:v=0:a=1[aout]",
        timeline.entries.len()
    ));
    Some(parts.join(";"))
}

fn codec_args(fps: u32) -> Vec<String> {
    [
        "-c:v",
        "libx264",
        "-preset",
        "medium",
        "-profile:v",
        "high",
        "-pix_fmt",
        "yuv420p",
        "-r",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(fps.to_string()))
    .chain(
        ["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"]
            .iter()
            .map(|s| s.to_string()),
    )
    .collect()
}

/// Whether `binary -version` runs successfully.
pub fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
