pub mod check;
pub mod create;
pub mod info;
pub mod regen;
pub mod render;
pub mod validate;

use std::io::Write;
use std::path::{Path, PathBuf};

use storyreel_project_model::LoadedProject;
use storyreel_render_engine::export::{export_project, ProgressCallback, RenderJob, RenderStage};

pub(crate) fn load_project(path: &Path) -> anyhow::Result<LoadedProject> {
    LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))
}

/// Make `path` absolute against the working directory and require it to exist.
///
/// Projects store reference images as given, so relative paths would break
/// once the project is opened from elsewhere.
pub(crate) fn existing_absolute(path: &Path) -> anyhow::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    if !absolute.exists() {
        anyhow::bail!("File not found: {}", absolute.display());
    }
    Ok(absolute)
}

/// Render a loaded project, printing progress, and return the video path.
pub(crate) async fn render_loaded(
    loaded: &LoadedProject,
    output: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let job = RenderJob::from_loaded(loaded, output);
    println!("Rendering to: {}", job.output_path.display());

    let progress_cb: ProgressCallback = Box::new(|p| {
        if p.stage == RenderStage::Rendering {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
            );
            std::io::stdout().flush().ok();
        }
    });

    let result = export_project(job, Some(progress_cb)).await;
    println!();
    let output = result.map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
    println!("Render complete: {}", output.display());
    Ok(output)
}
