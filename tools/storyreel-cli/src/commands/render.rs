//! Render a project to video.

use std::path::PathBuf;

pub async fn run(path: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let loaded = super::load_project(&path)?;
    println!(
        "Project: {} ({} scenes, {:.1}s @ {}fps, {}x{})",
        loaded.project.meta.title,
        loaded.project.scenes.len(),
        loaded.project.total_duration(),
        loaded.project.fps,
        loaded.project.width,
        loaded.project.height
    );
    super::render_loaded(&loaded, output).await?;
    Ok(())
}
