//! Validate a StoryReel project.

use std::path::PathBuf;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let loaded = super::load_project(&path)?;
    let p = &loaded.project;

    println!("  Title: {}", p.meta.title);
    println!("  Canvas: {}x{} @ {}fps", p.width, p.height, p.fps);
    println!("  Scenes: {}", p.scenes.len());

    let mut issues = p.validate();
    issues.extend(loaded.validate_sources());

    if issues.is_empty() {
        println!("  Sources: All present");
        println!("\nProject is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}
