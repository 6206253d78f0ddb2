//! Show project information.

use std::path::PathBuf;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let loaded = super::load_project(&path)?;
    let p = &loaded.project;

    println!("Project: {}", p.meta.title);
    println!("  Slug: {}", p.meta.slug);
    if let Some(created) = &p.meta.created_at {
        println!("  Created: {created}");
    }
    if let Some(style) = &p.meta.style_prompt {
        println!("  Style: {style}");
    }
    if let Some(reference) = &p.meta.reference_image {
        println!("  Reference image: {}", reference.display());
    }
    println!("  Image provider: {}", p.meta.image_provider);
    println!("  Voice provider: {}", p.meta.tts_provider);
    println!();

    println!("Video:");
    println!("  Canvas: {}x{} @ {}fps", p.width, p.height, p.fps);
    println!("  Duration: {:.1}s", p.total_duration());
    println!("  Assets: {}", loaded.assets_dir().display());
    println!("  Output: {}", loaded.output_path().display());
    if let Some(music) = &p.bg_music_path {
        println!("  Background music: {} (not mixed)", music.display());
    }
    println!();

    println!("Scenes: {}", p.scenes.len());
    for scene in &p.scenes {
        let image = scene
            .image_path
            .as_ref()
            .map(|i| i.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let voice = scene
            .voiceover_path
            .as_ref()
            .map(|v| v.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {:.1}s  image: {image}  voice: {voice}",
            scene.scene_id,
            scene.effective_duration()
        );
        println!("      {}", excerpt(&scene.paragraph_text, 72));
    }

    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
