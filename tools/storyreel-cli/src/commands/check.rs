//! Check external tools and configured credentials.

use storyreel_common::config::AppConfig;
use storyreel_generation::{default_image_provider, default_voice_provider};
use storyreel_render_engine::export::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("StoryReel System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = command_exists("ffmpeg");
    report(ffmpeg, "ffmpeg", "required for rendering");
    report(command_exists("ffprobe"), "ffprobe", "used by integration tests");
    println!();

    let creds = &config.credentials;
    report(
        creds.has_google(),
        "Google Gemini",
        &format!("GOOGLE_API_KEY, model {}", creds.google_text_model),
    );
    report(
        creds.has_stability(),
        "Stability AI",
        &format!("STABILITY_API_KEY, engine {}", creds.stability_engine),
    );
    report(
        creds.has_azure_speech(),
        "Azure Speech",
        "AZURE_SPEECH_KEY and AZURE_SPEECH_REGION",
    );
    report(creds.has_elevenlabs(), "ElevenLabs", "ELEVENLABS_API_KEY");
    println!();

    println!("Default image provider: {}", default_image_provider(config));
    println!("Default voice provider: {}", default_voice_provider(config));
    println!();

    if ffmpeg && creds.has_google() {
        println!("StoryReel is ready to create and render projects.");
    } else if ffmpeg {
        println!("Rendering works; set GOOGLE_API_KEY to create new projects.");
    } else {
        println!("Install ffmpeg to render projects.");
    }

    Ok(())
}

fn report(ok: bool, name: &str, detail: &str) {
    let tag = if ok { "[OK]  " } else { "[MISS]" };
    println!("{tag} {name} ({detail})");
}
