//! StoryReel CLI: turn a title into a narrated slideshow video.
//!
//! Usage:
//!   storyreel create --title <T>     Generate a story project
//!   storyreel regen <PATH> --scene N Regenerate one scene's assets
//!   storyreel render <PATH>          Render a project to video
//!   storyreel info <PATH>            Show project information
//!   storyreel validate <PATH>        Validate a project
//!   storyreel check                  Check tools and credentials

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use storyreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Narrated Ken Burns story videos from a single prompt",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story, its images and voice-overs
    Create(commands::create::CreateArgs),

    /// Regenerate the image and/or voice-over of one scene
    Regen {
        /// Path to the project directory or project.json
        path: PathBuf,

        /// Scene id to regenerate
        #[arg(long)]
        scene: u32,

        /// What to regenerate: image, voice, or both
        #[arg(long, default_value = "both")]
        what: String,

        /// Style prompt for the new image (defaults to the project's)
        #[arg(long)]
        style_prompt: Option<String>,

        /// Reference image for image-to-image generation
        #[arg(long)]
        reference_image: Option<PathBuf>,

        /// Render the project afterwards
        #[arg(long)]
        render: bool,
    },

    /// Render a project to video
    Render {
        /// Path to the project directory or project.json
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show project information
    Info {
        /// Path to the project directory or project.json
        path: PathBuf,
    },

    /// Validate a project and its assets
    Validate {
        /// Path to the project directory or project.json
        path: PathBuf,
    },

    /// Check external tools and configured credentials
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    storyreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Create(args) => commands::create::run(args, &config).await,
        Commands::Regen {
            path,
            scene,
            what,
            style_prompt,
            reference_image,
            render,
        } => {
            commands::regen::run(
                path,
                scene,
                what,
                style_prompt,
                reference_image,
                render,
                &config,
            )
            .await
        }
        Commands::Render { path, output } => commands::render::run(path, output).await,
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Check => commands::check::run(&config),
    }
}
