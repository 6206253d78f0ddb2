//! StoryReel Project Model
//!
//! Defines the core data contracts for StoryReel projects:
//! - **Scene:** One narrated beat (paragraph, image, voice-over, motion, transitions)
//! - **Project:** Top-level metadata, canvas, ordered scenes, and persistence
//!
//! The persisted `project.json` is the single source of truth between
//! asset generation and rendering. Scene order is playback order.

pub mod project;
pub mod scene;

pub use project::*;
pub use scene::*;
