//! StoryReel Render Engine
//!
//! Offline rendering pipeline that turns a project's scenes into a single
//! narrated video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! scene still ──┐
//!               ├── Scale to canvas height (once per scene)
//! motion ───────┘         │
//!                         ├── Crop + resize per frame (Ken Burns)
//! transitions ────────────┘         │
//!                                   ├── Fade to black
//! timeline ─────────────────────────┘         │
//!                                             ├── Raw RGB frames ──┐
//! voice-overs ── trim/pad/fade per scene ─────────────────────────┤
//!                                                                  ▼
//!                                                       Encode (H.264 + AAC)
//!                                                                  │
//!                                                                  ▼
//!                                                             output.mp4
//! ```

pub mod clip;
pub mod compositor;
pub mod export;
pub mod motion;

pub use clip::{ClipAudio, ClipSpec, SceneClip};
pub use compositor::{Timeline, TimelineEntry};
pub use export::*;
pub use motion::{sample_frame, CropWindow, KenBurns};
