//! StoryReel Generation
//!
//! External collaborators that turn a title into project assets:
//! - **Story:** language-model story generation and tolerant response parsing
//! - **Images:** Stability AI and an offline placeholder generator
//! - **Speech:** Azure and ElevenLabs text-to-speech
//! - **Orchestrator:** builds and updates `project.json` from the above
//!
//! Providers are selected by the enumerated tags of the project model
//! through [`images::image_generator`] and [`speech::speech_synthesizer`].

pub mod gemini;
pub mod images;
pub mod orchestrator;
pub mod speech;
pub mod story;

pub use gemini::GeminiStoryGenerator;
pub use images::{default_image_provider, image_generator, ImageGenerator, ImageRequest};
pub use orchestrator::{CreateRequest, Orchestrator, RegenTargets};
pub use speech::{default_voice_provider, speech_synthesizer, SpeechSynthesizer};
pub use story::{parse_story_response, Story, StoryGenerator, StoryRequest};
