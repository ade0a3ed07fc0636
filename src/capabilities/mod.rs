//! Side effects the session core asks of the shell.
//!
//! Crux's built-in Render capability covers view refreshes; audio is the only
//! other effect.

mod audio;

pub use self::audio::{Audio, AudioOperation};
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("audio playback failed: {reason}")]
    AudioPlayback { reason: String },

    #[error("no audio output device available")]
    NoAudioDevice,
}

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub audio: Audio<Event>,
}
