use serde::{Deserialize, Serialize};

use crate::audio::AudioBackend;

/// Everything the shell can tell the session core.
///
/// Selection coordinates are in preview pixels, as reported by the widget the
/// preview is drawn in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Noop,

    // --- image loading ---
    ImageLoaded {
        name: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    ImageLoadFailed {
        name: String,
        reason: String,
    },

    // --- region selection ---
    SelectionModeToggled,
    SelectionStarted { x: i64, y: i64 },
    SelectionMoved { x: i64, y: i64 },
    SelectionFinished { x: i64, y: i64 },
    SelectionCleared,

    // --- audio ---
    AudioToggled,
    AudioBackendSelected(AudioBackend),
    AudioFailed { reason: String },
    AudioUnavailable,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Noop => "noop",
            Event::ImageLoaded { .. } => "image_loaded",
            Event::ImageLoadFailed { .. } => "image_load_failed",
            Event::SelectionModeToggled => "selection_mode_toggled",
            Event::SelectionStarted { .. } => "selection_started",
            Event::SelectionMoved { .. } => "selection_moved",
            Event::SelectionFinished { .. } => "selection_finished",
            Event::SelectionCleared => "selection_cleared",
            Event::AudioToggled => "audio_toggled",
            Event::AudioBackendSelected(_) => "audio_backend_selected",
            Event::AudioFailed { .. } => "audio_failed",
            Event::AudioUnavailable => "audio_unavailable",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Event::Noop | Event::AudioFailed { .. } | Event::AudioUnavailable
        )
    }
}
