use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::audio::AudioBackend;
use crate::config::DetectorConfig;
use crate::region::{AnalyzedRegion, PreviewGeometry, RegionOfInterest, SelectionTool};
use crate::AppError;

/// An image the user picked, with the preview the shell displays.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub name: String,
    pub image: DynamicImage,
    pub geometry: PreviewGeometry,
    pub preview_png: Vec<u8>,
}

/// Outcome of the most recent classification, kept until a newer one succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub threshold: u32,
    pub percentage: f64,
    pub green_pixels: u64,
    pub total_pixels: u64,
    pub region: AnalyzedRegion,
    /// Scaled like the preview; `None` for an empty region.
    pub mask: Option<ImageView>,
}

/// Session state. Toggles live here rather than in the shell's widgets.
#[derive(Debug, Clone)]
pub struct Model {
    pub config: DetectorConfig,
    pub audio_enabled: bool,
    pub audio_backend: AudioBackend,
    pub selection: SelectionTool,
    pub image: Option<LoadedImage>,
    pub result: Option<SessionResult>,
    pub error: Option<AppError>,
    /// Non-fatal problems, e.g. a cue that failed to play.
    pub notice: Option<String>,
}

impl Default for Model {
    fn default() -> Self {
        Self::with_config(DetectorConfig::interactive())
    }
}

impl Model {
    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            audio_enabled: config.audio.enabled,
            audio_backend: config.audio.backend,
            config,
            selection: SelectionTool::new(),
            image: None,
            result: None,
            error: None,
            notice: None,
        }
    }

    pub fn selection_mode(&self) -> bool {
        self.selection.is_active()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImageView {
    pub width: u32,
    pub height: u32,
    #[serde(with = "serde_bytes")]
    pub png: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub status: String,
    pub threshold: u32,
    pub percentage: Option<f64>,
    pub image_name: Option<String>,
    pub preview: Option<ImageView>,
    pub mask: Option<ImageView>,
    /// In preview pixels, for drawing the rubber band.
    pub selection: Option<RegionOfInterest>,
    pub selection_mode: bool,
    pub select_label: String,
    pub audio_enabled: bool,
    pub audio_backend: AudioBackend,
    pub mute_label: String,
    pub region_note: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
}
