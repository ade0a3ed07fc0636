//! Interactive session core.
//!
//! The shell forwards file picks, mouse drags and button presses as
//! [`Event`]s and renders the [`ViewModel`]; the core classifies once per
//! image load and once per region change, and asks the shell to play a cue.

use image::GenericImageView;
use tracing::{debug, warn};

use crate::audio::AudioCue;
use crate::capabilities::{CapabilityError, Capabilities};
use crate::classifier::classify;
use crate::config::DetectorConfig;
use crate::event::Event;
use crate::image_processing::{decode_image, encode_preview, ImageProcessingError};
use crate::model::{ImageView, LoadedImage, Model, SessionResult, ViewModel};
use crate::region::{PreviewGeometry, RegionOfInterest, RegionSource};
use crate::{AppError, ErrorKind};

#[derive(Default)]
pub struct App;

impl App {
    fn load(
        config: &DetectorConfig,
        name: String,
        bytes: &[u8],
    ) -> Result<LoadedImage, ImageProcessingError> {
        let image = decode_image(&config.limits, bytes)?;
        let (width, height) = image.dimensions();
        let geometry = PreviewGeometry::fit(width, height, config.preview_edge);
        let preview_png = encode_preview(&image, &geometry)?;
        Ok(LoadedImage {
            name,
            image,
            geometry,
            preview_png,
        })
    }

    /// Classifies the loaded image and, when enabled, requests a cue.
    fn analyze(model: &mut Model, caps: &Capabilities, roi: Option<RegionOfInterest>) {
        let Some(loaded) = model.image.as_ref() else {
            return;
        };

        let threshold = model.config.threshold;
        let classification = classify(&loaded.image, threshold, roi, true);

        let mask = classification
            .mask
            .as_ref()
            .filter(|mask| mask.width() > 0 && mask.height() > 0)
            .and_then(|mask| {
                let mask = image::DynamicImage::ImageRgba8(mask.clone());
                let geometry =
                    PreviewGeometry::fit(mask.width(), mask.height(), model.config.preview_edge);
                match encode_preview(&mask, &geometry) {
                    Ok(png) => Some(ImageView {
                        width: geometry.preview_width,
                        height: geometry.preview_height,
                        png,
                    }),
                    Err(e) => {
                        warn!(error = %e, "mask preview encoding failed");
                        None
                    }
                }
            });

        let percentage = classification.percentage;
        model.result = Some(SessionResult {
            threshold,
            percentage,
            green_pixels: classification.green_pixels,
            total_pixels: classification.total_pixels,
            region: classification.region,
            mask,
        });

        if model.audio_enabled {
            if let Some(cue) = AudioCue::for_percentage(percentage, model.audio_backend) {
                debug!(percentage, duration_ms = cue.duration_ms(), "requesting audio cue");
                caps.audio.play(cue);
            }
        }
    }

    fn current_roi(model: &Model) -> Option<RegionOfInterest> {
        let geometry = model.image.as_ref()?.geometry;
        model.selection.selection().map(|rect| geometry.to_image(rect))
    }

    fn region_note(result: &SessionResult) -> Option<String> {
        match &result.region.source {
            RegionSource::Fallback { error, .. } => {
                Some(AppError::from(error.clone()).user_facing_message())
            }
            RegionSource::Roi(_) if result.total_pixels == 0 => {
                Some(AppError::new(ErrorKind::EmptyRegion, "").user_facing_message())
            }
            _ => None,
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), user = event.is_user_initiated(), "update");

        match event {
            Event::Noop => {}

            Event::ImageLoaded { name, bytes } => {
                match Self::load(&model.config, name, &bytes) {
                    Ok(loaded) => {
                        model.image = Some(loaded);
                        model.selection.clear();
                        model.error = None;
                        model.notice = None;
                        Self::analyze(model, caps, None);
                    }
                    Err(e) => {
                        // earlier image and result stay on screen
                        warn!(error = %e, "image load failed");
                        model.error = Some(e.into());
                    }
                }
                caps.render.render();
            }

            Event::ImageLoadFailed { name, reason } => {
                warn!(%name, %reason, "shell could not read image");
                model.error = Some(
                    AppError::new(ErrorKind::ImageUnreadable, format!("{name}: {reason}"))
                        .with_internal(reason),
                );
                caps.render.render();
            }

            Event::SelectionModeToggled => {
                if model.selection.is_active() {
                    let had_selection = model.selection.selection().is_some();
                    model.selection.deactivate();
                    model.selection.clear();
                    if had_selection {
                        Self::analyze(model, caps, None);
                    }
                } else {
                    model.selection.activate();
                }
                caps.render.render();
            }

            Event::SelectionStarted { x, y } => {
                if model.image.is_some() && model.selection.start(x, y) {
                    caps.render.render();
                }
            }

            Event::SelectionMoved { x, y } => {
                if model.selection.is_dragging() {
                    model.selection.drag_to(x, y);
                    caps.render.render();
                }
            }

            Event::SelectionFinished { x, y } => {
                if model.selection.finish(x, y).is_some() {
                    let roi = Self::current_roi(model);
                    Self::analyze(model, caps, roi);
                    caps.render.render();
                }
            }

            Event::SelectionCleared => {
                if model.selection.selection().is_some() {
                    model.selection.clear();
                    Self::analyze(model, caps, None);
                    caps.render.render();
                }
            }

            Event::AudioToggled => {
                model.audio_enabled = !model.audio_enabled;
                caps.render.render();
            }

            Event::AudioBackendSelected(backend) => {
                model.audio_backend = backend;
                caps.render.render();
            }

            Event::AudioFailed { reason } => {
                warn!(%reason, "audio cue failed");
                let error = AppError::from(CapabilityError::AudioPlayback { reason });
                model.notice = Some(error.user_facing_message());
                caps.render.render();
            }

            Event::AudioUnavailable => {
                warn!("no audio output device");
                let error = AppError::from(CapabilityError::NoAudioDevice);
                model.notice = Some(error.user_facing_message());
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let threshold = model.config.threshold;
        let status = match (&model.result, &model.error) {
            (Some(result), _) => format!(
                "Green share (threshold {}): {:.2}%",
                result.threshold, result.percentage
            ),
            (None, Some(_)) => "Green share: error".to_string(),
            (None, None) => "Load an image to analyse its green share.".to_string(),
        };

        ViewModel {
            status,
            threshold,
            percentage: model.result.as_ref().map(|r| r.percentage),
            image_name: model.image.as_ref().map(|i| i.name.clone()),
            preview: model.image.as_ref().map(|i| ImageView {
                width: i.geometry.preview_width,
                height: i.geometry.preview_height,
                png: i.preview_png.clone(),
            }),
            mask: model.result.as_ref().and_then(|r| r.mask.clone()),
            selection: model.selection.selection(),
            selection_mode: model.selection_mode(),
            select_label: if model.selection_mode() {
                "Stop Selecting".into()
            } else {
                "Select Region".into()
            },
            audio_enabled: model.audio_enabled,
            audio_backend: model.audio_backend,
            mute_label: if model.audio_enabled {
                "Mute Audio".into()
            } else {
                "Unmute Audio".into()
            },
            region_note: model.result.as_ref().and_then(Self::region_note),
            error: model.error.as_ref().map(AppError::user_facing_message),
            notice: model.notice.clone(),
        }
    }
}
