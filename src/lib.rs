// lib.rs - green-share analysis core shared by the batch tool and the interactive shells

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod app;
pub mod audio;
pub mod batch;
pub mod capabilities;
pub mod classifier;
pub mod config;
pub mod event;
pub mod image_processing;
pub mod model;
pub mod region;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use classifier::{classify, Classification, GreenRule};
pub use config::DetectorConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{Model, ViewModel};
pub use region::{PixelRect, RegionOfInterest};

use crate::capabilities::CapabilityError;
use crate::config::ConfigError;
use crate::image_processing::ImageProcessingError;
use crate::region::RegionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Retrying the same action may succeed.
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ImageUnreadable,
    ImageTooLarge,
    ImageFormatUnsupported,
    InvalidRegion,
    EmptyRegion,
    MaskSave,
    Audio,
    Overloaded,
    Config,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ImageUnreadable => "IMAGE_UNREADABLE",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::ImageFormatUnsupported => "IMAGE_FORMAT_UNSUPPORTED",
            Self::InvalidRegion => "INVALID_REGION",
            Self::EmptyRegion => "EMPTY_REGION",
            Self::MaskSave => "MASK_SAVE_FAILED",
            Self::Audio => "AUDIO_ERROR",
            Self::Overloaded => "OVERLOADED",
            Self::Config => "CONFIG_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Overloaded | Self::Audio | Self::MaskSave => ErrorSeverity::Transient,
            Self::ImageUnreadable
            | Self::ImageTooLarge
            | Self::ImageFormatUnsupported
            | Self::InvalidRegion
            | Self::EmptyRegion
            | Self::Config
            | Self::Internal => ErrorSeverity::Permanent,
        }
    }

    /// Whether the failure leaves a computed result usable.
    #[must_use]
    pub const fn is_non_fatal(self) -> bool {
        matches!(self, Self::MaskSave | Self::Audio | Self::EmptyRegion)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::ImageUnreadable => {
                "The image could not be opened. Please choose another file.".into()
            }
            ErrorKind::ImageTooLarge => "The image is too large to analyse.".into(),
            ErrorKind::ImageFormatUnsupported => {
                "This image format is not supported. Please use JPEG, PNG, or WebP.".into()
            }
            ErrorKind::InvalidRegion => {
                "The selected region is outside the image; the whole image was analysed.".into()
            }
            ErrorKind::EmptyRegion => "The selected region contains no pixels.".into(),
            ErrorKind::MaskSave => format!("The green-pixel image was not saved: {}", self.message),
            ErrorKind::Audio => "The audio cue could not be played.".into(),
            ErrorKind::Overloaded => "Busy analysing other images. Please try again.".into(),
            ErrorKind::Config => self.message.clone(),
            ErrorKind::Internal => "An unexpected error occurred.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<ImageProcessingError> for AppError {
    fn from(e: ImageProcessingError) -> Self {
        let kind = match &e {
            ImageProcessingError::ImageTooLarge { .. }
            | ImageProcessingError::InputTooLarge { .. } => ErrorKind::ImageTooLarge,
            ImageProcessingError::UnsupportedFormat => ErrorKind::ImageFormatUnsupported,
            ImageProcessingError::PngEncode { .. } | ImageProcessingError::Write { .. } => {
                ErrorKind::MaskSave
            }
            ImageProcessingError::Overloaded => ErrorKind::Overloaded,
            ImageProcessingError::TaskFailed => ErrorKind::Internal,
            ImageProcessingError::Decode { .. }
            | ImageProcessingError::NotFound { .. }
            | ImageProcessingError::Read { .. }
            | ImageProcessingError::EmptyInput => ErrorKind::ImageUnreadable,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<RegionError> for AppError {
    fn from(e: RegionError) -> Self {
        AppError::new(ErrorKind::InvalidRegion, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Config, e.to_string())
    }
}

impl From<CapabilityError> for AppError {
    fn from(e: CapabilityError) -> Self {
        AppError::new(ErrorKind::Audio, e.to_string())
    }
}
