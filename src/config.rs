use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audio::AudioBackend;
use crate::classifier::{BATCH_THRESHOLD, INTERACTIVE_THRESHOLD};

pub const DEFAULT_MASK_OUTPUT: &str = "green_pixels_detected.png";
pub const DEFAULT_PREVIEW_EDGE: u32 = 400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Guards applied before and during decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_image_pixels: u64,
    pub max_input_bytes: usize,
    pub max_alloc_bytes: u64,
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_image_pixels: 100_000_000,
            max_input_bytes: 50 * 1024 * 1024,
            max_alloc_bytes: 512 * 1024 * 1024,
            max_dimension: 15_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub backend: AudioBackend,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: AudioBackend::Tone,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Margin by which green must beat red and blue.
    pub threshold: u32,
    pub limits: DecodeLimits,
    pub max_concurrent_ops: usize,
    /// Longest edge of the preview shown to the user.
    pub preview_edge: u32,
    pub mask_output: PathBuf,
    pub audio: AudioConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

impl DetectorConfig {
    pub fn interactive() -> Self {
        Self {
            threshold: INTERACTIVE_THRESHOLD,
            limits: DecodeLimits::default(),
            max_concurrent_ops: 4,
            preview_edge: DEFAULT_PREVIEW_EDGE,
            mask_output: PathBuf::from(DEFAULT_MASK_OUTPUT),
            audio: AudioConfig::default(),
        }
    }

    pub fn batch() -> Self {
        Self {
            threshold: BATCH_THRESHOLD,
            ..Self::interactive()
        }
    }

    /// Reads a JSON file; missing fields keep the interactive defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_file_over(path, Self::interactive())
    }

    /// Reads a JSON file, taking every field it omits (nested ones included) from `base`.
    pub fn from_json_file_over(path: impl AsRef<Path>, base: Self) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let overrides: Value = serde_json::from_str(&raw).map_err(parse_error)?;
        let mut merged = serde_json::to_value(base).map_err(parse_error)?;
        merge_json(&mut merged, overrides);
        serde_json::from_value(merged).map_err(parse_error)
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_mask_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.mask_output = path.into();
        self
    }

    pub fn with_audio_backend(mut self, backend: AudioBackend) -> Self {
        self.audio.backend = backend;
        self
    }

    pub fn with_max_concurrent_ops(mut self, ops: usize) -> Self {
        self.max_concurrent_ops = ops.max(1);
        self
    }

    pub fn with_preview_edge(mut self, edge: u32) -> Self {
        self.preview_edge = edge.max(1);
        self
    }
}

fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
