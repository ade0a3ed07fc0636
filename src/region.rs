//! Region of interest geometry.
//!
//! Rectangles arrive in two coordinate spaces: image pixels (CLI `--roi`,
//! programmatic callers) and preview pixels (mouse drags over the scaled
//! thumbnail). Everything is resolved to a clipped [`PixelRect`] before the
//! classifier touches a single pixel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RegionError {
    #[error("inverted region: x1={x1}, y1={y1}, x2={x2}, y2={y2}")]
    Inverted { x1: i64, y1: i64, x2: i64, y2: i64 },

    #[error("region ({x1}, {y1})-({x2}, {y2}) lies outside a {width}x{height} image")]
    OutsideImage {
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        width: u32,
        height: u32,
    },

    #[error("malformed region {input:?}: {reason}")]
    Parse { input: String, reason: String },
}

/// Rectangle `(x1, y1)`..`(x2, y2)` in image pixels, right/bottom edges exclusive.
///
/// Coordinates are signed and unclipped; use [`RegionOfInterest::resolve`] to
/// intersect with actual image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl RegionOfInterest {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a rectangle from two arbitrary corners, whatever the drag direction.
    pub fn from_corners(a: (i64, i64), b: (i64, i64)) -> Self {
        Self {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    /// Parses `x1,y1,x2,y2`.
    pub fn parse(input: &str) -> Result<Self, RegionError> {
        let parts: Vec<&str> = input.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(RegionError::Parse {
                input: input.to_string(),
                reason: format!("expected x1,y1,x2,y2, got {} fields", parts.len()),
            });
        }

        let mut coords = [0i64; 4];
        for (slot, (part, name)) in coords
            .iter_mut()
            .zip(parts.iter().zip(["x1", "y1", "x2", "y2"]))
        {
            *slot = part.parse::<i64>().map_err(|_| RegionError::Parse {
                input: input.to_string(),
                reason: format!("invalid {name}: {part:?}"),
            })?;
        }

        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }

    pub fn is_inverted(&self) -> bool {
        self.x2 < self.x1 || self.y2 < self.y1
    }

    /// Intersects with `[0, width) x [0, height)`.
    ///
    /// A rectangle that shares no pixel with the image is an error. A
    /// zero-width or zero-height rectangle anchored inside the image resolves
    /// to an empty rect.
    pub fn resolve(&self, width: u32, height: u32) -> Result<PixelRect, RegionError> {
        if self.is_inverted() {
            return Err(RegionError::Inverted {
                x1: self.x1,
                y1: self.y1,
                x2: self.x2,
                y2: self.y2,
            });
        }

        let (w, h) = (i64::from(width), i64::from(height));
        if !overlaps_axis(self.x1, self.x2, w) || !overlaps_axis(self.y1, self.y2, h) {
            return Err(RegionError::OutsideImage {
                x1: self.x1,
                y1: self.y1,
                x2: self.x2,
                y2: self.y2,
                width,
                height,
            });
        }

        let left = self.x1.clamp(0, w);
        let top = self.y1.clamp(0, h);
        let right = self.x2.clamp(0, w);
        let bottom = self.y2.clamp(0, h);

        // all four values are within [0, u32::MAX] after clamping
        Ok(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Half-open `[lo, hi)` against `[0, size)`; a degenerate span must sit inside.
fn overlaps_axis(lo: i64, hi: i64, size: i64) -> bool {
    if lo == hi {
        (0..size).contains(&lo)
    } else {
        lo < size && hi > 0
    }
}

impl std::str::FromStr for RegionOfInterest {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A rectangle already clipped to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// How the analysed rectangle was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionSource {
    WholeImage,
    Roi(RegionOfInterest),
    /// The requested ROI was unusable and the whole image was analysed instead.
    Fallback {
        requested: RegionOfInterest,
        error: RegionError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedRegion {
    pub rect: PixelRect,
    pub source: RegionSource,
}

/// Relationship between an image and its downscaled preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewGeometry {
    pub image_width: u32,
    pub image_height: u32,
    pub preview_width: u32,
    pub preview_height: u32,
}

impl PreviewGeometry {
    /// Fits the image inside a `max_edge` square, keeping aspect ratio and never upscaling.
    pub fn fit(image_width: u32, image_height: u32, max_edge: u32) -> Self {
        let max_edge = max_edge.max(1);
        if image_width <= max_edge && image_height <= max_edge {
            return Self {
                image_width,
                image_height,
                preview_width: image_width,
                preview_height: image_height,
            };
        }

        let scale = f64::min(
            f64::from(max_edge) / f64::from(image_width),
            f64::from(max_edge) / f64::from(image_height),
        );
        let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, max_edge);

        Self {
            image_width,
            image_height,
            preview_width: scaled(image_width),
            preview_height: scaled(image_height),
        }
    }

    pub fn ratio_x(&self) -> f64 {
        f64::from(self.image_width) / f64::from(self.preview_width.max(1))
    }

    pub fn ratio_y(&self) -> f64 {
        f64::from(self.image_height) / f64::from(self.preview_height.max(1))
    }

    /// Maps a preview-space rectangle back to image pixels.
    pub fn to_image(&self, preview: RegionOfInterest) -> RegionOfInterest {
        let (rx, ry) = (self.ratio_x(), self.ratio_y());
        RegionOfInterest {
            x1: (preview.x1 as f64 * rx).trunc() as i64,
            y1: (preview.y1 as f64 * ry).trunc() as i64,
            x2: (preview.x2 as f64 * rx).trunc() as i64,
            y2: (preview.y2 as f64 * ry).trunc() as i64,
        }
    }
}

/// Rubber-band rectangle drawn over the preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTool {
    active: bool,
    anchor: Option<(i64, i64)>,
    selection: Option<RegionOfInterest>,
}

impl SelectionTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.clear();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.anchor = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    /// Returns false when selection mode is off and the press was ignored.
    pub fn start(&mut self, x: i64, y: i64) -> bool {
        if !self.active {
            return false;
        }
        self.anchor = Some((x, y));
        self.selection = Some(RegionOfInterest::from_corners((x, y), (x, y)));
        true
    }

    pub fn drag_to(&mut self, x: i64, y: i64) {
        if let Some(anchor) = self.anchor {
            self.selection = Some(RegionOfInterest::from_corners(anchor, (x, y)));
        }
    }

    /// Ends the drag and yields the preview-space rectangle, if a drag was in progress.
    pub fn finish(&mut self, x: i64, y: i64) -> Option<RegionOfInterest> {
        let anchor = self.anchor.take()?;
        let rect = RegionOfInterest::from_corners(anchor, (x, y));
        self.selection = Some(rect);
        Some(rect)
    }

    pub fn selection(&self) -> Option<RegionOfInterest> {
        self.selection
    }

    pub fn clear(&mut self) {
        self.anchor = None;
        self.selection = None;
    }
}
