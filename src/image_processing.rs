use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::codecs::png::PngEncoder;
use image::{
    DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, ImageReader, Limits,
    RgbaImage,
};
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::classifier::{classify, Classification};
use crate::config::{DecodeLimits, DetectorConfig};
use crate::region::{PreviewGeometry, RegionOfInterest};

#[derive(Debug, Error)]
pub enum ImageProcessingError {
    #[error("failed to decode image: {source}")]
    Decode {
        #[from]
        source: image::ImageError,
    },

    #[error("image not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("png encoding failed: width={width}, height={height}, reason={reason}")]
    PngEncode {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image too large: {width}x{height} = {pixels} pixels, max {max_pixels}")]
    ImageTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    #[error("input too large: {size} bytes, max {max_size}")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("input bytes empty")]
    EmptyInput,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("analysis task failed")]
    TaskFailed,

    #[error("service overloaded, try again later")]
    Overloaded,
}

impl ImageProcessingError {
    /// True for failures to obtain pixels at all, as opposed to output or capacity problems.
    pub fn is_unreadable(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::NotFound { .. }
                | Self::Read { .. }
                | Self::ImageTooLarge { .. }
                | Self::InputTooLarge { .. }
                | Self::EmptyInput
                | Self::UnsupportedFormat
        )
    }
}

/// Async front end over [`classify`] for shells that must not block.
///
/// Decoding and scanning run on the blocking pool; at most
/// `max_concurrent_ops` analyses run at once and extra requests are rejected.
pub struct GreenDetector {
    config: DetectorConfig,
    semaphore: Arc<Semaphore>,
}

impl GreenDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_ops.max(1)));
        Self { config, semaphore }
    }

    pub fn with_defaults() -> Self {
        Self::new(DetectorConfig::batch())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    #[instrument(skip(self, raw_bytes), fields(input_size = raw_bytes.len(), threshold = self.config.threshold))]
    pub async fn analyze(
        &self,
        raw_bytes: Vec<u8>,
        roi: Option<RegionOfInterest>,
        produce_mask: bool,
    ) -> Result<Classification, ImageProcessingError> {
        let start = Instant::now();
        counter!("image.analyze.requests").increment(1);

        let _permit = self.semaphore.try_acquire().map_err(|_| {
            counter!("image.analyze.rejected").increment(1);
            ImageProcessingError::Overloaded
        })?;

        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || {
            Self::analyze_sync(&config, &raw_bytes, roi, produce_mask)
        })
        .await
        .map_err(|_| ImageProcessingError::TaskFailed)?;

        histogram!("image.analyze.duration_ms").record(start.elapsed().as_millis() as f64);

        match &result {
            Ok(classification) => {
                histogram!("image.analyze.green_percentage").record(classification.percentage);
            }
            Err(e) => {
                counter!("image.analyze.errors").increment(1);
                warn!(error = %e, "analyze failed");
            }
        }

        result
    }

    pub fn analyze_sync(
        config: &DetectorConfig,
        raw_bytes: &[u8],
        roi: Option<RegionOfInterest>,
        produce_mask: bool,
    ) -> Result<Classification, ImageProcessingError> {
        let img = decode_image(&config.limits, raw_bytes)?;
        Ok(classify(&img, config.threshold, roi, produce_mask))
    }
}

pub fn decode_image(
    limits: &DecodeLimits,
    raw_bytes: &[u8],
) -> Result<DynamicImage, ImageProcessingError> {
    if raw_bytes.is_empty() {
        return Err(ImageProcessingError::EmptyInput);
    }

    if raw_bytes.len() > limits.max_input_bytes {
        return Err(ImageProcessingError::InputTooLarge {
            size: raw_bytes.len(),
            max_size: limits.max_input_bytes,
        });
    }

    let mut reader = ImageReader::new(Cursor::new(raw_bytes))
        .with_guessed_format()
        .map_err(|e| ImageProcessingError::Decode { source: e.into() })?;

    if reader.format().is_none() {
        return Err(ImageProcessingError::UnsupportedFormat);
    }

    let mut decode_limits = Limits::default();
    decode_limits.max_image_width = Some(limits.max_dimension);
    decode_limits.max_image_height = Some(limits.max_dimension);
    decode_limits.max_alloc = Some(limits.max_alloc_bytes);
    reader.limits(decode_limits);

    let img = reader.decode()?;
    let (w, h) = img.dimensions();
    let pixels = u64::from(w) * u64::from(h);

    if pixels > limits.max_image_pixels {
        return Err(ImageProcessingError::ImageTooLarge {
            width: w,
            height: h,
            pixels,
            max_pixels: limits.max_image_pixels,
        });
    }

    debug!(width = w, height = h, "decoded image");
    Ok(img)
}

pub fn load_image(
    limits: &DecodeLimits,
    path: impl AsRef<Path>,
) -> Result<DynamicImage, ImageProcessingError> {
    let bytes = read_image_bytes(path)?;
    decode_image(limits, &bytes)
}

pub fn read_image_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>, ImageProcessingError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ImageProcessingError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ImageProcessingError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageProcessingError> {
    let (width, height) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(ImageProcessingError::PngEncode {
            width,
            height,
            reason: "zero dimension".into(),
        });
    }

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ImageProcessingError::PngEncode {
            width,
            height,
            reason: e.to_string(),
        })?;

    Ok(buffer)
}

pub fn save_mask(path: impl AsRef<Path>, mask: &RgbaImage) -> Result<(), ImageProcessingError> {
    let path = path.as_ref();
    let bytes = encode_png(mask)?;
    std::fs::write(path, bytes).map_err(|source| ImageProcessingError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Downscaled PNG for display; `geometry` must come from [`PreviewGeometry::fit`] on `img`.
pub fn encode_preview(
    img: &DynamicImage,
    geometry: &PreviewGeometry,
) -> Result<Vec<u8>, ImageProcessingError> {
    if img.dimensions() == (geometry.preview_width, geometry.preview_height) {
        return encode_png(&img.to_rgba8());
    }
    let scaled = img.thumbnail_exact(geometry.preview_width, geometry.preview_height);
    encode_png(&scaled.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use proptest::prelude::*;

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, _| {
            if x % 2 == 0 {
                Rgba([0, 200, 0, 255])
            } else {
                Rgba([200, 0, 0, 255])
            }
        });
        encode_png(&img).unwrap()
    }

    fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 220, 10]));
        let mut buffer = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 95)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn decode_rejects_empty() {
        let limits = DecodeLimits::default();
        assert!(matches!(
            decode_image(&limits, &[]),
            Err(ImageProcessingError::EmptyInput)
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        let limits = DecodeLimits::default();
        let err = decode_image(&limits, &[0xFF, 0xFE, 0x00]).unwrap_err();
        assert!(err.is_unreadable());
    }

    #[test]
    fn decode_rejects_oversized_input() {
        let limits = DecodeLimits {
            max_input_bytes: 100,
            ..Default::default()
        };
        let result = decode_image(&limits, &vec![0u8; 101]);
        assert!(matches!(result, Err(ImageProcessingError::InputTooLarge { .. })));
    }

    #[test]
    fn decode_rejects_too_many_pixels() {
        let limits = DecodeLimits {
            max_image_pixels: 10,
            ..Default::default()
        };
        let result = decode_image(&limits, &create_test_png(4, 4));
        assert!(matches!(result, Err(ImageProcessingError::ImageTooLarge { .. })));
    }

    #[test]
    fn decodes_png_and_jpeg() {
        let limits = DecodeLimits::default();
        assert_eq!(decode_image(&limits, &create_test_png(8, 3)).unwrap().dimensions(), (8, 3));
        assert_eq!(decode_image(&limits, &create_test_jpeg(16, 16)).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = load_image(&DecodeLimits::default(), "/no/such/image.png");
        assert!(matches!(result, Err(ImageProcessingError::NotFound { .. })));
    }

    #[test]
    fn encode_rejects_zero_dimension() {
        let result = encode_png(&RgbaImage::new(0, 4));
        assert!(matches!(result, Err(ImageProcessingError::PngEncode { .. })));
    }

    #[test]
    fn save_mask_round_trips_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut mask = RgbaImage::new(2, 1);
        mask.put_pixel(1, 0, Rgba([1, 2, 3, 255]));

        save_mask(&path, &mask).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded, mask);
    }

    #[test]
    fn save_mask_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("mask.png");
        let result = save_mask(&path, &RgbaImage::new(1, 1));
        assert!(matches!(result, Err(ImageProcessingError::Write { .. })));
    }

    #[test]
    fn preview_is_scaled_png() {
        let img = decode_image(&DecodeLimits::default(), &create_test_png(800, 200)).unwrap();
        let geometry = PreviewGeometry::fit(800, 200, 400);
        let png = encode_preview(&img, &geometry).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (400, 100));
    }

    #[test]
    fn analyze_sync_uses_configured_threshold() {
        let png = create_test_png(4, 2);
        let lenient = DetectorConfig::batch().with_threshold(2);
        let strict = DetectorConfig::batch().with_threshold(250);

        let a = GreenDetector::analyze_sync(&lenient, &png, None, false).unwrap();
        let b = GreenDetector::analyze_sync(&strict, &png, None, false).unwrap();
        assert!((a.percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(b.percentage, 0.0);
    }

    #[tokio::test]
    async fn analyze_produces_region_sized_mask() {
        let detector = GreenDetector::with_defaults();
        let png = create_test_png(10, 10);

        let result = detector
            .analyze(png, Some(RegionOfInterest::new(0, 0, 4, 5)), true)
            .await
            .unwrap();

        assert_eq!(result.mask.unwrap().dimensions(), (4, 5));
        assert_eq!(result.total_pixels, 20);
        assert!((result.percentage - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn detector_rejects_when_overloaded() {
        let detector = GreenDetector::new(DetectorConfig::batch().with_max_concurrent_ops(1));
        let png = create_test_png(5, 5);

        let _permit = detector.semaphore.try_acquire().unwrap();

        let result = detector.analyze(png, None, false).await;
        assert!(matches!(result, Err(ImageProcessingError::Overloaded)));
    }

    proptest! {
        #[test]
        fn decode_never_panics_on_noise(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_image(&DecodeLimits::default(), &bytes);
        }
    }
}
