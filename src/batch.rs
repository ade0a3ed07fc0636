//! Non-interactive analysis of a single file.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::image_processing::{read_image_bytes, save_mask, GreenDetector, ImageProcessingError};
use crate::region::{AnalyzedRegion, RegionOfInterest};
use crate::AppError;

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub image: PathBuf,
    pub roi: Option<RegionOfInterest>,
    /// Where the mask goes; `None` skips mask generation entirely.
    pub mask_output: Option<PathBuf>,
}

#[derive(Debug)]
pub enum MaskOutcome {
    Skipped,
    Saved(PathBuf),
    Failed(AppError),
}

#[derive(Debug)]
pub struct BatchReport {
    pub image: PathBuf,
    pub threshold: u32,
    pub percentage: f64,
    pub green_pixels: u64,
    pub total_pixels: u64,
    pub region: AnalyzedRegion,
    pub mask: MaskOutcome,
}

/// Reads, classifies and writes the mask.
///
/// Only failing to obtain a classification is an error; a mask that cannot
/// be written is reported in [`BatchReport::mask`].
#[instrument(skip(detector), fields(image = %request.image.display()))]
pub async fn run(
    detector: &GreenDetector,
    request: BatchRequest,
) -> Result<BatchReport, ImageProcessingError> {
    let bytes = read_image_bytes(&request.image)?;
    let produce_mask = request.mask_output.is_some();
    let classification = detector.analyze(bytes, request.roi, produce_mask).await?;

    let mask = match (request.mask_output, classification.mask.as_ref()) {
        (Some(path), Some(mask)) => match save_mask(&path, mask) {
            Ok(()) => {
                info!(path = %path.display(), "mask saved");
                MaskOutcome::Saved(path)
            }
            Err(e) => {
                warn!(error = %e, "mask not saved");
                MaskOutcome::Failed(e.into())
            }
        },
        _ => MaskOutcome::Skipped,
    };

    Ok(BatchReport {
        image: request.image,
        threshold: detector.config().threshold,
        percentage: classification.percentage,
        green_pixels: classification.green_pixels,
        total_pixels: classification.total_pixels,
        region: classification.region,
        mask,
    })
}
