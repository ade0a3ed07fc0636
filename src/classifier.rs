//! Green-pixel classification.
//!
//! A pixel is green when its green channel beats both red and blue by more
//! than `threshold`. The analysed region is scanned once, row-major, counting
//! matches and (optionally) copying them into an RGBA mask.

use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::region::{AnalyzedRegion, PixelRect, RegionOfInterest, RegionSource};

/// Threshold used by the interactive session when nothing is configured.
pub const INTERACTIVE_THRESHOLD: u32 = 2;

/// Threshold used by the batch entry point when nothing is configured.
pub const BATCH_THRESHOLD: u32 = 5;

pub const OPAQUE: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreenRule {
    pub threshold: u32,
}

impl GreenRule {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Strict on both comparisons: `g > r + t && g > b + t`.
    #[inline]
    pub fn is_green(&self, r: u8, g: u8, b: u8) -> bool {
        let g = u32::from(g);
        g > u32::from(r).saturating_add(self.threshold)
            && g > u32::from(b).saturating_add(self.threshold)
    }
}

impl Default for GreenRule {
    fn default() -> Self {
        Self::new(INTERACTIVE_THRESHOLD)
    }
}

#[derive(Debug, Clone)]
#[must_use]
pub struct Classification {
    /// Share of green pixels in the analysed region, rounded to two decimals.
    pub percentage: f64,
    pub green_pixels: u64,
    pub total_pixels: u64,
    pub region: AnalyzedRegion,
    /// Region-sized RGBA image, present when requested.
    pub mask: Option<RgbaImage>,
}

impl Classification {
    pub fn is_empty_region(&self) -> bool {
        self.total_pixels == 0
    }
}

/// `round(100 * green / total, 2)`, and 0 for an empty region.
pub fn percentage(green: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = green as f64 / total as f64 * 100.0;
    ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

/// Picks the rectangle to scan. Unusable ROIs fall back to the whole image.
pub fn analyzed_region(width: u32, height: u32, roi: Option<RegionOfInterest>) -> AnalyzedRegion {
    let Some(requested) = roi else {
        return AnalyzedRegion {
            rect: PixelRect::full(width, height),
            source: RegionSource::WholeImage,
        };
    };

    match requested.resolve(width, height) {
        Ok(rect) => AnalyzedRegion {
            rect,
            source: RegionSource::Roi(requested),
        },
        Err(error) => {
            warn!(%requested, %error, "unusable region, analysing whole image");
            AnalyzedRegion {
                rect: PixelRect::full(width, height),
                source: RegionSource::Fallback { requested, error },
            }
        }
    }
}

pub fn classify(
    image: &DynamicImage,
    threshold: u32,
    roi: Option<RegionOfInterest>,
    produce_mask: bool,
) -> Classification {
    let (width, height) = image.dimensions();
    let region = analyzed_region(width, height, roi);
    let rule = GreenRule::new(threshold);

    let (green_pixels, mask) = match image {
        DynamicImage::ImageRgb8(buf) => scan(buf, rule, region.rect, produce_mask),
        DynamicImage::ImageRgba8(buf) => scan(buf, rule, region.rect, produce_mask),
        other => scan(&other.to_rgb8(), rule, region.rect, produce_mask),
    };

    let total_pixels = region.rect.pixel_count();
    let percentage = percentage(green_pixels, total_pixels);

    debug!(
        threshold,
        green_pixels,
        total_pixels,
        percentage,
        x = region.rect.x,
        y = region.rect.y,
        width = region.rect.width,
        height = region.rect.height,
        "classified region"
    );

    Classification {
        percentage,
        green_pixels,
        total_pixels,
        region,
        mask,
    }
}

fn scan<P>(
    buf: &ImageBuffer<P, Vec<u8>>,
    rule: GreenRule,
    rect: PixelRect,
    produce_mask: bool,
) -> (u64, Option<RgbaImage>)
where
    P: Pixel<Subpixel = u8>,
{
    // zero-initialised, i.e. fully transparent
    let mut mask = produce_mask.then(|| RgbaImage::new(rect.width, rect.height));
    let mut green = 0u64;

    for dy in 0..rect.height {
        for dx in 0..rect.width {
            let channels = buf.get_pixel(rect.x + dx, rect.y + dy).channels();
            let (r, g, b) = (channels[0], channels[1], channels[2]);
            if rule.is_green(r, g, b) {
                green += 1;
                if let Some(mask) = mask.as_mut() {
                    mask.put_pixel(dx, dy, Rgba([r, g, b, OPAQUE]));
                }
            }
        }
    }

    (green, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use proptest::prelude::*;

    fn rgb(width: u32, height: u32, pixels: &[[u8; 3]]) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for (i, p) in pixels.iter().enumerate() {
            let i = i as u32;
            img.put_pixel(i % width, i / width, Rgb(*p));
        }
        DynamicImage::ImageRgb8(img)
    }

    fn arbitrary_image() -> impl Strategy<Value = DynamicImage> {
        (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<[u8; 3]>(), (w * h) as usize)
                .prop_map(move |pixels| rgb(w, h, &pixels))
        })
    }

    #[test]
    fn two_by_two_scenario() {
        let img = rgb(
            2,
            2,
            &[[0, 255, 0], [255, 0, 0], [0, 0, 255], [10, 12, 9]],
        );
        let result = classify(&img, 2, None, false);
        assert_eq!(result.green_pixels, 1);
        assert_eq!(result.total_pixels, 4);
        assert!((result.percentage - 25.0).abs() < f64::EPSILON);
        assert!(result.mask.is_none());
    }

    #[test]
    fn strict_inequality_boundary() {
        let rule = GreenRule::new(2);
        assert!(!rule.is_green(10, 12, 9));
        assert!(GreenRule::new(0).is_green(10, 12, 9));
        // only one channel dominated
        assert!(!GreenRule::new(0).is_green(200, 150, 0));
    }

    #[test]
    fn huge_threshold_never_overflows() {
        assert!(!GreenRule::new(u32::MAX).is_green(255, 255, 255));
        assert!(!GreenRule::new(u32::MAX).is_green(0, 255, 0));
    }

    #[test]
    fn all_green_is_hundred() {
        let img = rgb(3, 3, &[[0, 255, 0]; 9]);
        let result = classify(&img, 2, None, true);
        assert!((result.percentage - 100.0).abs() < f64::EPSILON);
        let mask = result.mask.unwrap();
        assert!(mask.pixels().all(|p| p.0 == [0, 255, 0, 255]));
    }

    #[test]
    fn rgba_input_ignores_alpha() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 200, 0, 0]));
        img.put_pixel(1, 0, Rgba([200, 0, 0, 255]));
        let result = classify(&DynamicImage::ImageRgba8(img), 2, None, true);
        assert_eq!(result.green_pixels, 1);
        assert_eq!(result.mask.unwrap().get_pixel(0, 0).0, [0, 200, 0, 255]);
    }

    #[test]
    fn roi_mask_is_region_relative() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        img.put_pixel(4, 6, Rgb([1, 90, 2]));
        let img = DynamicImage::ImageRgb8(img);

        let result = classify(&img, 2, Some(RegionOfInterest::new(3, 5, 7, 8)), true);
        assert_eq!(result.total_pixels, 12);
        assert_eq!(result.green_pixels, 1);
        assert!((result.percentage - 8.33).abs() < 1e-9);
        assert_eq!(result.region.source, RegionSource::Roi(RegionOfInterest::new(3, 5, 7, 8)));

        let mask = result.mask.unwrap();
        assert_eq!(mask.dimensions(), (4, 3));
        assert_eq!(mask.get_pixel(1, 1).0, [1, 90, 2, 255]);
        assert_eq!(mask.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn zero_area_roi_reports_zero() {
        let img = rgb(4, 4, &[[0, 255, 0]; 16]);
        let result = classify(&img, 2, Some(RegionOfInterest::new(2, 0, 2, 4)), true);
        assert_eq!(result.percentage, 0.0);
        assert!(result.is_empty_region());
        assert_eq!(result.mask.unwrap().dimensions(), (0, 4));
    }

    #[test]
    fn disjoint_roi_falls_back_to_whole_image() {
        let img = rgb(2, 2, &[[0, 255, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0]]);
        let result = classify(&img, 2, Some(RegionOfInterest::new(50, 50, 60, 60)), false);
        assert_eq!(result.total_pixels, 4);
        assert!((result.percentage - 25.0).abs() < f64::EPSILON);
        assert!(matches!(result.region.source, RegionSource::Fallback { .. }));
    }

    #[test]
    fn roi_past_the_last_pixel_falls_back() {
        let img = rgb(1, 1, &[[0, 255, 0]]);
        let result = classify(&img, 2, Some(RegionOfInterest::new(1, 1, 5, 5)), true);
        assert!(matches!(result.region.source, RegionSource::Fallback { .. }));
        assert_eq!(result.total_pixels, 1);
        assert!((result.percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn luma_input_is_converted() {
        let img = DynamicImage::new_luma8(3, 3);
        let result = classify(&img, 0, None, false);
        assert_eq!(result.green_pixels, 0);
        assert_eq!(result.total_pixels, 9);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert!((percentage(1, 3) - 33.33).abs() < 1e-9);
        assert!((percentage(2, 3) - 66.67).abs() < 1e-9);
        assert_eq!(percentage(0, 0), 0.0);
    }

    proptest! {
        #[test]
        fn percentage_in_range_with_two_decimals(img in arbitrary_image(), threshold in 0u32..40) {
            let result = classify(&img, threshold, None, false);
            prop_assert!((0.0..=100.0).contains(&result.percentage));
            let scaled = result.percentage * 100.0;
            prop_assert!((scaled - scaled.round()).abs() < 1e-6);
        }

        #[test]
        fn no_green_means_zero(img in arbitrary_image()) {
            // threshold 255 makes `g > r + 255` impossible for 8-bit channels
            let result = classify(&img, 255, None, true);
            prop_assert_eq!(result.percentage, 0.0);
            prop_assert!(result.mask.unwrap().pixels().all(|p| p.0 == [0, 0, 0, 0]));
        }

        #[test]
        fn roi_matches_cropped_image(
            img in arbitrary_image(),
            x1 in 0i64..12,
            y1 in 0i64..12,
            dx in 1i64..12,
            dy in 1i64..12,
            threshold in 0u32..10,
        ) {
            let (w, h) = img.dimensions();
            let roi = RegionOfInterest::new(x1, y1, x1 + dx, y1 + dy);
            if let Ok(rect) = roi.resolve(w, h) {
                prop_assume!(!rect.is_empty());
                let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
                let a = classify(&img, threshold, Some(roi), true);
                let b = classify(&cropped, threshold, None, true);
                prop_assert_eq!(a.percentage, b.percentage);
                prop_assert_eq!(a.total_pixels, rect.pixel_count());
                prop_assert_eq!(a.mask, b.mask);
            }
        }

        #[test]
        fn mask_alpha_is_binary_and_sized(img in arbitrary_image(), threshold in 0u32..20) {
            let result = classify(&img, threshold, None, true);
            let mask = result.mask.unwrap();
            prop_assert_eq!(mask.dimensions(), img.dimensions());
            prop_assert!(mask.pixels().all(|p| p.0[3] == 0 || p.0[3] == OPAQUE));
            let opaque = mask.pixels().filter(|p| p.0[3] == OPAQUE).count() as u64;
            prop_assert_eq!(opaque, result.green_pixels);
        }

        #[test]
        fn classification_is_idempotent(img in arbitrary_image(), threshold in 0u32..20) {
            let a = classify(&img, threshold, None, true);
            let b = classify(&img, threshold, None, true);
            prop_assert_eq!(a.percentage.to_bits(), b.percentage.to_bits());
            prop_assert_eq!(a.mask, b.mask);
        }
    }
}
