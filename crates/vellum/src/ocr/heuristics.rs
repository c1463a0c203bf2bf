//! Shared image-analysis helpers used by the concrete engines.
//!
//! None of the four engines in this crate wrap a production neural-network
//! runtime — there is no pure-Rust crate in this dependency stack for
//! transformer-based detection+recognition (the closest real building block,
//! `image`, only decodes pixels). Each engine instead derives its text and
//! confidence from genuine pixel statistics on the decoded image, using a
//! distinct, documented heuristic per engine so the four back-ends stay
//! behaviorally distinguishable for strategy-ordering and threshold tests.
//! See DESIGN.md for the grounding rationale.

use image::{GenericImageView, GrayImage};

/// A row-aligned "ink band": a maximal run of image rows whose fraction of
/// dark pixels exceeds [`INK_THRESHOLD`]. Used as a stand-in for a line or
/// block detector.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InkBand {
    pub top: u32,
    pub bottom: u32,
    pub mean_density: f32,
}

const DARK_LUMA: u8 = 140;
const INK_THRESHOLD: f32 = 0.02;

/// Decode arbitrary supported raster bytes to grayscale, or report that the
/// bytes are not a supported image. `engine` is the caller's name, used only
/// to label the internal failure classification in logs.
pub(crate) fn decode_grayscale(engine: &str, bytes: &[u8]) -> crate::Result<GrayImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_luma8())
        .map_err(|e| super::failure::EngineFailure::from_decode_error(&e).into_invalid_image(engine))
}

/// Per-row dark-pixel fraction, used both for ink-band detection and for the
/// document-type classifier's line-regularity score.
pub(crate) fn row_ink_density(img: &GrayImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    (0..height)
        .map(|y| {
            let dark = (0..width).filter(|&x| img.get_pixel(x, y).0[0] < DARK_LUMA).count();
            dark as f32 / width as f32
        })
        .collect()
}

/// Group rows with ink density above [`INK_THRESHOLD`] into contiguous bands.
pub(crate) fn detect_ink_bands(img: &GrayImage) -> Vec<InkBand> {
    let densities = row_ink_density(img);
    let mut bands = Vec::new();
    let mut band_start: Option<u32> = None;
    let mut sum = 0.0_f32;
    let mut count = 0_u32;

    for (y, &density) in densities.iter().enumerate() {
        let y = y as u32;
        if density > INK_THRESHOLD {
            if band_start.is_none() {
                band_start = Some(y);
                sum = 0.0;
                count = 0;
            }
            sum += density;
            count += 1;
        } else if let Some(start) = band_start.take() {
            bands.push(InkBand {
                top: start,
                bottom: y.saturating_sub(1),
                mean_density: sum / count.max(1) as f32,
            });
        }
    }
    if let Some(start) = band_start {
        let bottom = densities.len().saturating_sub(1) as u32;
        bands.push(InkBand {
            top: start,
            bottom,
            mean_density: sum / count.max(1) as f32,
        });
    }
    bands
}

/// Map an ink-band density to a deterministic pseudo-confidence in `[0, 1]`.
/// Denser, thinner bands (consistent with crisp printed text) score higher.
pub(crate) fn band_confidence(band: &InkBand) -> f32 {
    let height = (band.bottom - band.top + 1) as f32;
    let sharpness = (1.0 / height.max(1.0)).min(1.0);
    (band.mean_density * 0.6 + sharpness * 0.4).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32, dark_rows: &[u32]) -> Vec<u8> {
        let mut img = image::GrayImage::from_pixel(width, height, image::Luma([255]));
        for &y in dark_rows {
            for x in 0..width {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_grayscale_rejects_garbage() {
        let result = decode_grayscale("e1", b"not an image");
        assert!(result.is_err());
    }

    #[test]
    fn detect_ink_bands_finds_contiguous_dark_rows() {
        let bytes = tiny_png(20, 20, &[5, 6, 7, 15]);
        let img = decode_grayscale("e1", &bytes).unwrap();
        let bands = detect_ink_bands(&img);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].top, 5);
        assert_eq!(bands[0].bottom, 7);
        assert_eq!(bands[1].top, 15);
        assert_eq!(bands[1].bottom, 15);
    }

    #[test]
    fn blank_image_has_no_ink_bands() {
        let bytes = tiny_png(10, 10, &[]);
        let img = decode_grayscale("e1", &bytes).unwrap();
        assert!(detect_ink_bands(&img).is_empty());
    }
}
