//! Mask contrast normalization.
//!
//! Stretches a mask's value range to the full `[0, 255]` interval. A uniform
//! mask carries no spatial information and is reported as `None`, which
//! callers treat as "leave the input unchanged".

use image::{DynamicImage, GrayImage, RgbImage};

/// Rescale a grayscale mask so its minimum maps to 0 and its maximum to 255.
///
/// Each value is mapped to `floor((v - min) / (max - min) * 255)`.
/// Returns `None` when every pixel holds the same value.
#[must_use]
pub fn normalize_mask(mask: &GrayImage) -> Option<GrayImage> {
    let data = stretch(mask.as_raw())?;
    GrayImage::from_raw(mask.width(), mask.height(), data)
}

/// Normalize an arbitrary mask image.
///
/// Single-channel masks go through [`normalize_mask`]. Multi-channel masks
/// are reduced to their first three channels and rescaled with one global
/// minimum and maximum taken over all of them, yielding an RGB image.
#[must_use]
pub fn normalize_dynamic(mask: &DynamicImage) -> Option<DynamicImage> {
    match mask {
        DynamicImage::ImageLuma8(gray) => normalize_mask(gray).map(DynamicImage::ImageLuma8),
        other if other.color().channel_count() <= 2 => {
            normalize_mask(&other.to_luma8()).map(DynamicImage::ImageLuma8)
        }
        other => {
            let rgb = other.to_rgb8();
            let data = stretch(rgb.as_raw())?;
            RgbImage::from_raw(rgb.width(), rgb.height(), data).map(DynamicImage::ImageRgb8)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stretch(samples: &[u8]) -> Option<Vec<u8>> {
    let min = samples.iter().copied().min()?;
    let max = samples.iter().copied().max()?;
    if min == max {
        return None;
    }

    let range = f64::from(max - min);
    Some(
        samples
            .iter()
            .map(|&v| (f64::from(v - min) / range * 255.0) as u8)
            .collect(),
    )
}
