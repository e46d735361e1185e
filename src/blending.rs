//! Alpha blending and compositing primitives.
//!
//! The final seed image is a linear interpolation between the reconstructed
//! and the original content:
//! `result = image1 * (mask / 255) + image2 * (1 - mask / 255)`
//!
//! The remaining helpers are the 8-bit compositing operations the multi-scale
//! reconstruction is built from. They use integer arithmetic with rounded
//! divisions by 255 so that output is deterministic to the last bit.

use std::borrow::Cow;

use image::{
    DynamicImage, GenericImageView, GrayImage, ImageBuffer, Pixel, RgbImage, Rgba, RgbaImage,
};

use crate::error::{Error, Result};

/// Fractional bits kept by [`alpha_composite`] when weighting color channels.
const PRECISION_BITS: u32 = 7;

/// `x / 255` for values already carrying a `+ 128` rounding bias.
#[inline]
fn shift_div255(x: u32) -> u32 {
    ((x >> 8) + x) >> 8
}

/// Rounded `x / 255`.
#[inline]
fn div255(x: u32) -> u32 {
    shift_div255(x + 128)
}

#[allow(clippy::cast_possible_truncation)]
#[inline]
fn mul_div255(a: u8, b: u8) -> u8 {
    div255(u32::from(a) * u32::from(b)) as u8
}

fn ensure_same_size(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, actual })
    }
}

fn color_channels(image: &DynamicImage) -> Cow<'_, RgbImage> {
    match image {
        DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
        other => Cow::Owned(other.to_rgb8()),
    }
}

/// Blend two images through a grayscale transition mask.
///
/// Computes `image1 * m + image2 * (1 - m)` per color channel with
/// `m = mask / 255`, truncating to 8 bits. Alpha channels are ignored and the
/// result is always an opaque RGB image.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if `image2` or `transition_mask` differ in
/// size from `image1`.
pub fn blend_images(
    image1: &DynamicImage,
    image2: &DynamicImage,
    transition_mask: &GrayImage,
) -> Result<RgbImage> {
    ensure_same_size(image1.dimensions(), image2.dimensions())?;
    ensure_same_size(image1.dimensions(), transition_mask.dimensions())?;

    let a = color_channels(image1);
    let b = color_channels(image2);

    let mut out = RgbImage::new(a.width(), a.height());
    for (((dst, pa), pb), m) in out
        .pixels_mut()
        .zip(a.pixels())
        .zip(b.pixels())
        .zip(transition_mask.pixels())
    {
        let weight = f64::from(m[0]) / 255.0;
        for ch in 0..3 {
            let blended = f64::from(pa[ch]) * weight + f64::from(pb[ch]) * (1.0 - weight);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                dst[ch] = blended as u8;
            }
        }
    }

    Ok(out)
}

/// Copy `src` over `dst`, using `mask` as per-pixel opacity.
///
/// Every channel, alpha included, becomes
/// `(dst * (255 - m) + src * m) / 255` rounded. A mask value of 255 copies the
/// source pixel exactly, 0 leaves the destination untouched.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if the three buffers differ in size.
pub fn paste_masked<P>(
    dst: &mut ImageBuffer<P, Vec<u8>>,
    src: &ImageBuffer<P, Vec<u8>>,
    mask: &GrayImage,
) -> Result<()>
where
    P: Pixel<Subpixel = u8>,
{
    ensure_same_size(dst.dimensions(), src.dimensions())?;
    ensure_same_size(dst.dimensions(), mask.dimensions())?;

    for ((out, input), m) in dst.pixels_mut().zip(src.pixels()).zip(mask.pixels()) {
        let m = u32::from(m[0]);
        for (o, &i) in out.channels_mut().iter_mut().zip(input.channels()) {
            #[allow(clippy::cast_possible_truncation)]
            {
                *o = div255(u32::from(*o) * (255 - m) + u32::from(i) * m) as u8;
            }
        }
    }

    Ok(())
}

/// Return `255 - v` for every pixel of a grayscale mask.
#[must_use]
pub fn inverted(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    image::imageops::invert(&mut out);
    out
}

/// Convert straight alpha to premultiplied alpha.
#[must_use]
pub fn premultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = px[3];
        for ch in 0..3 {
            px[ch] = mul_div255(px[ch], a);
        }
    }
    out
}

/// Convert premultiplied alpha back to straight alpha.
///
/// Fully transparent and fully opaque pixels keep their color bytes as-is.
#[must_use]
pub fn unpremultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for ch in 0..3 {
            #[allow(clippy::cast_possible_truncation)]
            {
                px[ch] = ((255 * u32::from(px[ch])) / a).min(255) as u8;
            }
        }
    }
    out
}

/// Composite `src` over `dst` in place (Porter-Duff "over", straight alpha).
///
/// Repeated composites of a partially transparent layer keep accumulating
/// opacity, so compositing the same layer twice is not a no-op.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if the images differ in size.
pub fn alpha_composite(dst: &mut RgbaImage, src: &RgbaImage) -> Result<()> {
    ensure_same_size(dst.dimensions(), src.dimensions())?;

    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        *d = composite_pixel(*d, *s);
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn composite_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_a = u32::from(src[3]);
    if src_a == 0 {
        return dst;
    }

    let blend = u32::from(dst[3]) * (255 - src_a);
    let out_a255 = src_a * 255 + blend;
    let coef1 = src_a * 255 * 255 * (1 << PRECISION_BITS) / out_a255;
    let coef2 = 255 * (1 << PRECISION_BITS) - coef1;

    let mix = |s: u8, d: u8| {
        let tmp = u32::from(s) * coef1 + u32::from(d) * coef2;
        (shift_div255(tmp + (0x80 << PRECISION_BITS)) >> PRECISION_BITS) as u8
    };

    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        shift_div255(out_a255 + 0x80) as u8,
    ])
}
