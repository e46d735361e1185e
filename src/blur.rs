//! Gaussian blur approximated by repeated extended box blurs.
//!
//! The blur runs three box passes horizontally and three vertically. The box
//! radius is fractional: the two samples just outside the integer window are
//! weighted by the fractional part, which lets three boxes match a Gaussian of
//! the requested standard deviation closely. All accumulation is done in 8.24
//! fixed point so results are bit-reproducible across platforms.

use image::{ImageBuffer, Pixel};

/// Number of box passes per axis.
const PASSES: u32 = 3;

/// Fixed-point scale for box weights.
const ONE: u32 = 1 << 24;

/// Box radius whose `PASSES`-fold repetition approximates a Gaussian of `radius`.
///
/// Uses the extended box construction from Gwosdek et al., "Theoretical
/// foundations of Gaussian convolution by extended box filtering".
#[must_use]
pub fn box_radius(radius: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let sigma2 = radius * radius / PASSES as f32;
    #[allow(clippy::cast_possible_truncation)]
    let length = (12.0 * f64::from(sigma2) + 1.0).sqrt() as f32;
    #[allow(clippy::cast_possible_truncation)]
    let l = ((f64::from(length) - 1.0) / 2.0).floor() as f32;
    let mut a = (2.0 * l + 1.0) * (l * (l + 1.0) - 3.0 * sigma2);
    a /= 6.0 * (sigma2 - (l + 1.0) * (l + 1.0));
    l + a
}

/// Blur an 8-bit image with a Gaussian of the given radius (standard deviation).
///
/// A radius that reduces to a zero box returns an unchanged copy.
#[must_use]
pub fn gaussian_blur<P>(image: &ImageBuffer<P, Vec<u8>>, radius: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    box_blur(image, box_radius(radius))
}

/// Apply `PASSES` extended box blurs of fractional radius along each axis.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn box_blur<P>(image: &ImageBuffer<P, Vec<u8>>, radius: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    if radius == 0.0 || width == 0 || height == 0 {
        return image.clone();
    }

    let channels = usize::from(P::CHANNEL_COUNT);
    let (w, h) = (width as usize, height as usize);

    let mut data = image.as_raw().clone();
    for _ in 0..PASSES {
        horizontal_pass(&mut data, w, h, channels, radius);
    }

    let mut transposed = transpose(&data, w, h, channels);
    for _ in 0..PASSES {
        horizontal_pass(&mut transposed, h, w, channels, radius);
    }
    let data = transpose(&transposed, h, w, channels);

    ImageBuffer::from_raw(width, height, data).unwrap_or_else(|| image.clone())
}

fn transpose(data: &[u8], width: usize, height: usize, channels: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    for y in 0..height {
        for x in 0..width {
            let src = (y * width + x) * channels;
            let dst = (x * height + y) * channels;
            out[dst..dst + channels].copy_from_slice(&data[src..src + channels]);
        }
    }
    out
}

fn horizontal_pass(data: &mut [u8], width: usize, height: usize, channels: usize, radius: f32) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let int_radius = radius as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let ww = (ONE as f32 / (radius * 2.0 + 1.0)) as u32;
    #[allow(clippy::cast_possible_truncation)]
    let fw = ONE.wrapping_sub((int_radius as u32 * 2 + 1).wrapping_mul(ww)) / 2;

    let kernel = LineKernel {
        radius: int_radius,
        edge_a: (int_radius + 1).min(width),
        edge_b: width.saturating_sub(int_radius + 1),
        ww,
        fw,
        channels,
    };

    let stride = width * channels;
    let mut line = vec![0u8; stride];
    for row in data.chunks_exact_mut(stride).take(height) {
        kernel.blur_line(row, &mut line);
        row.copy_from_slice(&line);
    }
}

struct LineKernel {
    radius: usize,
    edge_a: usize,
    edge_b: usize,
    ww: u32,
    fw: u32,
    channels: usize,
}

impl LineKernel {
    #[allow(clippy::cast_possible_truncation)]
    fn blur_line(&self, input: &[u8], output: &mut [u8]) {
        let ch = self.channels;
        let last = input.len() / ch - 1;
        let px = |x: usize, c: usize| u32::from(input[x * ch + c]);

        for c in 0..ch {
            let r = self.radius;
            // window sum for the virtual pixel at x = -1
            let mut acc = px(0, c) * (r as u32 + 1);
            for x in 0..self.edge_a.saturating_sub(1) {
                acc += px(x, c);
            }
            acc += px(last, c) * (r + 1 - self.edge_a) as u32;

            let mut emit = |x: usize, acc: &mut u32, sub: usize, add: usize, far_l: usize, far_r: usize| {
                *acc = acc.wrapping_add(px(add, c)).wrapping_sub(px(sub, c));
                let bulk = acc
                    .wrapping_mul(self.ww)
                    .wrapping_add((px(far_l, c) + px(far_r, c)).wrapping_mul(self.fw));
                output[x * ch + c] = (bulk.wrapping_add(1 << 23) >> 24) as u8;
            };

            if self.edge_a <= self.edge_b {
                for x in 0..self.edge_a {
                    emit(x, &mut acc, 0, x + r, 0, x + r + 1);
                }
                for x in self.edge_a..self.edge_b {
                    emit(x, &mut acc, x - r - 1, x + r, x - r - 1, x + r + 1);
                }
                for x in self.edge_b..=last {
                    emit(x, &mut acc, x - r - 1, last, x - r - 1, last);
                }
            } else {
                for x in 0..self.edge_b {
                    emit(x, &mut acc, 0, x + r, 0, x + r + 1);
                }
                for x in self.edge_b..self.edge_a {
                    emit(x, &mut acc, 0, last, 0, last);
                }
                for x in self.edge_a..=last {
                    emit(x, &mut acc, x - r - 1, last, x - r - 1, last);
                }
            }
        }
    }
}
