//! Multi-scale blend engine.
//!
//! Turns an image and a dual-channel mask into an inpainting seed image and a
//! strength mask. The mask's red channel marks the region to regenerate, its
//! green channel the outer boundary beyond which nothing may change.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage, RgbaImage};
use tracing::{debug, info};

use crate::blending::{self, alpha_composite, inverted, paste_masked, premultiply, unpremultiply};
use crate::blur::gaussian_blur;
use crate::diagnostics::{Diagnostics, NoopDiagnostics, NumericGrid, Snapshot};
use crate::error::{Error, Result};
use crate::normalize::normalize_mask;

/// Gaussian radius and composite count for each reconstruction layer, coarse to fine.
pub const BLUR_PASSES: [(f32, usize); 6] = [
    (256.0, 1),
    (64.0, 1),
    (16.0, 2),
    (4.0, 4),
    (2.0, 2),
    (0.0, 1),
];

/// Internal-mask value from which a pixel counts as masked.
pub const MIDPOINT: u8 = 128;

/// Snapshot level for intermediate results.
const DETAIL_LEVEL: u32 = 5;
/// Snapshot level for the final outputs.
const SUMMARY_LEVEL: u32 = 1;

/// Why the engine returned its inputs unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The mask does not have three or four channels.
    UnsupportedMaskMode {
        /// Channel count of the given mask.
        channels: u8,
    },
    /// The internal (red) channel holds a single value.
    UniformInternalMask,
    /// The external (green) channel holds a single value.
    UniformExternalMask,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMaskMode { channels } => write!(
                f,
                "input mask has {channels} channel(s) instead of RGB, original mode used"
            ),
            Self::UniformInternalMask => {
                write!(f, "given inpainting mask is uniform, original mode used")
            }
            Self::UniformExternalMask => {
                write!(f, "given external mask is uniform, original mode used")
            }
        }
    }
}

/// Result of [`InpaintEngine::prepare`].
#[derive(Debug, Clone)]
pub enum Prepared {
    /// The seed image and the normalized internal mask.
    Inpainted {
        /// Blended seed image.
        image: RgbImage,
        /// Normalized internal mask, to be used as denoising strength mask.
        mask: GrayImage,
    },
    /// The inputs, handed back untouched.
    Original {
        /// The input image.
        image: DynamicImage,
        /// The input mask.
        mask: DynamicImage,
        /// Why no processing took place.
        reason: Fallback,
    },
}

impl Prepared {
    /// Flatten into the `(image, mask)` pair a host pipeline substitutes.
    #[must_use]
    pub fn into_pair(self) -> (DynamicImage, DynamicImage) {
        match self {
            Self::Inpainted { image, mask } => (
                DynamicImage::ImageRgb8(image),
                DynamicImage::ImageLuma8(mask),
            ),
            Self::Original { image, mask, .. } => (image, mask),
        }
    }
}

/// The blend engine, holding its diagnostics sink.
///
/// The engine itself is stateless; one instance can process any number of
/// image/mask pairs.
pub struct InpaintEngine {
    diagnostics: Box<dyn Diagnostics>,
}

impl Default for InpaintEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InpaintEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InpaintEngine")
            .field("diagnostics_level", &self.diagnostics.level())
            .finish()
    }
}

impl InpaintEngine {
    /// Create an engine without diagnostics.
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics(Box::new(NoopDiagnostics))
    }

    /// Create an engine reporting intermediate images to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(diagnostics: Box<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    fn snapshot(&self, name: &str, level: u32, make: impl FnOnce() -> Snapshot) {
        if self.diagnostics.accepts(level) {
            self.diagnostics.record(name, level, &make());
        }
    }

    /// Run the engine and return the `(image, mask)` pair for the host.
    ///
    /// On success the image is RGB and the mask is the normalized internal
    /// mask. When the mask is unusable the inputs come back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if a usable mask differs in size from
    /// the image.
    pub fn inpaint(
        &self,
        image: DynamicImage,
        input_mask: DynamicImage,
    ) -> Result<(DynamicImage, DynamicImage)> {
        Ok(self.prepare(image, input_mask)?.into_pair())
    }

    /// Run the engine, reporting whether processing took place.
    ///
    /// # Errors
    ///
    /// See [`InpaintEngine::inpaint`].
    pub fn prepare(&self, image: DynamicImage, input_mask: DynamicImage) -> Result<Prepared> {
        let fallback = |image: DynamicImage, mask: DynamicImage, reason: Fallback| -> Result<Prepared> {
            info!("{reason}");
            Ok(Prepared::Original {
                image,
                mask,
                reason,
            })
        };

        let Some((internal, external)) = split_mask(&input_mask) else {
            let channels = input_mask.color().channel_count();
            return fallback(image, input_mask, Fallback::UnsupportedMaskMode { channels });
        };

        self.snapshot("image", DETAIL_LEVEL, || Snapshot::Image(image.clone()));
        self.snapshot("input_mask", DETAIL_LEVEL, || {
            Snapshot::Image(input_mask.clone())
        });

        let internal = normalize_mask(&internal);
        let external = normalize_mask(&external);

        let Some(internal) = internal else {
            return fallback(image, input_mask, Fallback::UniformInternalMask);
        };
        let Some(external) = external else {
            return fallback(image, input_mask, Fallback::UniformExternalMask);
        };

        let expected = (image.width(), image.height());
        let actual = (input_mask.width(), input_mask.height());
        if expected != actual {
            return Err(Error::SizeMismatch { expected, actual });
        }

        self.snapshot("internal_mask", DETAIL_LEVEL, || gray(&internal));
        self.snapshot("external_mask", DETAIL_LEVEL, || gray(&external));

        let seed = self.compose(&image, &internal, &external)?;

        self.snapshot("image_mod", SUMMARY_LEVEL, || {
            Snapshot::Image(DynamicImage::ImageRgb8(seed.clone()))
        });
        self.snapshot("internal_mask", SUMMARY_LEVEL, || gray(&internal));

        Ok(Prepared::Inpainted {
            image: seed,
            mask: internal,
        })
    }

    fn compose(
        &self,
        image: &DynamicImage,
        internal: &GrayImage,
        external: &GrayImage,
    ) -> Result<RgbImage> {
        let transition = transition_mask(internal);
        let boolean = boolean_mask(internal);

        self.snapshot("transition_internal_mask", DETAIL_LEVEL, || gray(&transition));
        self.snapshot("bool_internal_mask", DETAIL_LEVEL, || gray(&boolean));

        let combined = combined_mask(&boolean, external)?;
        self.snapshot("combined_mask", DETAIL_LEVEL, || gray(&combined));

        let masked = masked_source(image, &combined)?;
        self.snapshot("image_masked", DETAIL_LEVEL, || {
            Snapshot::Image(DynamicImage::ImageRgba8(unpremultiply(&masked)))
        });

        let reconstructed = DynamicImage::ImageRgb8(drop_alpha(&reconstruct(&masked)?));
        self.snapshot("image_mod", DETAIL_LEVEL, || {
            Snapshot::Image(reconstructed.clone())
        });

        self.snapshot("transition_mask_np", DETAIL_LEVEL, || {
            Snapshot::Grid(NumericGrid::from_mask(&transition))
        });
        let mut blended = blending::blend_images(&reconstructed, image, &transition)?;
        self.snapshot("blended_np", DETAIL_LEVEL, || {
            Snapshot::Image(DynamicImage::ImageRgb8(blended.clone()))
        });

        paste_masked(&mut blended, &image.to_rgb8(), &inverted(external))?;
        Ok(blended)
    }
}

/// Run a default engine (no diagnostics) on one image/mask pair.
///
/// # Errors
///
/// See [`InpaintEngine::inpaint`].
pub fn nm_inpaint(
    image: DynamicImage,
    input_mask: DynamicImage,
) -> Result<(DynamicImage, DynamicImage)> {
    InpaintEngine::new().inpaint(image, input_mask)
}

fn gray(mask: &GrayImage) -> Snapshot {
    Snapshot::Image(DynamicImage::ImageLuma8(mask.clone()))
}

/// Split a three or four channel mask into its internal (first) and external
/// (second) channels. Other channel counts yield `None`.
fn split_mask(mask: &DynamicImage) -> Option<(GrayImage, GrayImage)> {
    if !matches!(mask.color().channel_count(), 3 | 4) {
        return None;
    }
    let rgb = mask.to_rgb8();
    let internal = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([rgb.get_pixel(x, y)[0]])
    });
    let external = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([rgb.get_pixel(x, y)[1]])
    });
    Some((internal, external))
}

fn map_mask(mask: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = mask.clone();
    for px in out.pixels_mut() {
        px[0] = f(px[0]);
    }
    out
}

/// Ramp from 0 at the midpoint to 255 at full intensity; 0 below the midpoint.
#[must_use]
pub fn transition_mask(internal: &GrayImage) -> GrayImage {
    map_mask(internal, |x| {
        if x >= MIDPOINT {
            // 255 maps to 256 before clipping
            u8::try_from((u16::from(x) - 127) * 2).unwrap_or(u8::MAX)
        } else {
            0
        }
    })
}

/// Hard threshold of the internal mask at the midpoint.
#[must_use]
pub fn boolean_mask(internal: &GrayImage) -> GrayImage {
    map_mask(internal, |x| if x >= MIDPOINT { 255 } else { 0 })
}

/// Zero outside the external boundary, "not internal" inside it.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if the masks differ in size.
pub fn combined_mask(boolean: &GrayImage, external: &GrayImage) -> Result<GrayImage> {
    let mut combined = GrayImage::new(boolean.width(), boolean.height());
    paste_masked(&mut combined, &inverted(boolean), external)?;
    Ok(combined)
}

/// Premultiplied copy of `image` whose alpha follows `combined`.
fn masked_source(image: &DynamicImage, combined: &GrayImage) -> Result<RgbaImage> {
    let mut masked = RgbaImage::new(image.width(), image.height());
    paste_masked(&mut masked, &premultiply(&image.to_rgba8()), combined)?;
    Ok(masked)
}

/// Composite the blur pyramid of `masked` (premultiplied) onto a clear canvas.
fn reconstruct(masked: &RgbaImage) -> Result<RgbaImage> {
    let layers = blur_layers(masked);
    let mut canvas = RgbaImage::new(masked.width(), masked.height());

    for (&(radius, repeats), layer) in BLUR_PASSES.iter().zip(&layers) {
        debug!("compositing radius {radius} x{repeats}");
        for _ in 0..repeats {
            alpha_composite(&mut canvas, layer)?;
        }
    }

    Ok(canvas)
}

/// Straight-alpha blurred layers in [`BLUR_PASSES`] order.
fn blur_layers(masked: &RgbaImage) -> Vec<RgbaImage> {
    let layer = |&(radius, _): &(f32, usize)| unpremultiply(&gaussian_blur(masked, radius));

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        BLUR_PASSES.par_iter().map(layer).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        BLUR_PASSES.iter().map(layer).collect()
    }
}

fn drop_alpha(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        dst.0.copy_from_slice(&src.0[..3]);
    }
    out
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed image.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped (mask unusable, nothing written).
    pub skipped: bool,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            message: String::new(),
        }
    }
}

/// Output locations for one processed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Where the seed image is written.
    pub image: PathBuf,
    /// Where the strength mask is written.
    pub mask: PathBuf,
}

impl InpaintEngine {
    /// Process one image file: load image and mask, run the engine, save both outputs.
    ///
    /// Returns a [`ProcessResult`] indicating success, skip, or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, mask: &Path, output: &OutputPaths) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        let image = match image::open(input) {
            Ok(img) => img,
            Err(e) => {
                result.message = format!("Failed to load image: {e}");
                return result;
            }
        };
        let input_mask = match image::open(mask) {
            Ok(img) => img,
            Err(e) => {
                result.message = format!("Failed to load mask: {e}");
                return result;
            }
        };

        let (seed, strength) = match self.prepare(image, input_mask) {
            Ok(Prepared::Inpainted { image, mask }) => (image, mask),
            Ok(Prepared::Original { reason, .. }) => {
                result.skipped = true;
                result.success = true;
                result.message = reason.to_string();
                return result;
            }
            Err(e) => {
                result.message = format!("Failed to process: {e}");
                return result;
            }
        };

        for path in [&output.image, &output.mask] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        result.message = format!("Failed to create output directory: {e}");
                        return result;
                    }
                }
            }
        }

        let saved = save_image(&DynamicImage::ImageRgb8(seed), &output.image)
            .and_then(|()| save_image(&DynamicImage::ImageLuma8(strength), &output.mask));
        match saved {
            Ok(()) => {
                result.success = true;
                result.message = "Seed image and mask written".to_string();
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process every supported image in `input_dir` whose mask of the same
    /// file name exists in `mask_dir`.
    ///
    /// Outputs land in `output_dir` with the names [`default_output_paths`]
    /// would give. Uses parallel iteration when the `parallel` feature is
    /// enabled.
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        mask_dir: &Path,
        output_dir: &Path,
    ) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                let mut failed = ProcessResult::new(input_dir);
                failed.message = format!("Failed to read directory: {e}");
                return vec![failed];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                let mut failed = ProcessResult::new(output_dir);
                failed.message = format!("Failed to create output directory: {e}");
                return vec![failed];
            }
        }

        let run = |input_path: &PathBuf| {
            let Some(filename) = input_path.file_name() else {
                let mut failed = ProcessResult::new(input_path);
                failed.message = "Input has no file name".to_string();
                return failed;
            };
            let mask_path = mask_dir.join(filename);
            if !mask_path.exists() {
                let mut skipped = ProcessResult::new(input_path);
                skipped.skipped = true;
                skipped.success = true;
                skipped.message = format!("No mask at {}", mask_path.display());
                return skipped;
            }
            let outputs = output_paths_in(input_path, output_dir);
            self.process_file(input_path, &mask_path, &outputs)
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            entries.iter().map(run).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&img.to_rgb8())?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate default output paths next to the input.
///
/// Example: `"photo.jpg"` becomes `"photo_inpaint.jpg"` and `"photo_inpaint_mask.png"`.
#[must_use]
pub fn default_output_paths(input: &Path) -> OutputPaths {
    output_paths_in(input, input.parent().unwrap_or(Path::new(".")))
}

fn output_paths_in(input: &Path, dir: &Path) -> OutputPaths {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    OutputPaths {
        image: dir.join(format!("{stem}_inpaint.{ext}")),
        mask: dir.join(format!("{stem}_inpaint_mask.png")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn dual_mask(w: u32, h: u32, f: impl Fn(u32, u32) -> (u8, u8)) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            let (internal, external) = f(x, y);
            Rgb([internal, external, 0])
        }))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn gradient_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn blur_table_is_coarse_to_fine() {
        let radii: Vec<f32> = BLUR_PASSES.iter().map(|&(r, _)| r).collect();
        assert_eq!(radii, vec![256.0, 64.0, 16.0, 4.0, 2.0, 0.0]);
        let repeats: Vec<usize> = BLUR_PASSES.iter().map(|&(_, n)| n).collect();
        assert_eq!(repeats, vec![1, 1, 2, 4, 2, 1]);
    }

    #[test]
    fn transition_ramp_starts_at_midpoint() {
        let internal = GrayImage::from_fn(256, 1, |x, _| Luma([u8::try_from(x).unwrap()]));
        let t = transition_mask(&internal);
        assert_eq!(t.get_pixel(0, 0)[0], 0);
        assert_eq!(t.get_pixel(127, 0)[0], 0);
        assert_eq!(t.get_pixel(128, 0)[0], 2);
        assert_eq!(t.get_pixel(200, 0)[0], 146);
        assert_eq!(t.get_pixel(254, 0)[0], 254);
        assert_eq!(t.get_pixel(255, 0)[0], 255);
    }

    #[test]
    fn boolean_threshold_at_midpoint() {
        let internal = GrayImage::from_fn(256, 1, |x, _| Luma([u8::try_from(x).unwrap()]));
        let b = boolean_mask(&internal);
        assert_eq!(b.get_pixel(127, 0)[0], 0);
        assert_eq!(b.get_pixel(128, 0)[0], 255);
    }

    #[test]
    fn combined_mask_is_zero_outside_external() {
        let boolean = GrayImage::from_fn(4, 1, |x, _| Luma([if x % 2 == 0 { 255 } else { 0 }]));
        let external = GrayImage::from_fn(4, 1, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        let combined = combined_mask(&boolean, &external).unwrap();
        assert_eq!(combined.as_raw(), &vec![0, 255, 0, 0]);
    }

    #[test]
    fn single_channel_mask_passes_through() {
        let engine = InpaintEngine::new();
        let image = gradient_image(16, 16);
        let mask = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, _| {
            Luma([if x < 8 { 0 } else { 255 }])
        }));

        let prepared = engine.prepare(image.clone(), mask.clone()).unwrap();
        match &prepared {
            Prepared::Original { reason, .. } => {
                assert_eq!(*reason, Fallback::UnsupportedMaskMode { channels: 1 });
            }
            Prepared::Inpainted { .. } => panic!("expected passthrough"),
        }
        let (out_image, out_mask) = prepared.into_pair();
        assert_eq!(out_image, image);
        assert_eq!(out_mask, mask);
    }

    #[test]
    fn uniform_internal_mask_passes_through() {
        let engine = InpaintEngine::new();
        let image = gradient_image(16, 16);
        let mask = dual_mask(16, 16, |x, _| (200, if x < 8 { 0 } else { 255 }));

        let prepared = engine.prepare(image, mask).unwrap();
        assert!(matches!(
            prepared,
            Prepared::Original {
                reason: Fallback::UniformInternalMask,
                ..
            }
        ));
    }

    #[test]
    fn uniform_external_mask_passes_through() {
        let engine = InpaintEngine::new();
        let image = gradient_image(16, 16);
        let mask = dual_mask(16, 16, |x, _| (if x < 8 { 0 } else { 255 }, 255));

        let prepared = engine.prepare(image, mask).unwrap();
        assert!(matches!(
            prepared,
            Prepared::Original {
                reason: Fallback::UniformExternalMask,
                ..
            }
        ));
    }

    #[test]
    fn outside_external_mask_is_untouched() {
        let image = gradient_image(40, 30);
        let mask = dual_mask(40, 30, |x, y| {
            let internal = if (10..20).contains(&x) && (10..20).contains(&y) { 255 } else { 0 };
            let external = if (5..25).contains(&x) && (5..25).contains(&y) { 255 } else { 0 };
            (internal, external)
        });

        let (out, _) = nm_inpaint(image.clone(), mask).unwrap();
        let out = out.as_rgb8().unwrap();
        let original = image.as_rgb8().unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            let inside = (5..25).contains(&x) && (5..25).contains(&y);
            if !inside {
                assert_eq!(px, original.get_pixel(x, y), "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn outside_internal_mask_keeps_original_content() {
        let image = gradient_image(40, 30);
        let mask = dual_mask(40, 30, |x, y| {
            let internal = if (10..20).contains(&x) && (10..20).contains(&y) { 255 } else { 0 };
            let external = if (5..25).contains(&x) && (5..25).contains(&y) { 255 } else { 0 };
            (internal, external)
        });

        let (out, strength) = nm_inpaint(image.clone(), mask).unwrap();
        let out = out.as_rgb8().unwrap();
        // transition mask is 0 below the midpoint, so the original wins there
        assert_eq!(out.get_pixel(7, 7), image.as_rgb8().unwrap().get_pixel(7, 7));
        assert_eq!(strength.as_luma8().unwrap().get_pixel(15, 15)[0], 255);
        assert_eq!(strength.as_luma8().unwrap().get_pixel(7, 7)[0], 0);
    }

    #[test]
    fn interior_is_filled_from_surroundings() {
        // red surroundings, a blue block to erase in the middle
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(48, 48, |x, y| {
            if (16..32).contains(&x) && (16..32).contains(&y) {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 0, 0])
            }
        }));
        let mask = dual_mask(48, 48, |x, y| {
            let internal = if (16..32).contains(&x) && (16..32).contains(&y) { 255 } else { 0 };
            let external = if (8..40).contains(&x) && (8..40).contains(&y) { 255 } else { 0 };
            (internal, external)
        });

        let (out, _) = nm_inpaint(image, mask).unwrap();
        let center = out.as_rgb8().unwrap().get_pixel(24, 24);
        assert!(center[0] > 200, "center {center:?}");
        assert!(center[2] < 50, "center {center:?}");
    }

    #[test]
    fn rgba_mask_is_accepted() {
        let image = gradient_image(20, 20);
        let mask = DynamicImage::ImageRgba8(RgbaImage::from_fn(20, 20, |x, _| {
            Rgba([if x > 10 { 255 } else { 0 }, if x > 5 { 255 } else { 0 }, 0, 0])
        }));
        let prepared = InpaintEngine::new().prepare(image, mask).unwrap();
        assert!(matches!(prepared, Prepared::Inpainted { .. }));
    }

    #[test]
    fn mask_of_different_size_is_rejected() {
        let image = gradient_image(64, 64);
        let mask = dual_mask(64, 65, |x, _| {
            (if x >= 32 { 255 } else { 0 }, if x >= 16 { 255 } else { 0 })
        });
        let err = nm_inpaint(image, mask).unwrap_err();
        match err {
            Error::SizeMismatch { expected, actual } => {
                assert_eq!(expected, (64, 64));
                assert_eq!(actual, (64, 65));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unusable_mask_of_different_size_still_passes_through() {
        let image = gradient_image(64, 64);
        let mask = dual_mask(32, 32, |_, _| (0, 255));
        let prepared = InpaintEngine::new().prepare(image, mask).unwrap();
        assert!(matches!(
            prepared,
            Prepared::Original {
                reason: Fallback::UniformInternalMask,
                ..
            }
        ));
    }

    fn six_by_six() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(6, 6, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = (x as u8, y as u8);
            Rgb([40 * x, 40 * y, 200 - 30 * x])
        }))
    }

    #[test]
    fn reconstruction_matches_reference_bytes() {
        // 2x2 hole in the middle, one half-transparent pixel to its left
        let combined = GrayImage::from_fn(6, 6, |x, y| {
            Luma([match (x, y) {
                (2..=3, 2..=3) => 0,
                (1, 2) => 128,
                _ => 255,
            }])
        });
        let masked = masked_source(&six_by_six(), &combined).unwrap();
        assert_eq!(masked.get_pixel(1, 2), &Rgba([20, 40, 85, 128]));
        assert_eq!(masked.get_pixel(2, 2), &Rgba([0, 0, 0, 0]));

        let canvas = reconstruct(&masked).unwrap();
        assert!(canvas.pixels().all(|p| p[3] == 255));

        let expected = [
            ((1, 2), [46, 80, 164]),
            ((2, 2), [83, 83, 137]),
            ((3, 2), [117, 82, 111]),
            ((2, 3), [82, 118, 136]),
            ((3, 3), [117, 117, 111]),
        ];
        let original = six_by_six().to_rgb8();
        for (x, y, px) in canvas.enumerate_pixels() {
            let want = expected
                .iter()
                .find(|&&(pos, _)| pos == (x, y))
                .map_or(original.get_pixel(x, y).0, |&(_, rgb)| rgb);
            assert_eq!(&px.0[..3], &want, "pixel ({x},{y})");
        }
    }

    #[test]
    fn full_pipeline_matches_reference_bytes() {
        let mask = dual_mask(6, 6, |x, y| {
            let internal = match (x, y) {
                (2..=3, 2..=3) => 255,
                (1, 2) => 200,
                _ => 0,
            };
            let external = if (1..=4).contains(&x) && (1..=4).contains(&y) { 255 } else { 0 };
            (internal, external)
        });

        let (out, strength) = nm_inpaint(six_by_six(), mask).unwrap();
        let out = out.as_rgb8().unwrap();
        assert_eq!(strength.as_luma8().unwrap().get_pixel(1, 2)[0], 200);

        let expected = [
            ((1, 2), [69, 87, 148]),
            ((2, 2), [98, 94, 123]),
            ((3, 2), [111, 95, 113]),
            ((2, 3), [99, 107, 124]),
            ((3, 3), [111, 107, 116]),
        ];
        let original = six_by_six().to_rgb8();
        for (x, y, px) in out.enumerate_pixels() {
            let want = expected
                .iter()
                .find(|&&(pos, _)| pos == (x, y))
                .map_or(original.get_pixel(x, y).0, |&(_, rgb)| rgb);
            assert_eq!(px.0, want, "pixel ({x},{y})");
        }
    }

    #[test]
    fn output_paths_follow_input_name() {
        let p = default_output_paths(Path::new("/tmp/photo.jpg"));
        assert_eq!(p.image, PathBuf::from("/tmp/photo_inpaint.jpg"));
        assert_eq!(p.mask, PathBuf::from("/tmp/photo_inpaint_mask.png"));
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn save_image_rejects_unknown_extension() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        let err = save_image(&img, Path::new("out.xyz")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
