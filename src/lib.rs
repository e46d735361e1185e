//! Prepare a smoothly blended seed image and a strength mask for diffusion inpainting.
//!
//! The input mask carries two channels: the red channel marks the region to
//! erase and regenerate, the green channel the outer boundary beyond which the
//! image must not change. The engine fills the erased region with content
//! extrapolated from its surroundings by compositing a pyramid of blurred
//! copies, then fades that reconstruction into the original image along a
//! ramp derived from the red channel.
//!
//! # Quick Start
//!
//! ```no_run
//! use nm_inpainter::nm_inpaint;
//!
//! let image = image::open("photo.png").unwrap();
//! let mask = image::open("photo_mask.png").unwrap();
//! let (seed, strength) = nm_inpaint(image, mask).expect("inpainting failed");
//! seed.save("seed.png").unwrap();
//! strength.save("strength.png").unwrap();
//! ```
//!
//! # Diagnostics
//!
//! Intermediate images can be captured by injecting a [`Diagnostics`] sink,
//! for example a [`DebugDumper`] configured from a JSON file.
//!
//! ```no_run
//! use std::path::Path;
//! use nm_inpainter::{DebugDumper, DumperConfig, InpaintEngine};
//!
//! let config = DumperConfig::load(Path::new("config.json")).unwrap();
//! let dumper = DebugDumper::new("nm_inpainter", "output_images", &config);
//! let engine = InpaintEngine::with_diagnostics(Box::new(dumper));
//! ```

#![deny(missing_docs)]

pub mod blending;
pub mod blur;
pub mod diagnostics;
mod engine;
pub mod error;
pub mod hook;
pub mod normalize;

pub use diagnostics::{DebugDumper, Diagnostics, DumperConfig, NoopDiagnostics, NumericGrid, Snapshot};
pub use engine::{
    boolean_mask, combined_mask, default_output_paths, is_supported_image, nm_inpaint, save_image,
    transition_mask, Fallback, InpaintEngine, OutputPaths, Prepared, ProcessResult, BLUR_PASSES,
    MIDPOINT,
};
pub use error::{Error, Result};
