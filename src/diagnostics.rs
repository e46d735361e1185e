//! Optional diagnostic snapshots of intermediate images.
//!
//! The engine reports each intermediate result to a [`Diagnostics`] sink
//! together with the verbosity level it belongs to. Sinks decide whether and
//! how to persist it; none of this affects the engine's output.
//!
//! [`DebugDumper`] writes PNG (and optionally JSON) files into a lazily created
//! directory, with its verbosity taken from a [`DumperConfig`] JSON file of the
//! form `{"<dumper name>": {"level": 5, "image_only": false}}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;

/// A numeric array snapshot: `height` rows of `width` pixels with `channels` samples each.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericGrid {
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
    /// Samples per position.
    pub channels: u32,
    /// Row-major, channel-interleaved values.
    pub values: Vec<f32>,
}

impl NumericGrid {
    /// Build a single-channel grid from a grayscale mask scaled to `[0, 1]`.
    #[must_use]
    pub fn from_mask(mask: &GrayImage) -> Self {
        Self {
            width: mask.width(),
            height: mask.height(),
            channels: 1,
            values: mask.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }

    fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }
}

/// Payload of a diagnostic snapshot.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// A rendered 8-bit image.
    Image(DynamicImage),
    /// A raw numeric array.
    Grid(NumericGrid),
}

/// Receiver for diagnostic snapshots.
pub trait Diagnostics: Send + Sync {
    /// Highest snapshot level this sink stores.
    fn level(&self) -> u32;

    /// Store a named snapshot declared at `level`.
    fn record(&self, name: &str, level: u32, snapshot: &Snapshot);

    /// Whether a snapshot at `level` would be stored.
    fn accepts(&self, level: u32) -> bool {
        self.level() >= level
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn level(&self) -> u32 {
        0
    }

    fn record(&self, _name: &str, _level: u32, _snapshot: &Snapshot) {}

    fn accepts(&self, _level: u32) -> bool {
        false
    }
}

/// Per-dumper settings loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct DumperConfig {
    entries: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl DumperConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the text is not a JSON
    /// object of objects.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self {
            entries: serde_json::from_str(text)?,
        })
    }

    /// Load a configuration file. A missing file yields an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("diagnostics config {} not found", path.display());
            return Ok(Self::default());
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Look up a raw parameter for a named dumper.
    #[must_use]
    pub fn get(&self, dumper: &str, parameter: &str) -> Option<&serde_json::Value> {
        self.entries.get(dumper)?.get(parameter)
    }

    /// Verbosity level for a dumper, 0 when unset.
    #[must_use]
    pub fn level(&self, dumper: &str) -> u32 {
        self.get(dumper, "level")
            .and_then(serde_json::Value::as_u64)
            .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX))
    }

    /// Whether grids are stored as images only (no JSON sidecar), `true` when unset.
    #[must_use]
    pub fn image_only(&self, dumper: &str) -> bool {
        self.get(dumper, "image_only")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true)
    }
}

#[derive(Serialize)]
struct GridDump<'a> {
    dtype: &'static str,
    shape: [u32; 3],
    values: &'a [f32],
}

/// Writes snapshots as files under a per-run directory.
#[derive(Debug)]
pub struct DebugDumper {
    name: String,
    level: u32,
    image_only: bool,
    base_path: PathBuf,
    timestamped: bool,
    dir: Mutex<Option<PathBuf>>,
    seq: AtomicU32,
}

impl DebugDumper {
    /// Create a dumper named `name` writing below `base_path`.
    ///
    /// Settings for `name` are taken from `config`. Nothing touches the
    /// filesystem until the first snapshot is stored.
    #[must_use]
    pub fn new(name: &str, base_path: impl Into<PathBuf>, config: &DumperConfig) -> Self {
        Self {
            name: name.to_string(),
            level: config.level(name),
            image_only: config.image_only(name),
            base_path: base_path.into(),
            timestamped: true,
            dir: Mutex::new(None),
            seq: AtomicU32::new(0),
        }
    }

    /// Write directly into the base path instead of a timestamped sub-directory.
    #[must_use]
    pub fn without_subdir(mut self) -> Self {
        self.timestamped = false;
        self
    }

    /// Override the configured verbosity level.
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Dumper name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output directory, created on first use.
    fn output_dir(&self) -> Result<PathBuf> {
        let mut guard = self.dir.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.clone());
        }

        let dir = if self.timestamped {
            let stamp = chrono::Local::now().format("%y-%m-%d_%H-%M-%S").to_string();
            self.base_path.join(stamp)
        } else {
            self.base_path.clone()
        };
        std::fs::create_dir_all(&dir)?;
        info!("dumper '{}' writing to {}", self.name, dir.display());

        *guard = Some(dir.clone());
        Ok(dir)
    }

    fn store(&self, name: &str, snapshot: &Snapshot) -> Result<Option<PathBuf>> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stem = format!("{seq:04}_{name}");

        match snapshot {
            Snapshot::Image(image) => {
                let path = self.output_dir()?.join(format!("{stem}.png"));
                image.save(&path)?;
                Ok(Some(path))
            }
            Snapshot::Grid(grid) => {
                let Some((rendered, denormalized)) = render_grid(grid) else {
                    info!(
                        "snapshot '{name}' not saved: {} channels not supported",
                        grid.channels
                    );
                    return Ok(None);
                };
                let dir = self.output_dir()?;
                if !self.image_only {
                    let dump = GridDump {
                        dtype: "float32",
                        shape: [grid.height, grid.width, grid.channels],
                        values: &grid.values,
                    };
                    let json_path = dir.join(format!("{stem}.json"));
                    std::fs::write(&json_path, serde_json::to_vec(&dump)?)?;
                }
                let suffix = if denormalized { "_denorm" } else { "" };
                let path = dir.join(format!("{stem}{suffix}.png"));
                rendered.save(&path)?;
                Ok(Some(path))
            }
        }
    }
}

impl Diagnostics for DebugDumper {
    fn level(&self) -> u32 {
        self.level
    }

    fn record(&self, name: &str, level: u32, snapshot: &Snapshot) {
        if !self.accepts(level) {
            return;
        }
        match self.store(name, snapshot) {
            Ok(Some(path)) => info!("snapshot '{name}' saved to {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("snapshot '{name}' not saved: {e}"),
        }
    }
}

/// Render a grid as an 8-bit image.
///
/// Grids with negative values are assumed to lie in `[-1, 1]` and are mapped
/// to `[0, 1]` first; the flag in the result reports whether that happened.
fn render_grid(grid: &NumericGrid) -> Option<(DynamicImage, bool)> {
    let denormalize = grid.min() < 0.0;
    let bytes: Vec<u8> = grid
        .values
        .iter()
        .map(|&v| {
            let v = if denormalize { v / 2.0 + 0.5 } else { v };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let byte = (v * 255.0).clamp(0.0, 255.0) as u8;
            byte
        })
        .collect();

    let (w, h) = (grid.width, grid.height);
    let image = match grid.channels {
        1 => GrayImage::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(w, h, bytes).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
        _ => None,
    }?;
    Some((image, denormalize))
}
