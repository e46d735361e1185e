//! Host pipeline boundary.
//!
//! The host offers a "masked content" menu on its inpainting form. The engine
//! registers one extra entry there, and when a request selects that entry the
//! request's source image and mask are replaced with the engine's outputs
//! before sampling starts.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::InpaintEngine;
use crate::error::Result;

/// Version reported through [`PluginProps`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label and value of the menu entry.
pub const MENU_ITEM_NAME: &str = "NeuralMaster";

/// Host form elements that receive the menu entry.
pub const INPAINTING_FILL_ELEMENTS: &[&str] = &["img2img_inpainting_fill"];

/// Host fill mode meaning "start from the source image as-is".
pub const FILL_ORIGINAL: usize = 1;

/// The host's masked-content menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskedContentChoices {
    choices: Vec<(String, String)>,
    menu_index: Option<usize>,
}

impl MaskedContentChoices {
    /// Wrap an existing `(label, value)` list.
    #[must_use]
    pub fn new(choices: Vec<(String, String)>) -> Self {
        Self {
            choices,
            menu_index: None,
        }
    }

    /// The stock inpainting fill modes.
    #[must_use]
    pub fn img2img_default() -> Self {
        Self::new(
            ["fill", "original", "latent noise", "latent nothing"]
                .into_iter()
                .map(|c| (c.to_string(), c.to_string()))
                .collect(),
        )
    }

    /// Add the menu entry to the form element `elem_id`.
    ///
    /// Elements other than [`INPAINTING_FILL_ELEMENTS`] are ignored. The entry
    /// is appended at most once; its index is returned and remembered.
    pub fn register(&mut self, elem_id: &str) -> Option<usize> {
        if !INPAINTING_FILL_ELEMENTS.contains(&elem_id) {
            return self.menu_index;
        }

        let index = match self
            .choices
            .iter()
            .position(|(label, value)| label == MENU_ITEM_NAME && value == MENU_ITEM_NAME)
        {
            Some(index) => index,
            None => {
                self.choices
                    .push((MENU_ITEM_NAME.to_string(), MENU_ITEM_NAME.to_string()));
                self.choices.len() - 1
            }
        };
        self.menu_index = Some(index);
        Some(index)
    }

    /// Index of the registered entry, if any.
    #[must_use]
    pub fn menu_index(&self) -> Option<usize> {
        self.menu_index
    }

    /// All entries in menu order.
    #[must_use]
    pub fn choices(&self) -> &[(String, String)] {
        &self.choices
    }

    /// Metadata for the introspection endpoint.
    #[must_use]
    pub fn props(&self) -> PluginProps {
        PluginProps {
            version: VERSION.to_string(),
            menu_item_name: MENU_ITEM_NAME.to_string(),
            menu_item_index: self.menu_index,
        }
    }
}

/// Static metadata served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginProps {
    /// Plugin version.
    pub version: String,
    /// Display name of the menu entry.
    pub menu_item_name: String,
    /// Position of the menu entry, `None` before registration.
    pub menu_item_index: Option<usize>,
}

/// The parts of a host generation request the engine reads and rewrites.
#[derive(Debug, Clone)]
pub struct InpaintRequest {
    /// Source images; only the first is processed.
    pub init_images: Vec<DynamicImage>,
    /// Dual-channel inpainting mask.
    pub image_mask: Option<DynamicImage>,
    /// Selected masked-content mode.
    pub inpainting_fill: usize,
}

/// Rewrite `request` in place when it selects the registered menu entry.
///
/// Returns `true` if the request was rewritten. Afterwards the first source
/// image and the mask hold the engine outputs and the fill mode is
/// [`FILL_ORIGINAL`].
///
/// # Errors
///
/// Propagates engine errors; the request is left unmodified in that case.
pub fn before_process(
    engine: &InpaintEngine,
    request: &mut InpaintRequest,
    menu_index: Option<usize>,
) -> Result<bool> {
    let Some(index) = menu_index else {
        return Ok(false);
    };
    if request.inpainting_fill != index {
        return Ok(false);
    }
    let (Some(mask), Some(image)) = (request.image_mask.as_ref(), request.init_images.first())
    else {
        return Ok(false);
    };

    let (image, mask) = engine.inpaint(image.clone(), mask.clone())?;
    info!("inpainting seed prepared");

    request.init_images[0] = image;
    request.image_mask = Some(mask);
    request.inpainting_fill = FILL_ORIGINAL;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn request(fill: usize) -> InpaintRequest {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 24, Rgb([90, 90, 90])));
        let mask = DynamicImage::ImageRgb8(RgbImage::from_fn(24, 24, |x, _| {
            Rgb([if x > 12 { 255 } else { 0 }, if x > 6 { 255 } else { 0 }, 0])
        }));
        InpaintRequest {
            init_images: vec![image],
            image_mask: Some(mask),
            inpainting_fill: fill,
        }
    }

    #[test]
    fn register_appends_once_for_known_element() {
        let mut menu = MaskedContentChoices::img2img_default();
        assert_eq!(menu.register("other_element"), None);
        assert_eq!(menu.choices().len(), 4);

        assert_eq!(menu.register("img2img_inpainting_fill"), Some(4));
        assert_eq!(menu.register("img2img_inpainting_fill"), Some(4));
        assert_eq!(menu.choices().len(), 5);
        assert_eq!(menu.menu_index(), Some(4));
    }

    #[test]
    fn props_serialize_to_json() {
        let mut menu = MaskedContentChoices::img2img_default();
        let before = serde_json::to_value(menu.props()).unwrap();
        assert_eq!(before["menu_item_index"], serde_json::Value::Null);

        menu.register("img2img_inpainting_fill");
        let after = serde_json::to_value(menu.props()).unwrap();
        assert_eq!(after["version"], VERSION);
        assert_eq!(after["menu_item_name"], "NeuralMaster");
        assert_eq!(after["menu_item_index"], 4);
    }

    #[test]
    fn version_follows_package_manifest() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(MaskedContentChoices::default().props().version, VERSION);
    }

    #[test]
    fn other_fill_modes_are_left_alone() {
        let engine = InpaintEngine::new();
        let mut req = request(0);
        assert!(!before_process(&engine, &mut req, Some(4)).unwrap());
        assert_eq!(req.inpainting_fill, 0);
        assert!(!before_process(&engine, &mut req, None).unwrap());
    }

    #[test]
    fn missing_mask_is_left_alone() {
        let engine = InpaintEngine::new();
        let mut req = request(4);
        req.image_mask = None;
        assert!(!before_process(&engine, &mut req, Some(4)).unwrap());
        assert_eq!(req.inpainting_fill, 4);
    }

    #[test]
    fn selected_mode_rewrites_request() {
        let engine = InpaintEngine::new();
        let mut req = request(4);
        assert!(before_process(&engine, &mut req, Some(4)).unwrap());

        assert_eq!(req.inpainting_fill, FILL_ORIGINAL);
        let mask = req.image_mask.as_ref().unwrap().as_luma8().unwrap();
        assert_eq!(mask.get_pixel(20, 0), &Luma([255]));
        assert_eq!(mask.get_pixel(2, 0), &Luma([0]));
        assert!(req.init_images[0].as_rgb8().is_some());
    }

    #[test]
    fn unusable_mask_still_switches_to_original_fill() {
        let engine = InpaintEngine::new();
        let mut req = request(4);
        req.image_mask = Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(24, 24, Luma([255]))));
        assert!(before_process(&engine, &mut req, Some(4)).unwrap());
        assert_eq!(req.inpainting_fill, FILL_ORIGINAL);
        assert!(req.image_mask.as_ref().unwrap().as_luma8().is_some());
    }
}
