//! Operation catalog: the closed set of edits and their pure transforms.

pub mod filters;
mod operation;
mod overlay;
pub mod tone;
mod transform;

use image::RgbaImage;
use thiserror::Error;

use crate::buffer::Image;
use crate::config::EditorConfig;

pub use operation::{
    FilterToggleSet, Kernel, Operation, OverlayKind, Tone, MAX_DIMENSION, TONE_FACTOR_MAX,
};
pub(crate) use overlay::{composite, draw_overlay};
pub(crate) use transform::{full_coverage, is_covered, BufferTransform, ClearFill, Geometry};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("crop box ({left}, {top})-({right}, {bottom}) does not fit a {width}x{height} image")]
    CropOutOfBounds {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },
    #[error("tone factors must be in (0, 3]: brightness={brightness}, contrast={contrast}")]
    InvalidTone { brightness: f64, contrast: f64 },
    #[error("rotation angle must be finite, got {degrees}")]
    InvalidAngle { degrees: f64 },
    #[error("resize target {width}x{height} outside 1..=16384")]
    InvalidResize { width: u32, height: u32 },
    #[error("rotated canvas {width}x{height} would exceed 16384 pixels per side")]
    RotatedCanvasTooLarge { width: u32, height: u32 },
    #[error("text overlay is empty")]
    EmptyText,
    #[error("text overlay font size must be positive")]
    ZeroFontSize,
    #[error("stroke overlay has no points")]
    EmptyStroke,
    #[error("stroke overlay width must be positive")]
    ZeroStrokeWidth,
}

/// Applies a single operation to `image`, returning a new image.
///
/// Overlays are drawn directly on top and filter/tone snapshots are applied as-is;
/// the history's replay composes them with the layering rules instead.
pub fn apply(
    operation: &Operation,
    image: &Image,
    config: &EditorConfig,
) -> Result<Image, OperationError> {
    operation.validate(image.dimensions())?;
    let output = match operation {
        Operation::FilterToggleSet(filters) => filters::apply_filters(image, *filters, config),
        Operation::Tone(tone) => tone::apply_tone(image, *tone),
        Operation::ReplaceColor { from, to } => filters::replace_color(image, *from, *to),
        Operation::Convolve { kernel } => filters::convolve(image, *kernel),
        Operation::Overlay(overlay) => {
            let (width, height) = image.dimensions();
            let mut layer = RgbaImage::new(width, height);
            draw_overlay(&mut layer, overlay);
            composite(image, &layer)
        }
        Operation::Crop { .. }
        | Operation::Rotate { .. }
        | Operation::Flip { .. }
        | Operation::Resize { .. } => match operation.geometry() {
            Some(geometry) => image.transformed(&geometry),
            None => image.clone(),
        },
    };
    Ok(output)
}
