use serde::{Deserialize, Serialize};

use super::transform::{rotated_extent, Geometry};
use super::OperationError;
use crate::geometry::{Axis, Color, Point};

pub const TONE_FACTOR_MAX: f64 = 3.0;
/// Largest width or height a resize or rotation may produce.
pub const MAX_DIMENSION: u32 = 16_384;

/// Complete snapshot of which filters are active.
///
/// Filters run in the fixed order grayscale, sepia, invert, blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterToggleSet {
    pub grayscale: bool,
    pub sepia: bool,
    pub invert: bool,
    pub blur: bool,
}

impl FilterToggleSet {
    pub const NONE: FilterToggleSet = FilterToggleSet {
        grayscale: false,
        sepia: false,
        invert: false,
        blur: false,
    };

    pub const fn is_empty(&self) -> bool {
        !(self.grayscale || self.sepia || self.invert || self.blur)
    }
}

/// Multiplicative brightness then contrast, both in `(0, 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tone {
    pub brightness: f64,
    pub contrast: f64,
}

impl Tone {
    pub const IDENTITY: Tone = Tone {
        brightness: 1.0,
        contrast: 1.0,
    };

    pub const fn new(brightness: f64, contrast: f64) -> Self {
        Self {
            brightness,
            contrast,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    fn validate(&self) -> Result<(), OperationError> {
        let in_range = |factor: f64| factor.is_finite() && factor > 0.0 && factor <= TONE_FACTOR_MAX;
        if in_range(self.brightness) && in_range(self.contrast) {
            Ok(())
        } else {
            Err(OperationError::InvalidTone {
                brightness: self.brightness,
                contrast: self.contrast,
            })
        }
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayKind {
    Stroke {
        points: Vec<Point>,
        color: Color,
        width: u32,
    },
    Text {
        content: String,
        position: Point,
        font_size: u32,
        color: Color,
    },
}

impl OverlayKind {
    fn validate(&self) -> Result<(), OperationError> {
        match self {
            Self::Stroke { points, width, .. } => {
                if points.is_empty() {
                    return Err(OperationError::EmptyStroke);
                }
                if *width == 0 {
                    return Err(OperationError::ZeroStrokeWidth);
                }
            }
            Self::Text {
                content, font_size, ..
            } => {
                if content.trim().is_empty() {
                    return Err(OperationError::EmptyText);
                }
                if *font_size == 0 {
                    return Err(OperationError::ZeroFontSize);
                }
            }
        }
        Ok(())
    }
}

/// 3x3 convolution kernels with the classic PIL weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Detail,
    Sharpen,
    Contour,
    Smooth,
}

impl Kernel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Sharpen => "sharpen",
            Self::Contour => "contour",
            Self::Smooth => "smooth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Crop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    Rotate {
        degrees: f64,
    },
    Flip {
        axis: Axis,
    },
    Resize {
        width: u32,
        height: u32,
    },
    ReplaceColor {
        from: Color,
        to: Color,
    },
    Convolve {
        kernel: Kernel,
    },
    FilterToggleSet(FilterToggleSet),
    Tone(Tone),
    Overlay(OverlayKind),
}

impl Operation {
    pub const fn is_overlay(&self) -> bool {
        matches!(self, Self::Overlay(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Crop { .. } => "crop",
            Self::Rotate { .. } => "rotate",
            Self::Flip { .. } => "flip",
            Self::Resize { .. } => "resize",
            Self::ReplaceColor { .. } => "replace color",
            Self::Convolve { kernel } => kernel.label(),
            Self::FilterToggleSet(_) => "filters",
            Self::Tone(_) => "tone",
            Self::Overlay(OverlayKind::Stroke { .. }) => "stroke",
            Self::Overlay(OverlayKind::Text { .. }) => "text",
        }
    }

    pub(crate) fn geometry(&self) -> Option<Geometry> {
        match *self {
            Self::Crop {
                left,
                top,
                right,
                bottom,
            } => Some(Geometry::Crop {
                x: left,
                y: top,
                width: right - left,
                height: bottom - top,
            }),
            Self::Rotate { degrees } => Some(Geometry::Rotate { degrees }),
            Self::Flip { axis } => Some(Geometry::Flip(axis)),
            Self::Resize { width, height } => Some(Geometry::Resize { width, height }),
            _ => None,
        }
    }

    /// Checks the payload against the dimensions of the image it will be applied to.
    pub fn validate(&self, (width, height): (u32, u32)) -> Result<(), OperationError> {
        match self {
            Self::Crop {
                left,
                top,
                right,
                bottom,
            } => {
                if left >= right || top >= bottom || *right > width || *bottom > height {
                    return Err(OperationError::CropOutOfBounds {
                        left: *left,
                        top: *top,
                        right: *right,
                        bottom: *bottom,
                        width,
                        height,
                    });
                }
                Ok(())
            }
            Self::Rotate { degrees } => {
                if !degrees.is_finite() {
                    return Err(OperationError::InvalidAngle { degrees: *degrees });
                }
                let (rotated_width, rotated_height) = rotated_extent((width, height), *degrees);
                let grows = rotated_width > width.max(height) || rotated_height > width.max(height);
                if grows && (rotated_width > MAX_DIMENSION || rotated_height > MAX_DIMENSION) {
                    return Err(OperationError::RotatedCanvasTooLarge {
                        width: rotated_width,
                        height: rotated_height,
                    });
                }
                Ok(())
            }
            Self::Resize {
                width: target_width,
                height: target_height,
            } => {
                let in_range = |value: u32| (1..=MAX_DIMENSION).contains(&value);
                if in_range(*target_width) && in_range(*target_height) {
                    Ok(())
                } else {
                    Err(OperationError::InvalidResize {
                        width: *target_width,
                        height: *target_height,
                    })
                }
            }
            Self::Tone(tone) => tone.validate(),
            Self::Overlay(overlay) => overlay.validate(),
            Self::Flip { .. }
            | Self::ReplaceColor { .. }
            | Self::Convolve { .. }
            | Self::FilterToggleSet(_) => Ok(()),
        }
    }
}
