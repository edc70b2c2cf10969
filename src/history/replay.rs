//! Rebuilds the displayed image from the baseline and an operation prefix.

use image::{GrayImage, RgbaImage};

use super::{EditHistory, HistoryError, HistoryResult};
use crate::buffer::Image;
use crate::config::EditorConfig;
use crate::editor::{
    composite, draw_overlay, filters, full_coverage, is_covered, tone, BufferTransform, ClearFill,
    FilterToggleSet, Geometry, Operation, Tone,
};
use crate::geometry::Color;

/// Result of a replay, split at the overlay boundary.
#[derive(Debug, Clone)]
pub(crate) struct ReplayFrame {
    /// Developed background with recolors, before any overlay.
    pub(crate) pre_overlay: Image,
    /// Transparent canvas holding every overlay, present once one has been drawn.
    pub(crate) overlay_layer: Option<RgbaImage>,
}

impl ReplayFrame {
    pub(crate) fn compose(&self) -> Image {
        match &self.overlay_layer {
            Some(layer) => composite(&self.pre_overlay, layer),
            None => self.pre_overlay.clone(),
        }
    }
}

/// Replays the operations currently applied in `history`.
pub fn render(history: &EditHistory) -> HistoryResult<Image> {
    replay(history.baseline(), history.applied(), history.config()).map(|frame| frame.compose())
}

/// Working state of one replay.
///
/// Geometry moves every layer together. Filter and tone snapshots only change how the
/// background is developed, so a later snapshot replaces an earlier one. Recolors are
/// matched against the developed image as it looked when they were recorded.
struct Canvas<'a> {
    config: &'a EditorConfig,
    background: Image,
    /// `None` while every pixel still comes from the source image.
    coverage: Option<GrayImage>,
    recolor_layer: Option<RgbaImage>,
    overlay_layer: Option<RgbaImage>,
    filters: FilterToggleSet,
    tone: Tone,
}

impl<'a> Canvas<'a> {
    fn new(baseline: &Image, config: &'a EditorConfig) -> Self {
        Self {
            config,
            background: baseline.clone(),
            coverage: None,
            recolor_layer: None,
            overlay_layer: None,
            filters: FilterToggleSet::NONE,
            tone: Tone::IDENTITY,
        }
    }

    fn transform(&mut self, geometry: &Geometry) {
        if self.coverage.is_none() && geometry.expands_canvas() {
            self.coverage = Some(full_coverage(self.background.dimensions()));
        }
        self.background = self.background.transformed(geometry);
        self.coverage = self.coverage.take().map(|mask| geometry.apply(&mask));
        self.recolor_layer = self.recolor_layer.take().map(|layer| geometry.apply(&layer));
        self.overlay_layer = self.overlay_layer.take().map(|layer| geometry.apply(&layer));
    }

    fn covers(&self, x: u32, y: u32) -> bool {
        self.coverage
            .as_ref()
            .map_or(true, |coverage| is_covered(coverage, x, y))
    }

    /// Background under the active look with canvas fill kept at zero, recolors on top.
    fn develop(&self) -> Image {
        let filtered = filters::apply_filters(&self.background, self.filters, self.config);
        let toned = tone::apply_tone(&filtered, self.tone);
        let developed = match &self.coverage {
            Some(coverage) => toned.transformed(&ClearFill { coverage }),
            None => toned,
        };
        match &self.recolor_layer {
            Some(layer) => composite(&developed, layer),
            None => developed,
        }
    }

    fn replace_color(&mut self, from: Color, to: Color) {
        let view = self.develop().to_rgba8();
        let (width, height) = view.dimensions();
        let matches: Vec<(u32, u32)> = view
            .enumerate_pixels()
            .filter(|(x, y, pixel)| {
                let [r, g, b, _] = pixel.0;
                [r, g, b] == from.rgb() && self.covers(*x, *y)
            })
            .map(|(x, y, _)| (x, y))
            .collect();

        let layer = self
            .recolor_layer
            .get_or_insert_with(|| RgbaImage::new(width, height));
        for (x, y) in matches {
            layer.put_pixel(x, y, to.opaque());
        }
    }

    fn draw(&mut self, operation: &Operation) {
        if let Operation::Overlay(overlay) = operation {
            let (width, height) = self.background.dimensions();
            let layer = self
                .overlay_layer
                .get_or_insert_with(|| RgbaImage::new(width, height));
            draw_overlay(layer, overlay);
        }
    }
}

pub(crate) fn replay(
    baseline: &Image,
    operations: &[Operation],
    config: &EditorConfig,
) -> HistoryResult<ReplayFrame> {
    let mut canvas = Canvas::new(baseline, config);

    for (at_index, operation) in operations.iter().enumerate() {
        if let Err(cause) = operation.validate(canvas.background.dimensions()) {
            tracing::warn!(at_index, op = operation.label(), %cause, "replay aborted");
            return Err(HistoryError::ReplayFailed { at_index, cause });
        }

        match operation {
            Operation::FilterToggleSet(set) => canvas.filters = *set,
            Operation::Tone(next) => canvas.tone = *next,
            Operation::Overlay(_) => canvas.draw(operation),
            Operation::ReplaceColor { from, to } => canvas.replace_color(*from, *to),
            Operation::Convolve { kernel } => {
                canvas.background = filters::convolve(&canvas.background, *kernel);
            }
            Operation::Crop { .. }
            | Operation::Rotate { .. }
            | Operation::Flip { .. }
            | Operation::Resize { .. } => {
                if let Some(geometry) = operation.geometry() {
                    canvas.transform(&geometry);
                }
            }
        }
    }

    let pre_overlay = canvas.develop();
    tracing::trace!(
        operations = operations.len(),
        width = pre_overlay.width(),
        height = pre_overlay.height(),
        "replay complete"
    );
    Ok(ReplayFrame {
        pre_overlay,
        overlay_layer: canvas.overlay_layer,
    })
}
