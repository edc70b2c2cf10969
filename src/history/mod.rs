//! Operation log with an undo/redo cursor over an immutable baseline.

pub mod replay;

use image::RgbaImage;
use thiserror::Error;

use crate::buffer::Image;
use crate::config::EditorConfig;
use crate::editor::{draw_overlay, FilterToggleSet, Operation, OperationError, Tone};
use replay::{replay, ReplayFrame};

pub use replay::render;

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] OperationError),
    #[error("replay failed at log index {at_index}: {cause}")]
    ReplayFailed {
        at_index: usize,
        #[source]
        cause: OperationError,
    },
}

/// Edit log over a baseline image.
///
/// `log[..cursor]` produced the displayed image; `log[cursor..]` is the redo tail.
#[derive(Debug, Clone)]
pub struct EditHistory {
    baseline: Image,
    log: Vec<Operation>,
    cursor: usize,
    config: EditorConfig,
    overlay_baseline: Image,
    overlay_layer: Option<RgbaImage>,
    display: Image,
}

impl EditHistory {
    pub fn new(baseline: Image, config: EditorConfig) -> Self {
        Self {
            overlay_baseline: baseline.clone(),
            display: baseline.clone(),
            baseline,
            log: Vec::new(),
            cursor: 0,
            config,
            overlay_layer: None,
        }
    }

    /// Loads a recorded log as a redo tail; nothing is applied until `redo` or `seek`.
    pub fn with_log(baseline: Image, log: Vec<Operation>, config: EditorConfig) -> Self {
        let mut history = Self::new(baseline, config);
        history.log = log;
        history
    }

    pub fn baseline(&self) -> &Image {
        &self.baseline
    }

    pub fn overlay_baseline(&self) -> &Image {
        &self.overlay_baseline
    }

    /// Last successfully rendered image.
    pub fn display(&self) -> &Image {
        &self.display
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn log(&self) -> &[Operation] {
        &self.log
    }

    pub fn applied(&self) -> &[Operation] {
        &self.log[..self.cursor]
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.log.len()
    }

    /// Appends `operation` at the cursor, discarding any redo tail.
    ///
    /// On error the log, cursor and display are left exactly as they were.
    pub fn push(&mut self, operation: Operation) -> HistoryResult<&Image> {
        if let Err(err) = operation.validate(self.display.dimensions()) {
            tracing::warn!(op = operation.label(), %err, "rejected operation");
            return Err(err.into());
        }

        let frame = if operation.is_overlay() {
            Ok(self.overlay_frame(&operation))
        } else {
            let mut applied = self.applied().to_vec();
            applied.push(operation.clone());
            replay(&self.baseline, &applied, &self.config)
        };
        let frame = frame?;

        let discarded = self.log.len() - self.cursor;
        self.log.truncate(self.cursor);
        tracing::debug!(
            op = operation.label(),
            cursor = self.cursor + 1,
            discarded,
            "push edit"
        );
        self.log.push(operation);
        self.cursor += 1;
        self.install(frame);
        Ok(&self.display)
    }

    /// Steps back one operation. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> HistoryResult<bool> {
        if !self.can_undo() {
            tracing::debug!("undo stack empty");
            return Ok(false);
        }
        self.seek(self.cursor - 1)?;
        Ok(true)
    }

    /// Re-applies the next operation of the redo tail. Returns `false` when the tail is empty.
    pub fn redo(&mut self) -> HistoryResult<bool> {
        if !self.can_redo() {
            tracing::debug!("redo stack empty");
            return Ok(false);
        }
        self.seek(self.cursor + 1)?;
        Ok(true)
    }

    /// Moves the cursor to `target` (clamped to the log length) and replays.
    pub fn seek(&mut self, target: usize) -> HistoryResult<&Image> {
        let target = target.min(self.log.len());
        if target != self.cursor {
            let frame = replay(&self.baseline, &self.log[..target], &self.config)?;
            tracing::debug!(from = self.cursor, to = target, len = self.log.len(), "seek");
            self.cursor = target;
            self.install(frame);
        }
        Ok(&self.display)
    }

    /// Starts over from `baseline`, dropping the whole log.
    pub fn reset(&mut self, baseline: Image) {
        tracing::debug!(
            width = baseline.width(),
            height = baseline.height(),
            dropped = self.log.len(),
            "reset history"
        );
        self.log.clear();
        self.cursor = 0;
        self.overlay_layer = None;
        self.overlay_baseline = baseline.clone();
        self.display = baseline.clone();
        self.baseline = baseline;
    }

    /// Last filter snapshot in the applied prefix.
    pub fn current_filter_state(&self) -> FilterToggleSet {
        self.applied()
            .iter()
            .rev()
            .find_map(|operation| match operation {
                Operation::FilterToggleSet(set) => Some(*set),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Last tone snapshot in the applied prefix.
    pub fn current_tone(&self) -> Tone {
        self.applied()
            .iter()
            .rev()
            .find_map(|operation| match operation {
                Operation::Tone(tone) => Some(*tone),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// What pushing `operation` would display, rendered with `config`, without touching the log.
    pub fn preview(&self, operation: &Operation, config: &EditorConfig) -> HistoryResult<Image> {
        operation.validate(self.display.dimensions())?;
        let mut applied = self.applied().to_vec();
        applied.push(operation.clone());
        replay(&self.baseline, &applied, config).map(|frame| frame.compose())
    }

    // Overlays only touch the overlay layer, so the cached overlay baseline stays valid.
    fn overlay_frame(&self, operation: &Operation) -> ReplayFrame {
        let (width, height) = self.overlay_baseline.dimensions();
        let mut layer = self
            .overlay_layer
            .clone()
            .unwrap_or_else(|| RgbaImage::new(width, height));
        if let Operation::Overlay(overlay) = operation {
            draw_overlay(&mut layer, overlay);
        }
        ReplayFrame {
            pre_overlay: self.overlay_baseline.clone(),
            overlay_layer: Some(layer),
        }
    }

    fn install(&mut self, frame: ReplayFrame) {
        self.display = frame.compose();
        self.overlay_baseline = frame.pre_overlay;
        self.overlay_layer = frame.overlay_layer;
    }
}
