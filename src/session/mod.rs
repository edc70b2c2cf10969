//! One editing session: the boundary the display front-end talks to.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{BufferError, Image};
use crate::config::EditorConfig;
use crate::editor::{FilterToggleSet, Operation, Tone};
use crate::history::{EditHistory, HistoryError};
use crate::storage::{self, SessionStore, StorageError};

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image loaded")]
    NoImage,
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Discrete user action forwarded by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    Edit { operation: Operation },
    Undo,
    Redo,
    /// Drops every edit and returns to the loaded image.
    Revert,
}

impl SessionCommand {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Edit { operation } => operation.label(),
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Revert => "revert",
        }
    }
}

#[derive(Debug)]
pub struct EditSession {
    config: EditorConfig,
    store: SessionStore,
    history: Option<EditHistory>,
}

impl EditSession {
    pub const fn new(config: EditorConfig, store: SessionStore) -> Self {
        Self {
            config,
            store,
            history: None,
        }
    }

    pub fn history(&self) -> Option<&EditHistory> {
        self.history.as_ref()
    }

    pub fn display(&self) -> Option<&Image> {
        self.history.as_ref().map(EditHistory::display)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn history_mut(&mut self) -> SessionResult<&mut EditHistory> {
        self.history.as_mut().ok_or(SessionError::NoImage)
    }

    fn current(&self) -> SessionResult<&Image> {
        self.display().ok_or(SessionError::NoImage)
    }

    /// Installs a new baseline (file load or camera frame); prior history is dropped.
    pub fn replace_image(&mut self, image: Image) -> &Image {
        tracing::info!(
            width = image.width(),
            height = image.height(),
            mode = ?image.mode(),
            "new baseline"
        );
        let history = match self.history.take() {
            Some(mut history) => {
                history.reset(image);
                history
            }
            None => EditHistory::new(image, self.config),
        };
        self.history.insert(history).display()
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> SessionResult<&Image> {
        let image = Image::load(bytes)?;
        Ok(self.replace_image(image))
    }

    pub fn load_path(&mut self, path: &Path) -> SessionResult<&Image> {
        let image = storage::read_image(path)?;
        tracing::info!(path = %path.display(), "loaded image");
        Ok(self.replace_image(image))
    }

    pub fn handle(&mut self, command: SessionCommand) -> SessionResult<&Image> {
        tracing::debug!(command = command.label(), "handle command");
        match command {
            SessionCommand::Edit { operation } => self.apply(operation),
            SessionCommand::Undo => self.undo(),
            SessionCommand::Redo => self.redo(),
            SessionCommand::Revert => self.revert(),
        }
    }

    pub fn apply(&mut self, operation: Operation) -> SessionResult<&Image> {
        Ok(self.history_mut()?.push(operation)?)
    }

    pub fn undo(&mut self) -> SessionResult<&Image> {
        self.history_mut()?.undo()?;
        self.current()
    }

    pub fn redo(&mut self) -> SessionResult<&Image> {
        self.history_mut()?.redo()?;
        self.current()
    }

    pub fn revert(&mut self) -> SessionResult<&Image> {
        let history = self.history_mut()?;
        let baseline = history.baseline().clone();
        history.reset(baseline);
        self.current()
    }

    /// Renders `operation` with the light blur preset without recording it.
    pub fn preview(&self, operation: &Operation) -> SessionResult<Image> {
        let history = self.history.as_ref().ok_or(SessionError::NoImage)?;
        Ok(history.preview(operation, &self.config.preview())?)
    }

    pub fn filter_state(&self) -> FilterToggleSet {
        self.history
            .as_ref()
            .map(EditHistory::current_filter_state)
            .unwrap_or_default()
    }

    pub fn tone(&self) -> Tone {
        self.history
            .as_ref()
            .map(EditHistory::current_tone)
            .unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.history.as_ref().is_some_and(EditHistory::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.history.as_ref().is_some_and(EditHistory::can_redo)
    }

    /// Writes the displayed image; the format follows the file extension.
    pub fn save_to(&self, path: &Path) -> SessionResult<()> {
        storage::write_image(path, self.current()?)?;
        tracing::info!(path = %path.display(), "saved image");
        Ok(())
    }

    /// Flattens the displayed image to the session file. `None` when nothing is loaded.
    pub fn persist(&self) -> SessionResult<Option<PathBuf>> {
        match self.display() {
            Some(image) => Ok(Some(self.store.persist(image)?)),
            None => Ok(None),
        }
    }

    /// Loads the persisted image as a fresh baseline. Returns whether one was found.
    pub fn restore(&mut self) -> SessionResult<bool> {
        match self.store.load()? {
            Some(image) => {
                self.replace_image(image);
                Ok(true)
            }
            None => {
                tracing::debug!(
                    path = %self.store.session_image_path().display(),
                    "no persisted session"
                );
                Ok(false)
            }
        }
    }
}
