use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::buffer::{BufferError, Image, ImageFormat};
use crate::config::AppConfig;
use thiserror::Error;

const APP_DIR: &str = "retouch";
const SESSION_IMAGE_FILE: &str = "last_session.png";
const STATE_SUBDIR: &str = ".local/state";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Image(#[from] BufferError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Location of the flattened image kept between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state_dir: PathBuf,
}

impl SessionStore {
    pub const fn with_paths(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    pub fn with_default_paths() -> StorageResult<Self> {
        Ok(Self::with_paths(default_state_dir()?))
    }

    pub fn from_config(config: &AppConfig) -> StorageResult<Self> {
        match &config.state_dir {
            Some(dir) => Ok(Self::with_paths(dir.clone())),
            None => Self::with_default_paths(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn session_image_path(&self) -> PathBuf {
        self.state_dir.join(SESSION_IMAGE_FILE)
    }

    /// Flattens `image` to the session file, replacing any previous one.
    pub fn persist(&self, image: &Image) -> StorageResult<PathBuf> {
        let path = self.session_image_path();
        write_image(&path, image)?;
        tracing::info!(path = %path.display(), "persisted session image");
        Ok(path)
    }

    pub fn load(&self) -> StorageResult<Option<Image>> {
        let path = self.session_image_path();
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Image::load(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    pub fn discard(&self) -> StorageResult<()> {
        let path = self.session_image_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }
}

/// Encodes by file extension and writes through a sibling temp file.
pub fn write_image(path: &Path, image: &Image) -> StorageResult<()> {
    let format = ImageFormat::from_path(path)?;
    let bytes = image.save(format)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    fs::write(&staging, bytes).map_err(io_error(&staging))?;
    fs::rename(&staging, path).map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), ?format, "wrote image");
    Ok(())
}

pub fn read_image(path: &Path) -> StorageResult<Image> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    Ok(Image::load(&bytes)?)
}

fn default_state_dir() -> StorageResult<PathBuf> {
    if let Some(state_home) =
        std::env::var_os("XDG_STATE_HOME").filter(|value| !value.is_empty())
    {
        return Ok(PathBuf::from(state_home).join(APP_DIR));
    }
    let home = std::env::var_os("HOME").ok_or(StorageError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home).join(STATE_SUBDIR).join(APP_DIR))
}
