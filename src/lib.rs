pub mod buffer;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod logging;
pub mod session;
pub mod storage;
pub use error::{AppError, AppResult};

use std::path::{Path, PathBuf};

use config::AppConfig;
use session::{EditSession, SessionCommand};
use storage::SessionStore;

const RESTORE_ARG: &str = "--restore";

/// Where a batch run takes its starting image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    Path(PathBuf),
    /// The flattened image persisted by an earlier run.
    Restore,
}

impl BatchInput {
    pub fn from_arg(arg: &str) -> Self {
        if arg == RESTORE_ARG {
            Self::Restore
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input: BatchInput,
    pub script: PathBuf,
    pub output: PathBuf,
}

pub fn load_script(path: &Path) -> AppResult<Vec<SessionCommand>> {
    let raw = std::fs::read_to_string(path).map_err(|source| AppError::ScriptIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| AppError::Script {
        path: path.to_path_buf(),
        source,
    })
}

/// Entrypoint used by the CLI: load, replay the script, save, then persist per config.
pub fn run(job: &BatchJob, config: &AppConfig) -> AppResult<EditSession> {
    let commands = load_script(&job.script)?;
    let store = SessionStore::from_config(config)?;
    let mut session = EditSession::new(config.editor(), store);

    match &job.input {
        BatchInput::Path(path) => {
            session.load_path(path)?;
        }
        BatchInput::Restore => {
            if !session.restore()? {
                return Err(AppError::NoPersistedSession {
                    path: session.store().session_image_path(),
                });
            }
        }
    }

    tracing::info!(commands = commands.len(), "running edit script");
    for command in commands {
        session.handle(command)?;
    }

    session.save_to(&job.output)?;
    if config.persist_session {
        session.persist()?;
    }
    tracing::info!(
        output = %job.output.display(),
        undo = session.can_undo(),
        "batch complete"
    );
    Ok(session)
}
