use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "retouch";
const APP_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BLUR_RADIUS: f32 = 5.0;
pub const DEFAULT_PREVIEW_BLUR_RADIUS: f32 = 2.0;

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub blur_radius: Option<f32>,
    #[serde(default)]
    pub preview_blur_radius: Option<f32>,
    #[serde(default = "default_true")]
    pub persist_session: bool,
    #[serde(default)]
    pub restore_session: bool,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            blur_radius: None,
            preview_blur_radius: None,
            persist_session: true,
            restore_session: false,
            state_dir: None,
        }
    }
}

impl AppConfig {
    pub fn editor(&self) -> EditorConfig {
        EditorConfig {
            blur_radius: sanitize_radius(self.blur_radius, DEFAULT_BLUR_RADIUS),
            preview_blur_radius: sanitize_radius(
                self.preview_blur_radius,
                DEFAULT_PREVIEW_BLUR_RADIUS,
            ),
        }
    }
}

fn sanitize_radius(value: Option<f32>, fallback: f32) -> f32 {
    match value {
        Some(radius) if radius.is_finite() && radius > 0.0 => radius,
        Some(radius) => {
            tracing::warn!(radius, fallback, "ignoring invalid blur radius");
            fallback
        }
        None => fallback,
    }
}

/// Runtime parameters for the operation catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    pub blur_radius: f32,
    pub preview_blur_radius: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            blur_radius: DEFAULT_BLUR_RADIUS,
            preview_blur_radius: DEFAULT_PREVIEW_BLUR_RADIUS,
        }
    }
}

impl EditorConfig {
    /// Same settings with the light blur radius, for interactive previews.
    pub fn preview(self) -> Self {
        Self {
            blur_radius: self.preview_blur_radius,
            ..self
        }
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
