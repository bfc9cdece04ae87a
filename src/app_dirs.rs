//! The `.monster-svc` application directory.
//!
//! Holds `config.toml` and, unless `[logging] directory` points elsewhere,
//! the `logs/` folder. The base is the OS config directory, or
//! `MONSTER_SVC_HOME` when set to a non-empty path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = ".monster-svc";
pub const LOGS_DIR_NAME: &str = "logs";
/// Environment variable replacing the OS config directory as the base.
pub const HOME_ENV: &str = "MONSTER_SVC_HOME";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory for this user; set {HOME_ENV}")]
    NoBaseDir,
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the `.monster-svc` directory, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = base_dir(
        std::env::var_os(HOME_ENV),
        BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()),
    )?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// Return the directory log files go to, creating it if needed.
///
/// `configured` wins over `<app root>/logs`.
pub fn logs_dir(configured: Option<&Path>) -> Result<PathBuf, AppDirError> {
    match configured {
        Some(dir) => ensure_dir(dir.to_path_buf()),
        None => ensure_dir(app_root_dir()?.join(LOGS_DIR_NAME)),
    }
}

fn base_dir(home: Option<OsString>, os_config: Option<PathBuf>) -> Result<PathBuf, AppDirError> {
    home.filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or(os_config)
        .ok_or(AppDirError::NoBaseDir)
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
