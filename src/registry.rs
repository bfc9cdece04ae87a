//! Versioned storage for trained model wrappers.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ModelWrapper, WrapperError};

mod folder;

pub use folder::FolderRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid model name `{0}`")]
    InvalidName(String),
    #[error("no stored versions of `{0}`")]
    NotFound(String),
    #[error("registry I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("stored model at {path} is invalid: {source}")]
    Corrupt {
        path: PathBuf,
        source: WrapperError,
    },
    #[error(transparent)]
    Wrapper(#[from] WrapperError),
    #[error("failed to format version timestamp: {0}")]
    Time(#[from] time::error::Format),
}

/// Load and save wrappers by name.
///
/// Names are `/`-separated, e.g. `isabel.zimmerman/scooby-doo`.
pub trait ModelRegistry: Send + Sync {
    /// Newest stored version of `name`.
    fn load(&self, name: &str) -> Result<ModelWrapper, RegistryError>;
    /// Store `wrapper` under `name` and return the new version id.
    fn save(&self, name: &str, wrapper: &ModelWrapper) -> Result<String, RegistryError>;
    /// Stored version ids of `name`, oldest first.
    fn versions(&self, name: &str) -> Result<Vec<String>, RegistryError>;
}

/// Split a model name into path-safe segments.
pub fn name_segments(name: &str) -> Result<Vec<&str>, RegistryError> {
    let segments: Vec<&str> = name.split('/').collect();
    let valid = segments.iter().all(|segment| {
        !segment.is_empty()
            && *segment != "."
            && *segment != ".."
            && !segment.contains('\\')
            && !segment.chars().any(char::is_control)
    });
    if !valid {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_split_on_slash() {
        assert_eq!(
            name_segments("isabel.zimmerman/scooby-doo").unwrap(),
            ["isabel.zimmerman", "scooby-doo"]
        );
        for bad in ["", "a//b", "../x", "a/.", "a\\b", "/abs"] {
            assert!(
                matches!(name_segments(bad), Err(RegistryError::InvalidName(_))),
                "{bad}"
            );
        }
    }
}
