use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

use super::{ModelRegistry, RegistryError, name_segments};
use crate::model::ModelWrapper;

const MODEL_FILE: &str = "model.json";
const FINGERPRINT_PREFIX_LEN: usize = 12;
const VERSION_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second][subsecond digits:3]Z");

/// Registry stored as `<root>/<name segments>/<version>/model.json`.
#[derive(Debug, Clone)]
pub struct FolderRegistry {
    root: PathBuf,
}

impl FolderRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, name: &str) -> Result<PathBuf, RegistryError> {
        let mut dir = self.root.clone();
        for segment in name_segments(name)? {
            dir.push(segment);
        }
        Ok(dir)
    }
}

impl ModelRegistry for FolderRegistry {
    fn load(&self, name: &str) -> Result<ModelWrapper, RegistryError> {
        let versions = self.versions(name)?;
        let Some(version) = versions.last() else {
            return Err(RegistryError::NotFound(name.to_string()));
        };
        let path = self.model_dir(name)?.join(version).join(MODEL_FILE);
        let bytes = fs::read(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        let wrapper = ModelWrapper::from_json_slice(&bytes)
            .map_err(|source| RegistryError::Corrupt { path, source })?;
        tracing::info!(name, version = %version, "Loaded model from folder registry");
        Ok(wrapper.with_version(version.clone()))
    }

    fn save(&self, name: &str, wrapper: &ModelWrapper) -> Result<String, RegistryError> {
        let model_dir = self.model_dir(name)?;
        let stamp = OffsetDateTime::now_utc().format(VERSION_TIME_FORMAT)?;
        let prefix: String = wrapper
            .fingerprint()
            .chars()
            .take(FINGERPRINT_PREFIX_LEN)
            .collect();
        let version = format!("{stamp}-{prefix}");
        let version_dir = model_dir.join(&version);
        fs::create_dir_all(&version_dir).map_err(|source| RegistryError::Io {
            path: version_dir.clone(),
            source,
        })?;

        let json = wrapper.to_json_pretty()?;
        let dest = version_dir.join(MODEL_FILE);
        write_atomic(&dest, json.as_bytes())?;
        tracing::info!(name, version = %version, path = %dest.display(), "Saved model to folder registry");
        Ok(version)
    }

    fn versions(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        let dir = self.model_dir(name)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(RegistryError::Io { path: dir, source }),
        };
        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(MODEL_FILE).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        versions.sort();
        Ok(versions)
    }
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), RegistryError> {
    let tmp = dest.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(|source| io_error(&tmp, source))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|source| io_error(&tmp, source))?;
    drop(file);
    fs::rename(&tmp, dest).map_err(|source| io_error(dest, source))
}

fn io_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}
