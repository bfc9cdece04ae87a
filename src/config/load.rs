use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::{ConfigError, ServiceConfig};

/// Default filename used to store the service configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const PORT_ENV: &str = "MONSTER_SVC_PORT";
pub const DATASET_ENV: &str = "MONSTER_SVC_DATASET";
pub const REMOTE_KEY_ENV: &str = "API_KEY";
pub const REMOTE_URL_ENV: &str = "RSC_URL";

/// Resolve the configuration file path inside the application directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir()?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the application directory, returning defaults if missing.
pub fn load_or_default() -> Result<ServiceConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }
    load_from(&path)
}

/// Load configuration from an explicit file.
///
/// Relative `dataset.path`, `registry.folder` and `logging.directory` values
/// are resolved against the file's directory.
pub fn load_from(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ServiceConfig =
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(base) = path.parent() {
        config.dataset.path = resolve(base, &config.dataset.path);
        if let Some(folder) = config.registry.folder.take() {
            config.registry.folder = Some(resolve(base, &folder));
        }
        if let Some(dir) = config.logging.directory.take() {
            config.logging.directory = Some(resolve(base, &dir));
        }
    }
    Ok(config)
}

/// Full startup sequence: file (explicit or app dir), environment, validation.
pub fn load(explicit: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_from(path)?,
        None => load_or_default()?,
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply environment overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut ServiceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(PORT_ENV) {
        config.server.port = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv {
                var: PORT_ENV,
                value,
            })?;
    }
    if let Some(value) = lookup(DATASET_ENV).filter(|v| !v.trim().is_empty()) {
        config.dataset.path = PathBuf::from(value);
    }
    config.remote.api_key = lookup(REMOTE_KEY_ENV).filter(|v| !v.is_empty());
    config.remote.url = lookup(REMOTE_URL_ENV).filter(|v| !v.is_empty());
    Ok(())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[dataset]\npath = \"data/monsters.csv\"\n\n[registry]\nfolder = \"models\"\n\n[logging]\ndirectory = \"logs\"\n",
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.dataset.path, dir.path().join("data/monsters.csv"));
        assert_eq!(config.registry.folder, Some(dir.path().join("models")));
        assert_eq!(config.logging.directory, Some(dir.path().join("logs")));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server]\nport = \"eighty\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_from(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_overrides_port_dataset_and_remote() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (PORT_ENV, "9100"),
                (DATASET_ENV, "/data/x.csv"),
                (REMOTE_KEY_ENV, "key"),
                (REMOTE_URL_ENV, "https://rsc.example"),
            ]),
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.dataset.path, PathBuf::from("/data/x.csv"));
        assert!(config.remote.is_configured());

        let err = apply_env_overrides(&mut config, env(&[(PORT_ENV, "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: PORT_ENV, .. }));
    }

    #[test]
    fn empty_env_leaves_config_untouched() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }
}
