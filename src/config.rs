//! Service configuration.
//!
//! Config keys (TOML): `[dataset] path, feature_columns, label_column`,
//! `[training] test_fraction, seed, c, tolerance, max_iter, zero_variance`,
//! `[model] name`, `[server] host, port`,
//! `[registry] folder, save_on_startup, load_existing`,
//! `[logging] level, file, directory, max_files`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::AppDirError;
use crate::dataset::{ColumnSelector, DatasetSpec};
use crate::ml::svc::TrainOptions;
use crate::ml::{PipelineOptions, ZeroVariancePolicy};

mod load;

pub use load::{
    CONFIG_FILE_NAME, DATASET_ENV, PORT_ENV, REMOTE_KEY_ENV, REMOTE_URL_ENV, apply_env_overrides,
    config_path, load, load_from, load_or_default,
};

/// Errors that may occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {var}: `{value}`")]
    InvalidEnv { var: &'static str, value: String },
    #[error("Invalid config value `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub dataset: DatasetSettings,
    pub training: TrainingSettings,
    pub model: ModelSettings,
    pub server: ServerSettings,
    pub registry: RegistrySettings,
    pub logging: LoggingSettings,
    /// Filled from the environment only.
    #[serde(skip)]
    pub remote: RemoteRegistry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    pub path: PathBuf,
    pub feature_columns: Vec<ColumnSelector>,
    pub label_column: ColumnSelector,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scooby-do.arrow"),
            feature_columns: vec![ColumnSelector::Index(1), ColumnSelector::Index(2)],
            label_column: ColumnSelector::Name("monster_real".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub test_fraction: f64,
    pub seed: u64,
    pub c: f64,
    pub tolerance: f64,
    pub max_iter: usize,
    pub zero_variance: ZeroVariancePolicy,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let svc = TrainOptions::default();
        Self {
            test_fraction: 0.2,
            seed: svc.seed,
            c: svc.c,
            tolerance: svc.tolerance,
            max_iter: svc.max_iter,
            zero_variance: ZeroVariancePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub name: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "isabel.zimmerman/scooby-doo".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Root of a folder registry; no registry when unset.
    pub folder: Option<PathBuf>,
    pub save_on_startup: bool,
    pub load_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Write a per-launch log file next to stdout.
    pub file: bool,
    /// Log directory; `<app dir>/logs` when unset.
    pub directory: Option<PathBuf>,
    /// Log files kept per binary.
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            directory: None,
            max_files: 10,
        }
    }
}

/// Credentials for a hosted model registry.
#[derive(Clone, Default, PartialEq)]
pub struct RemoteRegistry {
    pub api_key: Option<String>,
    pub url: Option<String>,
}

impl RemoteRegistry {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.url.is_some()
    }
}

impl std::fmt::Debug for RemoteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRegistry")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("url", &self.url)
            .finish()
    }
}

impl ServiceConfig {
    pub fn dataset_spec(&self) -> DatasetSpec {
        DatasetSpec {
            feature_columns: self.dataset.feature_columns.clone(),
            label_column: self.dataset.label_column.clone(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            zero_variance: self.training.zero_variance,
            svc: TrainOptions {
                c: self.training.c,
                tolerance: self.training.tolerance,
                max_iter: self.training.max_iter,
                seed: self.training.seed,
                ..TrainOptions::default()
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.training;
        if !(t.test_fraction.is_finite() && t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(invalid("training.test_fraction", "must lie in (0, 1)"));
        }
        if !(t.c.is_finite() && t.c > 0.0) {
            return Err(invalid("training.c", "must be > 0"));
        }
        if !(t.tolerance.is_finite() && t.tolerance > 0.0) {
            return Err(invalid("training.tolerance", "must be > 0"));
        }
        if t.max_iter == 0 {
            return Err(invalid("training.max_iter", "must be > 0"));
        }
        if self.dataset.feature_columns.is_empty() {
            return Err(invalid(
                "dataset.feature_columns",
                "at least one feature column is required",
            ));
        }
        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name", "must not be empty"));
        }
        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host", "must not be empty"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging.level", "must not be empty"));
        }
        if self.logging.file && self.logging.max_files == 0 {
            return Err(invalid("logging.max_files", "must be > 0 when file logging is on"));
        }
        let uses_registry = self.registry.save_on_startup || self.registry.load_existing;
        if uses_registry && self.registry.folder.is_none() {
            return Err(invalid(
                "registry.folder",
                "required when save_on_startup or load_existing is set",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = ServiceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dataset.path, PathBuf::from("scooby-do.arrow"));
        assert_eq!(
            config.dataset.feature_columns,
            vec![ColumnSelector::Index(1), ColumnSelector::Index(2)]
        );
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.seed, 500);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.model.name, "isabel.zimmerman/scooby-doo");
        assert_eq!(config.pipeline_options().svc, TrainOptions::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [dataset]
            feature_columns = ["height", 2]
            label_column = 3

            [training]
            zero_variance = "reject"

            [logging]
            level = "monster_svc=debug"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.dataset.feature_columns,
            vec![
                ColumnSelector::Name("height".into()),
                ColumnSelector::Index(2)
            ]
        );
        assert_eq!(config.dataset.label_column, ColumnSelector::Index(3));
        assert_eq!(config.training.zero_variance, ZeroVariancePolicy::Reject);
        assert_eq!(config.training.seed, 500);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "monster_svc=debug");
        assert_eq!(config.logging.max_files, 10);
        assert!(config.logging.file);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = ServiceConfig::default();
        config.training.test_fraction = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "training.test_fraction",
                ..
            })
        ));

        let mut config = ServiceConfig::default();
        config.dataset.feature_columns.clear();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.logging.max_files = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "logging.max_files",
                ..
            })
        ));
        config.logging.file = false;
        config.validate().unwrap();

        let mut config = ServiceConfig::default();
        config.registry.load_existing = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "registry.folder",
                ..
            })
        ));
    }

    #[test]
    fn remote_key_is_redacted_in_debug_output() {
        let remote = RemoteRegistry {
            api_key: Some("s3cret".into()),
            url: Some("https://connect.example.com".into()),
        };
        let text = format!("{remote:?}");
        assert!(!text.contains("s3cret"));
        assert!(text.contains("connect.example.com"));
    }
}
