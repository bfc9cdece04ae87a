//! Builds the served model at process start: load, split, fit, evaluate, wrap.

use std::path::Path;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::dataset::{Dataset, DatasetLoadError, SplitError, load_dataset, train_test_split};
use crate::ml::{Evaluation, Pipeline, PipelineError, evaluate};
use crate::model::{InputPrototype, ModelWrapper, SchemaError, TrainingSummary, WrapperError};
use crate::registry::{FolderRegistry, ModelRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load dataset: {0}")]
    Dataset(#[from] DatasetLoadError),
    #[error("failed to split dataset: {0}")]
    Split(#[from] SplitError),
    #[error("failed to fit pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("failed to build input prototype: {0}")]
    Prototype(#[from] SchemaError),
    #[error("failed to wrap model: {0}")]
    Wrapper(#[from] WrapperError),
    #[error("model registry: {0}")]
    Registry(#[from] RegistryError),
}

/// A freshly fitted wrapper and its held-out scores.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub wrapper: ModelWrapper,
    pub evaluation: Evaluation,
}

/// Load the configured dataset and train on it.
pub fn train_from_config(config: &ServiceConfig) -> Result<TrainedModel, StartupError> {
    let dataset = load_dataset(&config.dataset.path, &config.dataset_spec())?;
    train_on(&dataset, config, &config.dataset.path)
}

/// Split, fit and evaluate; the scaler and classifier only ever see Train rows.
pub fn train_on(
    dataset: &Dataset,
    config: &ServiceConfig,
    source: &Path,
) -> Result<TrainedModel, StartupError> {
    let training = &config.training;
    let split = train_test_split(dataset, training.test_fraction, training.seed)?;
    tracing::info!(
        train = split.train_len(),
        test = split.test_len(),
        seed = training.seed,
        "Split dataset"
    );

    let pipeline = Pipeline::fit(
        split.train_features.view(),
        &split.train_labels,
        &config.pipeline_options(),
    )?;
    let evaluation = evaluate(&pipeline, split.test_features.view(), &split.test_labels)?;
    log_evaluation(&evaluation);

    let example = split.train_features.row(0).to_vec();
    let prototype = InputPrototype::from_example(dataset.feature_names(), &example)?;
    let summary = TrainingSummary {
        dataset: source.display().to_string(),
        rows: dataset.len(),
        train_rows: split.train_len(),
        test_rows: split.test_len(),
        test_fraction: training.test_fraction,
        seed: training.seed,
        converged: pipeline.converged(),
        test_accuracy: Some(evaluation.accuracy),
    };
    let wrapper = ModelWrapper::new(config.model.name.clone(), pipeline, prototype)?
        .with_training(summary);
    tracing::info!(
        name = wrapper.name(),
        fingerprint = wrapper.fingerprint(),
        "Model ready"
    );
    Ok(TrainedModel {
        wrapper,
        evaluation,
    })
}

/// Folder registry named by the config, if any.
pub fn registry_from_config(config: &ServiceConfig) -> Option<FolderRegistry> {
    config.registry.folder.as_ref().map(FolderRegistry::new)
}

/// Produce the wrapper to serve, consulting `registry` when configured.
pub fn prepare_model(
    config: &ServiceConfig,
    registry: Option<&dyn ModelRegistry>,
) -> Result<ModelWrapper, StartupError> {
    if config.remote.is_configured() {
        tracing::info!(
            url = config.remote.url.as_deref().unwrap_or_default(),
            "Remote registry credentials present; remote registry is disabled"
        );
    }
    let name = config.model.name.as_str();
    if config.registry.load_existing
        && let Some(registry) = registry
    {
        match registry.load(name) {
            Ok(wrapper) => return Ok(wrapper),
            Err(RegistryError::NotFound(_)) => {
                tracing::info!(name, "No stored model; training from dataset");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let trained = train_from_config(config)?;
    match registry {
        Some(registry) if config.registry.save_on_startup => {
            let version = registry.save(name, &trained.wrapper)?;
            Ok(trained.wrapper.with_version(version))
        }
        _ => Ok(trained.wrapper),
    }
}

pub fn log_evaluation(evaluation: &Evaluation) {
    tracing::info!(
        rows = evaluation.rows,
        accuracy = evaluation.accuracy,
        unseen_labels = evaluation.unseen_labels,
        "Held-out evaluation"
    );
    for class in &evaluation.per_class {
        tracing::info!(
            class = %class.class_id,
            precision = class.precision,
            recall = class.recall,
            support = class.support,
            "Per-class scores"
        );
    }
}
