//! Library exports for the service binaries, benchmarks and tests.
/// Application directory helpers.
pub mod app_dirs;
/// Service configuration.
pub mod config;
/// Labeled datasets, loading and splitting.
pub mod dataset;
/// Logging setup.
pub mod logging;
/// Scaler, classifier, pipeline and evaluation.
pub mod ml;
/// Model wrapper and input prototype.
pub mod model;
/// Versioned model storage.
pub mod registry;
/// HTTP prediction server.
pub mod serve;
/// Startup training flow.
pub mod startup;
