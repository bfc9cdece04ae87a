//! Training and inference building blocks.
//!
//! A [`pipeline::Pipeline`] pairs a [`scaler::FittedScaler`] with a
//! [`svc::LinearSvcModel`]; [`metrics`] scores it on held-out rows.

pub mod metrics;
pub mod pipeline;
pub mod scaler;
pub mod svc;

pub use metrics::{Evaluation, evaluate};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions};
pub use scaler::{FittedScaler, ScalerError, StandardScaler, ZeroVariancePolicy};
