use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::ServeContext;
use super::error::ApiError;
use crate::model::{ModelDescription, parse_request};

pub(super) fn routes() -> Router<Arc<ServeContext>> {
    Router::new()
        .route("/predict", post(predict))
        .route("/ping", get(ping))
        .route("/metadata", get(metadata))
        .route("/prototype", get(prototype))
}

async fn predict(
    State(ctx): State<Arc<ServeContext>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::invalid_body(format!("request body is not JSON: {err}")))?;
    let rows = parse_request(value)?;
    let labels = ctx.wrapper().predict(&rows)?;
    tracing::debug!(rows = labels.len(), "Served prediction");
    Ok(Json(json!({ "predict": labels })))
}

async fn ping() -> Json<Value> {
    Json(json!({ "ping": "pong" }))
}

async fn metadata(State(ctx): State<Arc<ServeContext>>) -> Json<ModelDescription> {
    Json(ctx.description().clone())
}

async fn prototype(State(ctx): State<Arc<ServeContext>>) -> Json<Value> {
    let prototype = ctx.wrapper().prototype();
    Json(json!({
        "features": prototype.features(),
        "example": prototype.example(),
    }))
}
