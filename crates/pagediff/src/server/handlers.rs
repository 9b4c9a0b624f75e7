use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value, json};
use tracing::{Instrument, debug};

use super::AppState;
use super::response::{ApiError, CompareRequest, CompareResponse};
use crate::capture::Launcher;
use crate::error::ComparisonError;
use crate::pipeline::{Comparison, ComparisonRequest};

/// `POST /compare`
pub async fn compare<L: Launcher>(
    State(state): State<AppState<L>>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let Json(body) = payload?;

    let mut options = state.options.clone();
    if let Some(threshold) = body.threshold {
        options.threshold = threshold;
    }
    let request = ComparisonRequest::new(
        body.url1.unwrap_or_default(),
        body.url2.unwrap_or_default(),
        options,
    );
    // Bad input never waits for, or occupies, a browser slot.
    request.validate()?;

    let permit = Arc::clone(&state.browsers)
        .acquire_owned()
        .await
        .map_err(|_| ComparisonError::Resource("browser pool closed".into()))?;
    debug!(available = state.browsers.available_permits(), "browser slot acquired");

    // Detached so a client disconnect cannot drop the run before its browser
    // is closed. The slot is held until the run finishes either way.
    let launcher = Arc::clone(&state.launcher);
    let run = tokio::spawn(
        async move {
            let _permit = permit;
            Comparison::run(launcher.as_ref(), &request).await
        }
        .in_current_span(),
    );
    let comparison = run
        .await
        .map_err(|e| ComparisonError::Task(e.to_string()))??;
    Ok(Json(CompareResponse::from(comparison)))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
