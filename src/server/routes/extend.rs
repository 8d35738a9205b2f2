//! Extension route for user-defined artifacts.

use axum::extract::{Json, State};
use serde::Serialize;
use serde_json::Value;

use super::RequestGuard;
use crate::error::{Error, Result};
use crate::server::state::ServerState;

#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub model: String,
    pub output: Value,
}

/// Handle `POST /extend`.
pub async fn extend(
    State(state): State<ServerState>,
    Json(request): Json<Value>,
) -> Result<Json<ExtendResponse>> {
    let _guard = RequestGuard::new(&state.metrics);

    if !request.is_object() {
        return Err(Error::Validation("request body must be a JSON object".into()));
    }
    let output = state.artifact.extend(&request)?;

    Ok(Json(ExtendResponse {
        model: state.artifact.name().to_string(),
        output,
    }))
}
