//! Prediction route.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RequestGuard;
use crate::artifact::Features;
use crate::error::{Error, Result};
use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub model: String,
    pub output: Features,
}

/// Handle `POST /predict`.
pub async fn predict(
    State(state): State<ServerState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let _guard = RequestGuard::new(&state.metrics);

    let features = parse_input(request.input)?;
    let output = state.artifact.predict(&features)?;

    Ok(Json(PredictResponse {
        model: state.artifact.name().to_string(),
        output,
    }))
}

fn parse_input(input: Option<Value>) -> Result<Features> {
    let value = input.ok_or_else(|| Error::Validation("missing required field 'input'".into()))?;
    serde_json::from_value(value)
        .map_err(|_| Error::Validation("'input' must be a number or an array of numbers".into()))
}
