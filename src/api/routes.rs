//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::rng::CancelFlag;
use crate::strategy::SlipBuilder;
use crate::types::{EngineError, GenerationResponse, MasterSlip};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub builder: SlipBuilder,
    pub request_timeout: Duration,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(builder: SlipBuilder, request_timeout: Duration) -> Self {
        Self {
            builder,
            request_timeout,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub master_slip: MasterSlip,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
}

/// Failure modes of a request, each with its own status and body.
#[derive(Debug)]
pub enum ApiError {
    Validation { field: String, message: String },
    Timeout,
    Internal,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation { field, message } => ApiError::Validation { field, message },
            EngineError::Cancelled => ApiError::Timeout,
            EngineError::Computation(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({
                    "error": "validation_error",
                    "field": field,
                    "message": message,
                }),
            ),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                serde_json::json!({ "error": "timeout" }),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "internal_error" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// POST /api/generate-slips
///
/// The engine runs on the blocking pool. If it overruns the request
/// timeout the run's cancel flag is raised and the caller gets a 504.
pub async fn generate_slips(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::Validation {
        field: "body".to_string(),
        message: rejection.body_text(),
    })?;

    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();
    let builder = state.builder.clone();
    let task = tokio::task::spawn_blocking(move || {
        builder.generate(&request.master_slip, request.seed, &worker_cancel)
    });

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => Ok(Json(result?)),
        Ok(Err(join_err)) => {
            error!(error = %join_err, "Generation task panicked");
            Err(ApiError::Internal)
        }
        Err(_) => {
            cancel.cancel();
            warn!(
                timeout_secs = state.request_timeout.as_secs_f64(),
                "Generation timed out"
            );
            Err(ApiError::Timeout)
        }
    }
}
