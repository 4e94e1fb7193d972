//! HTTP API for the booking form and the admin back office.
//!
//! Routes:
//! - `POST /api/ai/estimate-duration` estimates a job
//! - `GET /api/ai/config` returns the effective estimator configuration
//! - `PUT /api/ai/config` saves a new runtime override
//! - `GET /api/health` liveness probe

pub mod types;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::StoreError;
use crate::estimation::{ConfigView, DurationEstimator, RuntimeOverride};
use crate::validation::{ValidationError, ValidationErrorCode, Validator};

use types::{EstimateRequest, EstimateResponse, ErrorResponse, HealthResponse, NotFoundResponse};

/// Maximum JSON body size (64 KB).
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub estimator: Arc<DurationEstimator>,
    /// Deployment label reported by the health endpoint.
    pub environment: String,
}

/// The service's public HTTP API.
pub struct EstimatorApi;

impl EstimatorApi {
    /// Build the axum router with state and middleware applied.
    pub fn router(state: ApiState) -> Router {
        Router::new()
            .route("/api/ai/estimate-duration", post(estimate_duration))
            .route("/api/ai/config", get(get_config).put(put_config))
            .route("/api/health", get(health))
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Errors returned to API callers.
#[derive(Debug)]
pub enum ApiError {
    /// The request was rejected; nothing was computed or saved.
    InvalidRequest {
        message: String,
        details: Vec<ValidationError>,
    },
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidRequest { message, details } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    details,
                },
            ),
            ApiError::Store(StoreError::Rejected { errors }) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid configuration override".to_string(),
                    details: errors,
                },
            ),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Failed to persist estimator override");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: format!("Configuration was not saved: {}", e),
                        details: vec![],
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// -- Handlers --

async fn estimate_duration(
    State(state): State<ApiState>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let validator = Validator::new();
    let validation = validator
        .validate("serviceType", req.service_type.as_deref())
        .merge(validator.validate("description", req.description.as_deref()));
    if !validation.is_valid {
        let message = if validation.errors.iter().all(|e| e.code == ValidationErrorCode::Empty) {
            "serviceType and description are required".to_string()
        } else {
            validation
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        return Err(ApiError::InvalidRequest {
            message,
            details: validation.errors,
        });
    }

    let input = req.into_input();
    let estimate = state.estimator.estimate(&input).await;

    tracing::info!(
        service_type = %input.service_type,
        hours = estimate.hours,
        source = %estimate.source,
        "Estimated job duration"
    );

    Ok(Json(EstimateResponse {
        estimated_hours: estimate.hours,
    }))
}

async fn get_config(State(state): State<ApiState>) -> Json<ConfigView> {
    Json(state.estimator.store().current().await.to_view())
}

async fn put_config(
    State(state): State<ApiState>,
    Json(overrides): Json<RuntimeOverride>,
) -> Result<Json<ConfigView>, ApiError> {
    let config = state.estimator.store().save_override(overrides).await?;
    Ok(Json(config.to_view()))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Estimation service is running",
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
    })
}

async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Route not found",
            path: uri.to_string(),
            method: method.to_string(),
        }),
    )
}
