//! Request and response DTOs for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::estimation::{EstimationInput, VehicleYear};
use crate::validation::ValidationError;

// --- Estimation ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub service_type: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_year: Option<VehicleYear>,
    pub description: Option<String>,
}

impl EstimateRequest {
    /// Build the estimator input, defaulting the optional vehicle fields to
    /// empty. Call after validation.
    pub fn into_input(self) -> EstimationInput {
        EstimationInput {
            service_type: self.service_type.unwrap_or_default(),
            vehicle_make: self.vehicle_make.unwrap_or_default(),
            vehicle_model: self.vehicle_model.unwrap_or_default(),
            vehicle_year: self.vehicle_year,
            description: self.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub estimated_hours: f64,
}

// --- Errors ---

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub path: String,
    pub method: String,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub environment: String,
}
