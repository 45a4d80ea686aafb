//! Defines the data structures used for API request and response bodies.

use embuddy_core::{FieldMapping, FieldSuggestions, ProcessedData, ProjectedPoint, SetRole};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServerError, ServerResult};

// --- Request Bodies ---

/// Request body for loading a set from records fetched off an external index.
#[derive(Deserialize)]
pub struct ExternalLoadRequest {
    pub records: Vec<Value>,
    pub mapping: FieldMapping,
}

/// Request body for field suggestions over raw records.
#[derive(Deserialize)]
pub struct SuggestRequest {
    pub records: Vec<Value>,
}

/// Coordinates produced by the client-side reducer, rows in reduction-input order.
/// `generation` is echoed from the reduction-input response.
#[derive(Deserialize)]
pub struct ProjectionRequest {
    pub generation: u64,
    pub coordinates: Vec<Vec<f32>>,
    #[serde(default)]
    pub explained_variance: Option<Vec<f32>>,
}

impl ProjectionRequest {
    pub fn coordinates_matrix(&self) -> ServerResult<Array2<f32>> {
        let rows = self.coordinates.len();
        let cols = self.coordinates.first().map_or(0, Vec::len);
        if let Some(bad) = self.coordinates.iter().position(|row| row.len() != cols) {
            return Err(ServerError::BadRequest(format!(
                "coordinates row {} has {} values, expected {}",
                bad,
                self.coordinates[bad].len(),
                cols
            )));
        }
        let flat: Vec<f32> = self.coordinates.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows, cols), flat).map_err(|e| ServerError::BadRequest(e.to_string()))
    }
}

// --- Response Bodies ---

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Summary of one stored batch.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SetSummary {
    pub set: SetRole,
    pub count: usize,
    pub dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SetSummary {
    pub fn of(set: SetRole, data: &ProcessedData) -> Self {
        SetSummary {
            set,
            count: data.len(),
            dimensions: data.dimensions(),
            error: data.error.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub documents: Option<SetSummary>,
    pub prompts: Option<SetSummary>,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub suggestions: FieldSuggestions,
    /// Top candidate per role, absent when embedding or text has no candidate.
    pub default_mapping: Option<FieldMapping>,
}

/// The matrix to hand to the external reducer.
#[derive(Serialize)]
pub struct ReductionInputResponse {
    pub generation: u64,
    pub matrix: Vec<Vec<f32>>,
    pub n_documents: usize,
    pub n_prompts: usize,
    pub dimensions: usize,
}

#[derive(Serialize)]
pub struct ProjectionResponse {
    pub points: Vec<ProjectedPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explained_variance: Option<Vec<f32>>,
}

/// Generic success response.
#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}
