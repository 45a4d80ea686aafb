use crate::error::{ServerError, ServerResult};
use crate::models::{
    CreateSessionResponse, ExternalLoadRequest, ProjectionRequest, ProjectionResponse,
    ReductionInputResponse, SessionStatusResponse, SetSummary, SuccessResponse, SuggestRequest,
    SuggestResponse,
};
use crate::state::AppState;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use embuddy_core::{ProcessedData, Session, SetRole};
use tracing::{debug, info};
use uuid::Uuid;

/// Handler for `POST /sessions`
/// Creates an empty session.
#[axum::debug_handler]
pub async fn create_session(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let session_id = Uuid::new_v4().to_string();
    state.sessions.write().await.insert(session_id.clone(), Session::new());
    info!(session_id = %session_id, "Session created");
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

/// Handler for `GET /sessions/{id}`
/// Reports what each set currently holds.
#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServerResult<Json<SessionStatusResponse>> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;
    let summary = |role| session.get(role).map(|data| SetSummary::of(role, data));
    Ok(Json(SessionStatusResponse {
        documents: summary(SetRole::Document),
        prompts: summary(SetRole::Prompt),
        session_id,
    }))
}

/// Handler for `DELETE /sessions/{id}`
#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServerResult<Json<SuccessResponse>> {
    state
        .sessions
        .write()
        .await
        .remove(&session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;
    info!(session_id = %session_id, "Session deleted");
    Ok(Json(SuccessResponse { message: format!("Session '{}' deleted", session_id) }))
}

/// Handler for `POST /sessions/{id}/reset`
/// Clears documents and prompts together.
#[axum::debug_handler]
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServerResult<Json<SuccessResponse>> {
    let mut sessions = state.sessions.write().await;
    sessions
        .get_mut(&session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?
        .reset();
    Ok(Json(SuccessResponse { message: format!("Session '{}' reset", session_id) }))
}

/// Handler for `PUT /sessions/{id}/sets/{set}`
/// Parses an NDJSON (or base64 data URL) body into the given set.
#[axum::debug_handler]
pub async fn upload_set(
    State(state): State<AppState>,
    Path((session_id, set)): Path<(String, SetRole)>,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    debug!(session_id = %session_id, set = %set, bytes = body.len(), "Received upload");
    state.ensure_session(&session_id).await?;
    let data = state.processor.process_upload(&body);
    store_batch(&state, &session_id, set, data).await
}

/// Handler for `POST /sessions/{id}/sets/{set}/external`
/// Maps records fetched from an external index into the given set.
#[axum::debug_handler]
pub async fn load_external_set(
    State(state): State<AppState>,
    Path((session_id, set)): Path<(String, SetRole)>,
    Json(payload): Json<ExternalLoadRequest>,
) -> ServerResult<impl IntoResponse> {
    debug!(session_id = %session_id, set = %set, records = payload.records.len(), "Received external records");
    state.ensure_session(&session_id).await?;
    let data = state.processor.process_external(&payload.records, &payload.mapping);
    store_batch(&state, &session_id, set, data).await
}

/// Stores `data` in the session and reports it; errored batches answer 422.
async fn store_batch(
    state: &AppState,
    session_id: &str,
    set: SetRole,
    data: ProcessedData,
) -> ServerResult<(StatusCode, Json<SetSummary>)> {
    let summary = SetSummary::of(set, &data);
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.to_string()))?;
    session.store(set, data);

    let status = if summary.error.is_some() { StatusCode::UNPROCESSABLE_ENTITY } else { StatusCode::OK };
    Ok((status, Json(summary)))
}

/// Handler for `POST /fields/suggest`
/// Ranks candidate fields of raw records for every canonical role.
#[axum::debug_handler]
pub async fn suggest_fields(
    State(state): State<AppState>,
    Json(payload): Json<SuggestRequest>,
) -> ServerResult<Json<SuggestResponse>> {
    if payload.records.is_empty() {
        return Err(ServerError::BadRequest("records must not be empty".to_string()));
    }
    let suggestions = state.processor.suggest_fields(&payload.records);
    let default_mapping = suggestions.default_mapping().ok();
    Ok(Json(SuggestResponse { suggestions, default_mapping }))
}

/// Handler for `GET /sessions/{id}/reduction-input`
/// Returns documents' rows followed by prompts' rows.
#[axum::debug_handler]
pub async fn get_reduction_input(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServerResult<Json<ReductionInputResponse>> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;
    let combined = session.reduction_input(&state.processor)?;

    Ok(Json(ReductionInputResponse {
        generation: session.generation(),
        n_documents: combined.n_primary(),
        n_prompts: combined.n_secondary(),
        dimensions: combined.matrix.ncols(),
        matrix: combined.matrix.outer_iter().map(|row| row.to_vec()).collect(),
    }))
}

/// Handler for `POST /sessions/{id}/projection`
/// Splits reduced coordinates back onto the session's documents and prompts.
/// Answers 409 when either set changed after the reduction input was read.
#[axum::debug_handler]
pub async fn submit_projection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<ProjectionRequest>,
) -> ServerResult<Json<ProjectionResponse>> {
    let reduced = payload.coordinates_matrix()?;
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;
    let points = session.annotate_generation(&state.processor, payload.generation, reduced.view())?;

    info!(session_id = %session_id, points = points.len(), "Projection annotated");
    Ok(Json(ProjectionResponse {
        points,
        explained_variance: payload.explained_variance,
    }))
}
