use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Validation errors raised by the database (empty names, duplicate paths)
/// are safe to expose and are returned as-is with a BAD_REQUEST status.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("cannot") || msg.contains("already exists") || msg.contains("not found") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::BAD_REQUEST, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn fragment_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Fragment not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Fragments
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListFragmentsQuery {
    pub folder: Option<String>,
}

pub async fn list_fragments(
    State(state): State<AppState>,
    Query(query): Query<ListFragmentsQuery>,
) -> Result<Json<Vec<Fragment>>, (StatusCode, String)> {
    let fragments = match query.folder {
        Some(folder) => state.db.list_fragments_in_folder(&folder),
        None => state.db.list_fragments(),
    };
    fragments.map(Json).map_err(internal_error)
}

pub async fn get_fragment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FragmentWithLines>, (StatusCode, String)> {
    state
        .db
        .get_fragment_with_lines(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(fragment_not_found)
}

pub async fn create_fragment(
    State(state): State<AppState>,
    Json(input): Json<CreateFragmentInput>,
) -> Result<(StatusCode, Json<Fragment>), (StatusCode, String)> {
    state
        .db
        .create_fragment(input)
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(internal_error)
}

pub async fn import_fragment(
    State(state): State<AppState>,
    Json(input): Json<ImportFragmentInput>,
) -> Result<(StatusCode, Json<Fragment>), (StatusCode, String)> {
    state
        .db
        .import_fragment(input)
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(internal_error)
}

pub async fn update_fragment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateFragmentInput>,
) -> Result<Json<Fragment>, (StatusCode, String)> {
    state
        .db
        .update_fragment(id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(fragment_not_found)
}

pub async fn delete_fragment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.delete_fragment(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(fragment_not_found())
    }
}

pub async fn duplicate_fragment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<DuplicateFragmentInput>,
) -> Result<(StatusCode, Json<Fragment>), (StatusCode, String)> {
    state
        .db
        .duplicate_fragment(id, input)
        .map_err(internal_error)?
        .map(|f| (StatusCode::CREATED, Json(f)))
        .ok_or_else(fragment_not_found)
}

// ============================================================
// Expansion
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpandResponse {
    pub prompt: String,
    pub expanded: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub has_choice_points: bool,
}

pub async fn expand_prompt(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<ExpandResponse>, (StatusCode, String)> {
    let expanded = state
        .expander
        .expand(&request.prompt)
        .await
        .map_err(internal_error)?;

    Ok(Json(ExpandResponse {
        prompt: request.prompt,
        expanded,
    }))
}

pub async fn check_prompt(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Json<CheckResponse> {
    Json(CheckResponse {
        has_choice_points: state.expander.has_choice_points(&request.prompt),
    })
}

// ============================================================
// Sequential Counters
// ============================================================

pub async fn list_counters(
    State(state): State<AppState>,
) -> Result<Json<Vec<SequentialCounter>>, (StatusCode, String)> {
    state
        .db
        .list_sequential_counters()
        .map(Json)
        .map_err(internal_error)
}

pub async fn reset_counters(
    State(state): State<AppState>,
    Json(input): Json<ResetCountersInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .expander
        .reset_sequential_counters(input.path.as_deref())
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}
