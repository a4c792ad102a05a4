//! Combat endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::combat::Combat;
use crate::service::{ActionOutcome, CombatAction};

/// Build combat router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/combats", get(list_combats).post(create_combat))
        .route("/combats/{id}", get(get_combat).delete(delete_combat))
        .route("/combats/{id}/actions", post(apply_action))
}

/// Combat creation request
#[derive(Debug, Deserialize)]
pub struct CreateCombatRequest {
    pub red: String,
    pub blue: String,
    pub duration_secs: Option<u32>,
}

async fn list_combats(State(state): State<AppState>) -> Result<Json<Vec<Combat>>, ApiError> {
    Ok(Json(state.combats.list().await?))
}

async fn create_combat(
    State(state): State<AppState>,
    Json(req): Json<CreateCombatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let combat = state
        .combats
        .create_combat(&req.red, &req.blue, req.duration_secs)
        .await?;
    Ok((StatusCode::CREATED, Json(combat)))
}

async fn get_combat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Combat>, ApiError> {
    Ok(Json(state.combats.get(&id).await?))
}

async fn delete_combat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.combats.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a scoring-table action
async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(action): Json<CombatAction>,
) -> Result<Json<ActionOutcome>, ApiError> {
    Ok(Json(state.combats.apply(&id, action).await?))
}
