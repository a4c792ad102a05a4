//! Tatami queue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::combat::Combat;
use crate::service::{OngoingConfrontation, QueuedCombat};
use crate::tatami::Tatami;

/// Build tatami router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tatamis", get(list_tatamis).post(create_tatami))
        .route("/tatamis/{id}", get(get_tatami).patch(rename_tatami))
        .route("/tatamis/{id}/combats", get(combat_history))
        .route("/tatamis/{id}/current", get(current_combat))
        .route("/tatamis/{id}/assign", post(assign))
        .route("/tatamis/{id}/next", post(next))
        .route("/tatamis/{id}/previous", post(previous))
        .route("/tatamis/{id}/release", post(release))
        .route("/tatamis/{id}/state", patch(set_state))
        .route("/confrontations/ongoing", get(ongoing))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTatamiRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub combat_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: String,
}

async fn list_tatamis(State(state): State<AppState>) -> Result<Json<Vec<Tatami>>, ApiError> {
    Ok(Json(state.tatamis.list().await?))
}

async fn create_tatami(
    State(state): State<AppState>,
    Json(req): Json<CreateTatamiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tatami = state.tatamis.create_tatami(req.name).await?;
    Ok((StatusCode::CREATED, Json(tatami)))
}

async fn get_tatami(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.get(&id).await?))
}

async fn rename_tatami(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.rename(&id, &req.name).await?))
}

/// Scoreboard view of the whole queue
async fn combat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<QueuedCombat>>, ApiError> {
    Ok(Json(state.tatamis.combat_history(&id).await?))
}

/// Combat under the queue pointer, or null
async fn current_combat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<Combat>>, ApiError> {
    Ok(Json(state.tatamis.current(&id).await?))
}

async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.assign(&id, &req.combat_ids).await?))
}

async fn next(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.next(&id).await?))
}

async fn previous(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.previous(&id).await?))
}

async fn release(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.release(&id).await?))
}

async fn set_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StateRequest>,
) -> Result<Json<Tatami>, ApiError> {
    Ok(Json(state.tatamis.set_state(&id, &req.state).await?))
}

async fn ongoing(
    State(state): State<AppState>,
) -> Result<Json<Vec<OngoingConfrontation>>, ApiError> {
    Ok(Json(state.tatamis.ongoing_confrontations().await?))
}
