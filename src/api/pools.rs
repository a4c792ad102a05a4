//! Pool and standings endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::pools::{Pool, StandingRow};
use crate::service::ScheduledEncounter;

/// Build pool router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/pools",
            get(list_pools).post(generate_pools).delete(delete_pools),
        )
        .route("/pools/{id}", get(get_pool))
        .route("/pools/{id}/standings", get(pool_standings))
        .route("/standings", get(general_standings))
        .route(
            "/pools/{id}/encounters/{encounter_id}/combats",
            post(assign_combats),
        )
        .route(
            "/pools/{id}/encounters/{encounter_id}/schedule",
            post(schedule),
        )
}

/// Pool draw request
#[derive(Debug, Deserialize)]
pub struct GeneratePoolsRequest {
    pub pool_count: usize,
    /// Defaults to every registered team
    pub team_ids: Option<Vec<String>>,
    /// Fixes the draw, mainly for tests and replays
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EncounterCombatsRequest {
    pub combat_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub tatami_id: String,
}

async fn list_pools(State(state): State<AppState>) -> Result<Json<Vec<Pool>>, ApiError> {
    Ok(Json(state.pools.list().await?))
}

async fn generate_pools(
    State(state): State<AppState>,
    Json(req): Json<GeneratePoolsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pools = state
        .pools
        .generate(req.pool_count, req.team_ids, req.seed)
        .await?;
    Ok((StatusCode::CREATED, Json(pools)))
}

async fn delete_pools(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.pools.delete_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pool>, ApiError> {
    Ok(Json(state.pools.get(&id).await?))
}

async fn pool_standings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StandingRow>>, ApiError> {
    Ok(Json(state.pools.standings(&id).await?))
}

async fn general_standings(
    State(state): State<AppState>,
) -> Result<Json<Vec<StandingRow>>, ApiError> {
    Ok(Json(state.pools.general_standings().await?))
}

async fn assign_combats(
    State(state): State<AppState>,
    Path((id, encounter_id)): Path<(String, String)>,
    Json(req): Json<EncounterCombatsRequest>,
) -> Result<Json<Pool>, ApiError> {
    Ok(Json(
        state
            .pools
            .assign_encounter_combats(&id, &encounter_id, &req.combat_ids)
            .await?,
    ))
}

async fn schedule(
    State(state): State<AppState>,
    Path((id, encounter_id)): Path<(String, String)>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduledEncounter>, ApiError> {
    Ok(Json(
        state
            .pools
            .schedule_encounter(&id, &encounter_id, &req.tatami_id)
            .await?,
    ))
}
