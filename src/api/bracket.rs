//! Elimination bracket endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::bracket::{Advancement, Bracket, Phase, Slot};

/// Build bracket router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/bracket",
            get(get_bracket).post(generate_bracket).delete(delete_bracket),
        )
        .route("/bracket/{phase}/{match_id}", patch(record_result))
        .route("/bracket/{phase}/{match_id}/advance", post(advance))
        .route("/bracket/{phase}/{match_id}/combats", post(assign_combats))
}

/// Bracket draw request
#[derive(Debug, Default, Deserialize)]
pub struct GenerateBracketRequest {
    /// Defaults to the pool qualifiers, or every team without pools
    pub team_ids: Option<Vec<String>>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MatchResultRequest {
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Option<Slot>,
}

#[derive(Debug, Deserialize)]
pub struct MatchCombatsRequest {
    pub combat_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub bracket: Bracket,
    pub advancement: Advancement,
}

async fn get_bracket(State(state): State<AppState>) -> Result<Json<Bracket>, ApiError> {
    Ok(Json(state.bracket.get().await?))
}

async fn generate_bracket(
    State(state): State<AppState>,
    Json(req): Json<GenerateBracketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bracket = state.bracket.generate(req.team_ids, req.seed).await?;
    Ok((StatusCode::CREATED, Json(bracket)))
}

async fn delete_bracket(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.bracket.delete().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn record_result(
    State(state): State<AppState>,
    Path((phase, match_id)): Path<(String, usize)>,
    Json(req): Json<MatchResultRequest>,
) -> Result<Json<Bracket>, ApiError> {
    let phase: Phase = phase.parse()?;
    Ok(Json(
        state
            .bracket
            .record_match_result(phase, match_id, req.score_a, req.score_b, req.winner)
            .await?,
    ))
}

async fn advance(
    State(state): State<AppState>,
    Path((phase, match_id)): Path<(String, usize)>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let phase: Phase = phase.parse()?;
    let (bracket, advancement) = state.bracket.advance_winner(phase, match_id).await?;
    Ok(Json(AdvanceResponse {
        bracket,
        advancement,
    }))
}

async fn assign_combats(
    State(state): State<AppState>,
    Path((phase, match_id)): Path<(String, usize)>,
    Json(req): Json<MatchCombatsRequest>,
) -> Result<Json<Bracket>, ApiError> {
    let phase: Phase = phase.parse()?;
    Ok(Json(
        state
            .bracket
            .assign_match_combats(phase, match_id, &req.combat_ids)
            .await?,
    ))
}
