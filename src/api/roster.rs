//! Team and fighter endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::roster::{Fighter, FighterUpdate, Team, TeamUpdate};
use crate::service::{NewFighter, NewTeam};

/// Build roster router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route(
            "/teams/{id}",
            get(get_team).patch(update_team).delete(delete_team),
        )
        .route("/fighters", get(list_fighters).post(create_fighter))
        .route(
            "/fighters/{id}",
            get(get_fighter).patch(update_fighter).delete(delete_fighter),
        )
}

async fn list_teams(State(state): State<AppState>) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.roster.list_teams().await?))
}

async fn create_team(
    State(state): State<AppState>,
    Json(req): Json<NewTeam>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.roster.create_team(req).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(state.roster.get_team(&id).await?))
}

async fn update_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<TeamUpdate>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(state.roster.update_team(&id, update).await?))
}

async fn delete_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.roster.delete_team(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fighter list filter
#[derive(Debug, Deserialize)]
struct FighterQuery {
    team_id: Option<String>,
}

async fn list_fighters(
    State(state): State<AppState>,
    Query(query): Query<FighterQuery>,
) -> Result<Json<Vec<Fighter>>, ApiError> {
    Ok(Json(
        state.roster.list_fighters(query.team_id.as_deref()).await?,
    ))
}

async fn create_fighter(
    State(state): State<AppState>,
    Json(req): Json<NewFighter>,
) -> Result<impl IntoResponse, ApiError> {
    let fighter = state.roster.create_fighter(req).await?;
    Ok((StatusCode::CREATED, Json(fighter)))
}

async fn get_fighter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Fighter>, ApiError> {
    Ok(Json(state.roster.get_fighter(&id).await?))
}

async fn update_fighter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<FighterUpdate>,
) -> Result<Json<Fighter>, ApiError> {
    Ok(Json(state.roster.update_fighter(&id, update).await?))
}

async fn delete_fighter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.roster.delete_fighter(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
