//! HTTP API module - REST endpoints and WebSocket

mod bracket;
mod combats;
mod error;
mod pools;
mod roster;
mod tatamis;
mod websocket;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::TournamentConfig;
use crate::db::Database;
use crate::notify::Notifier;
use crate::service::{
    BracketService, CombatService, Context, PoolService, RosterService, Services, TatamiService,
};
use crate::store::EntityStore;
pub use error::{ApiError, ErrorResponse};
pub use websocket::{ClientSession, ConnectionManager, ServerMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<TournamentConfig>,
    pub notifier: Arc<Notifier>,
    pub connections: Arc<ConnectionManager>,
    pub roster: Arc<RosterService>,
    pub combats: Arc<CombatService>,
    pub tatamis: Arc<TatamiService>,
    pub pools: Arc<PoolService>,
    pub bracket: Arc<BracketService>,
}

/// Build the API router
pub fn router(db: Arc<Database>, config: TournamentConfig) -> Router {
    let store = Arc::new(EntityStore::new(db.pool().clone()));
    let notifier = Notifier::shared();
    let ctx = Context::new(store, config, notifier.clone());
    let config = ctx.config.clone();
    let services = Services::new(ctx);

    let state = AppState {
        db,
        config,
        notifier,
        connections: Arc::new(ConnectionManager::new()),
        roster: services.roster,
        combats: services.combats,
        tatamis: services.tatamis,
        pools: services.pools,
        bracket: services.bracket,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/config", get(tournament_config))
        .route("/ws", get(websocket::ws_handler))
        .merge(roster::router())
        .merge(combats::router())
        .merge(tatamis::router())
        .merge(pools::router())
        .merge(bracket::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "tatamid",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Rules in force: durations, hold thresholds, weight categories, points
async fn tournament_config(State(state): State<AppState>) -> Json<TournamentConfig> {
    Json(state.config.as_ref().clone())
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.connections.count().await;
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
                clients,
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
                clients,
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    /// Connected WebSocket clients
    clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Database::new(None).await.unwrap();
        router(Arc::new(db), TournamentConfig::default())
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_route() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app().await, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["clients"], 0);
    }

    #[tokio::test]
    async fn test_create_team_route() {
        let app = app().await;
        let req = Request::post("/teams")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"id":"lyon","name":"Lyon"}"#))
            .unwrap();
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "lyon");
        assert_eq!(body["points"], 0);

        let req = Request::get("/teams/lyon").body(Body::empty()).unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Lyon");
    }

    #[tokio::test]
    async fn test_config_route() {
        let req = Request::get("/config").body(Body::empty()).unwrap();
        let (status, body) = send(app().await, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["combat_duration_secs"], 240);
        assert_eq!(body["weight_categories"]["male"][2], "-73");
        assert_eq!(body["hold"]["ippon_secs"], 20.0);
    }

    #[tokio::test]
    async fn test_unknown_phase_is_not_found() {
        let req = Request::post("/bracket/eighth/1/advance")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app().await, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
