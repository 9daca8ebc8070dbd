use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::db::models::{Game, League};
use crate::games::{resolve_all, FetchFailure, GameReconciler, LeagueSchedule};

#[derive(Clone)]
pub struct AppState {
    pub reconciler: GameReconciler,
    pub schedule: LeagueSchedule,
}

/// Build the Axum router for the games API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/livez", get(livez_handler))
        .route("/api/v1/games", get(games_handler))
        .route("/api/v1/games/:id", get(game_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Failures surfaced to API clients as `{"message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    MissingLeague,
    UnknownLeague(String),
    UnknownGame(String),
    Fetch(FetchFailure),
}

impl From<FetchFailure> for ApiError {
    fn from(e: FetchFailure) -> Self {
        ApiError::Fetch(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingLeague => (StatusCode::BAD_REQUEST, "Missing league"),
            ApiError::UnknownLeague(league) => {
                warn!("Rejected request for unknown league {:?}", league);
                (StatusCode::BAD_REQUEST, "Unable to retrieve game data")
            }
            ApiError::UnknownGame(id) => {
                warn!("Rejected request for unscheduled game {:?}", id);
                (StatusCode::NOT_FOUND, "Game not found")
            }
            ApiError::Fetch(e) => {
                error!(
                    "Request for game {} failed: {:?}",
                    e.src_id(),
                    e
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unable to retrieve game data",
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct GamesQuery {
    pub league: Option<String>,
}

async fn livez_handler() -> &'static str {
    "ok"
}

/// GET /api/v1/games?league=NBA
async fn games_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GamesQuery>, QueryRejection>,
) -> Result<Json<Vec<Game>>, ApiError> {
    // A malformed query (e.g. a repeated `league`) names no single league
    let Query(query) = query.map_err(|e| ApiError::UnknownLeague(e.body_text()))?;
    let raw = query
        .league
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingLeague)?;
    let league: League = raw
        .parse()
        .map_err(|_| ApiError::UnknownLeague(raw.to_string()))?;

    let games = resolve_all(&state.reconciler, state.schedule.game_ids(league)).await?;
    Ok(Json(games))
}

/// GET /api/v1/games/:id
async fn game_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    if !state.schedule.contains(&id) {
        return Err(ApiError::UnknownGame(id));
    }
    let game = state.reconciler.resolve(&id).await?;
    Ok(Json(game))
}
