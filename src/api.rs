use crate::error::AppError;
use crate::model::{RouteRiskRequest, RouteRiskResponse};
use crate::scoring::RouteScorer;
use crate::store::{BoundingBox, SegmentRiskRecord};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

// Shared State for concurrency
pub struct AppState {
    pub scorer: RouteScorer,
}

impl AppState {
    pub fn new(scorer: RouteScorer) -> Arc<Self> {
        Arc::new(Self { scorer })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Allows the map front end to call the API from another origin.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(healthcheck))
        .route("/api/routes/risk", post(analyze_route_risk))
        .route("/api/safety/segments", get(segments_within_bounds))
        .route("/api/safety/segments/:unitid", get(segment_by_id))
        .layer(cors)
        .with_state(state)
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Scores every candidate route of a directions response. Always 200 once the
/// body has parsed; missing coverage shows up as `UNKNOWN` labels.
async fn analyze_route_risk(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRiskRequest>,
) -> Json<RouteRiskResponse> {
    let response = state.scorer.score(&payload);
    info!(routes = response.routes.len(), "route risk analysed");
    Json(response)
}

#[derive(Debug, Deserialize)]
struct BoundsQuery {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

async fn segments_within_bounds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoundsQuery>,
) -> Result<Json<Vec<SegmentRiskRecord>>, AppError> {
    let bounds = BoundingBox::new(query.west, query.south, query.east, query.north)?;
    let records = state.scorer.store().find_within_bounds(&bounds)?;
    Ok(Json(records))
}

async fn segment_by_id(
    State(state): State<Arc<AppState>>,
    Path(unitid): Path<String>,
) -> Result<Json<SegmentRiskRecord>, AppError> {
    state
        .scorer
        .store()
        .find_by_id(&unitid)?
        .map(Json)
        .ok_or(AppError::SegmentNotFound(unitid))
}
