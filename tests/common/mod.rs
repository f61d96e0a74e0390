use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use route_risk::api::{self, AppState};
use route_risk::config::IndexKind;
use route_risk::loader;
use route_risk::scoring::RouteScorer;
use route_risk::store;
use serde_json::Value;
use std::io::Cursor;
use tower::ServiceExt;

pub const SEGMENTS_CSV: &str = include_str!("../../assets/street_segment_risk.csv");

pub fn app(kind: IndexKind) -> Router {
    let records = loader::load_reader(Cursor::new(SEGMENTS_CSV)).expect("fixture csv loads");
    let index = store::build_index(kind, h3o::Resolution::Nine, records);
    api::router(AppState::new(RouteScorer::new(index, 50.0)))
}

pub async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request builds");
    send(app, request).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds");
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
